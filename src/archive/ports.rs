// src/archive/ports.rs
// =============================================================================
// Port allocation for archiving proxies.
//
// Every session that starts a proxy takes a port from the pool and gives it
// back when it's done. The pool is an ordinary object passed to whoever
// needs it; a PortLease returns its port when dropped, so a session that
// errors out or gets cancelled can't leak one.
// =============================================================================

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

use rand::seq::IteratorRandom;

use crate::error::SetupError;

// First port of the default range (start of the Linux ephemeral range)
pub const DEFAULT_PORT_START: u16 = 32768;
pub const DEFAULT_PORT_COUNT: u16 = 100;

#[derive(Debug, Clone)]
pub struct PortPool {
    free: Arc<Mutex<BTreeSet<u16>>>,
}

impl PortPool {
    pub fn new(range: Range<u16>) -> Self {
        Self {
            free: Arc::new(Mutex::new(range.collect())),
        }
    }

    // Takes a random free port out of the pool
    pub fn lease(&self) -> Result<PortLease, SetupError> {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        let port = free
            .iter()
            .copied()
            .choose(&mut rand::thread_rng())
            .ok_or(SetupError::NoFreePort)?;
        free.remove(&port);
        Ok(PortLease {
            port,
            pool: self.clone(),
        })
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, port: u16) {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(port);
    }
}

impl Default for PortPool {
    fn default() -> Self {
        Self::new(DEFAULT_PORT_START..DEFAULT_PORT_START + DEFAULT_PORT_COUNT)
    }
}

// A port taken from a PortPool, handed back on drop
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    pool: PortPool,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.pool.release(self.port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_and_release() {
        let pool = PortPool::new(40000..40002);
        let first = pool.lease().unwrap();
        let second = pool.lease().unwrap();
        assert_ne!(first.port(), second.port());
        assert!((40000..40002).contains(&first.port()));
        assert_eq!(pool.available(), 0);
        assert!(matches!(pool.lease(), Err(SetupError::NoFreePort)));

        drop(first);
        assert_eq!(pool.available(), 1);
        assert!(pool.lease().is_ok());
    }

    #[test]
    fn test_default_range() {
        let pool = PortPool::default();
        assert_eq!(pool.available(), 100);
        let lease = pool.lease().unwrap();
        assert!(lease.port() >= DEFAULT_PORT_START);
        assert!(lease.port() < DEFAULT_PORT_START + DEFAULT_PORT_COUNT);
    }

    #[test]
    fn test_pools_are_independent() {
        let a = PortPool::new(40000..40001);
        let b = PortPool::new(40000..40001);
        let _held = a.lease().unwrap();
        assert!(b.lease().is_ok());
    }
}
