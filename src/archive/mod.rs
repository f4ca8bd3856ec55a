// src/archive/mod.rs
// =============================================================================
// The archiving layer: a warcprox process recording everything the browser
// fetches.
//
// The crawl never looks at what the proxy writes. All we do is:
// - pick a port for it (ports)
// - start it with a WARC name and stop it at the end (proxy)
//
// ArchiveSession bundles the two so one call sets everything up and one call
// tears it down.
// =============================================================================

mod ports;
mod proxy;

use tracing::info;

use crate::config::ArchiveConfig;
use crate::error::SetupError;

use ports::PortLease;
use proxy::WarcProxy;

pub use ports::PortPool;

#[derive(Debug)]
pub struct ArchiveSession {
    proxy: WarcProxy,
    // Dropped after the proxy is stopped, returning the port to the pool
    lease: PortLease,
}

impl ArchiveSession {
    // Leases a port and starts the proxy on it
    //
    // If the proxy fails to start, the lease is dropped and the port goes
    // back to the pool.
    pub async fn start(pool: &PortPool, config: &ArchiveConfig) -> Result<Self, SetupError> {
        let lease = pool.lease()?;
        let proxy = WarcProxy::start(config, lease.port()).await?;
        Ok(Self { proxy, lease })
    }

    pub fn port(&self) -> u16 {
        self.lease.port()
    }

    pub async fn shutdown(self) {
        let port = self.port();
        self.proxy.shutdown().await;
        drop(self.lease);
        info!(port, "archiving proxy stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_failed_start_returns_port() {
        let pool = PortPool::new(40200..40201);
        let data_dir = std::env::temp_dir().join("bget-archive-test");
        let config = ArchiveConfig {
            program: "bget-test-no-such-program".to_string(),
            data_dir,
            warc_name: "test".to_string(),
            blackout_period: Duration::from_secs(60),
            startup_timeout: Duration::from_secs(1),
        };
        std::fs::create_dir_all(config.proxy_dir()).unwrap();

        assert!(ArchiveSession::start(&pool, &config).await.is_err());
        assert_eq!(pool.available(), 1);
    }
}
