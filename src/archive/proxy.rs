// src/archive/proxy.rs
// =============================================================================
// Runs warcprox, the MITM proxy that writes every request and response it
// sees into WARC files.
//
// Lifecycle:
// 1. spawn `warcprox -p <port> ...` in <data_dir>/warcprox
// 2. wait until the port accepts TCP connections (or the child dies)
// 3. on shutdown, SIGTERM so warcprox can finish writing the current WARC,
//    then SIGKILL if it doesn't exit in time
//
// The child is spawned with kill_on_drop, so if setup fails half way (or the
// session panics) the process doesn't outlive us.
// =============================================================================

use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::ArchiveConfig;
use crate::error::SetupError;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct WarcProxy {
    child: Child,
    port: u16,
}

impl WarcProxy {
    // Command-line arguments for a proxy listening on `port`
    pub fn args(config: &ArchiveConfig, port: u16) -> Vec<String> {
        vec![
            "--warc-filename".to_string(),
            format!("{}-{{timestamp17}}-{{serialno}}-{{randomtoken}}", config.warc_name),
            "-j".to_string(),
            format!("dedupe_{}.sqlite", config.warc_name),
            "-p".to_string(),
            port.to_string(),
            "--blackout-period".to_string(),
            config.blackout_period.as_secs().to_string(),
        ]
    }

    // Starts the proxy and waits for it to listen
    pub async fn start(config: &ArchiveConfig, port: u16) -> Result<Self, SetupError> {
        let work_dir = config.proxy_dir();
        debug!(program = %config.program, port, dir = %work_dir.display(), "starting archiving proxy");

        let child = Command::new(&config.program)
            .args(Self::args(config, port))
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SetupError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let mut proxy = Self { child, port };
        proxy.wait_ready(config.startup_timeout).await?;
        info!(port, warc = %config.warc_name, "archiving proxy ready");
        Ok(proxy)
    }

    // Polls until the port accepts connections
    //
    // On error `self` is dropped by the caller, which kills the child.
    async fn wait_ready(&mut self, limit: Duration) -> Result<(), SetupError> {
        let deadline = Instant::now() + limit;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    return Err(SetupError::ProxyExited {
                        status: status.to_string(),
                    })
                }
                Ok(None) => {}
                Err(e) => {
                    return Err(SetupError::ProxyExited {
                        status: e.to_string(),
                    })
                }
            }

            if TcpStream::connect(("127.0.0.1", self.port)).await.is_ok() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(SetupError::ProxyTimeout {
                    port: self.port,
                    timeout: limit,
                });
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }

    // Stops the proxy, gracefully if possible
    pub async fn shutdown(mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }

        if !terminate(&self.child).await {
            warn!("could not send SIGTERM, killing archiving proxy");
            if let Err(e) = self.child.kill().await {
                warn!(error = %e, "failed to kill archiving proxy");
            }
            return;
        }

        match timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "archiving proxy exited"),
            Ok(Err(e)) => warn!(error = %e, "failed to wait for archiving proxy"),
            Err(_) => {
                warn!("archiving proxy ignored SIGTERM, killing it");
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "failed to kill archiving proxy");
                }
            }
        }
    }
}

// Sends SIGTERM to the child through the `kill` utility
//
// Returns false if the signal could not be delivered.
#[cfg(unix)]
async fn terminate(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let result = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(%status, pid, "kill -TERM failed for archiving proxy");
            false
        }
        Err(e) => {
            warn!(error = %e, pid, "failed to run kill for archiving proxy");
            false
        }
    }
}

// No graceful stop available here
#[cfg(not(unix))]
async fn terminate(_child: &Child) -> bool {
    false
}
