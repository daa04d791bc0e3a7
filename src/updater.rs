//! Background database refresh
//!
//! [`spawn_updater`] runs [`GeoManager::update_databases`] on the configured
//! cadence from a dedicated thread. The returned [`UpdaterHandle`] stops the
//! thread when dropped; an update already in progress finishes first.

use crate::manager::GeoManager;
use crossbeam_channel::{bounded, select, tick, Sender};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Handle to a running updater thread
pub struct UpdaterHandle {
    shutdown_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl UpdaterHandle {
    /// Stop the updater and wait for it to exit
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for UpdaterHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Start refreshing on the manager's configured cadence
///
/// Returns `Ok(None)` when the cadence is `never`.
pub fn spawn_updater(manager: Arc<GeoManager>) -> io::Result<Option<UpdaterHandle>> {
    match manager.config().update_cadence.interval() {
        Some(interval) => spawn_updater_with_interval(manager, interval).map(Some),
        None => Ok(None),
    }
}

/// Start refreshing every `interval`
pub fn spawn_updater_with_interval(
    manager: Arc<GeoManager>,
    interval: Duration,
) -> io::Result<UpdaterHandle> {
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let ticker = tick(interval);

    let handle = thread::Builder::new()
        .name("geolens-updater".to_string())
        .spawn(move || {
            info!(interval_secs = interval.as_secs(), "database updater started");
            loop {
                select! {
                    recv(ticker) -> _ => match manager.update_databases() {
                        Ok(()) => info!(generation = manager.generation(), "databases updated"),
                        Err(e) => warn!(error = %e, "database update failed"),
                    },
                    recv(shutdown_rx) -> _ => break,
                }
            }
            info!("database updater stopped");
        })?;

    Ok(UpdaterHandle {
        shutdown_tx,
        handle: Some(handle),
    })
}
