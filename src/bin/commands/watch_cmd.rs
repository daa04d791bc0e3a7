use anyhow::{Context, Result};
use geolens::{spawn_updater, Config};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli_utils::http_manager;
use crate::commands::update_cmd::print_status;

pub fn cmd_watch(config: Config, interval_secs: Option<u64>) -> Result<()> {
    let manager = http_manager(config);
    if let Err(e) = manager.load_databases() {
        warn!(error = %e, "initial load failed, waiting for the next update");
    }
    print_status(&manager, false)?;

    let updater = match interval_secs {
        Some(secs) => Some(geolens::updater::spawn_updater_with_interval(
            manager.clone(),
            Duration::from_secs(secs.max(1)),
        )?),
        None => spawn_updater(manager.clone())?,
    };
    if updater.is_none() {
        info!("update cadence is 'never'; serving the loaded databases until interrupted");
    }

    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    let _ = rx.recv();
    info!("shutting down");
    drop(updater);
    manager.close();
    Ok(())
}
