// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// MKS WiFi bridge daemon.
//
// Entry point. Initialises logging and backend services, starts printer
// discovery, and logs the printer list whenever it changes until Ctrl-C.

mod services;

use mkswifi_core::AppConfig;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use services::app_services::{self, AppServices};
use services::data_dir;

#[tokio::main]
async fn main() {
    let dir = data_dir::data_dir();
    let config = app_services::load_config(&dir).unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_filter))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("MKS WiFi bridge starting");

    let svc = match AppServices::init_with(dir.clone(), config) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid configuration, using defaults");
            match AppServices::init_with(dir, AppConfig::default()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "service initialisation failed");
                    return;
                }
            }
        }
    };
    debug!(user_agent = %svc.user_agent(), "printer requests identify as");

    let (scheduler, task) = svc.spawn_scheduler();
    if let Err(e) = scheduler.start().await {
        warn!(error = %e, "failed to start discovery");
    }

    let mut changes = scheduler.subscribe();
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    warn!("discovery scheduler stopped");
                    break;
                }
                log_printers(&svc);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    if scheduler.shutdown().await.is_ok() {
        if let Err(e) = task.await {
            warn!(error = %e, "discovery scheduler task failed");
        }
    }
    svc.shutdown_network();
}

fn log_printers(svc: &AppServices) {
    let bound = match svc.registry().binding() {
        Ok(binding) => binding.network_key,
        Err(e) => {
            warn!(error = %e, "could not read machine binding");
            None
        }
    };
    let printers = svc.registry().list_printers();
    info!(count = printers.len(), bound = bound.as_deref(), "printer list changed");
    for printer in printers {
        info!(
            key = %printer.key,
            address = %printer.address,
            name = %printer.name,
            source = ?printer.source,
            connection = ?printer.connection,
            "printer"
        );
    }
}
