//! warden: hosts the security manager behind a line-oriented command loop.

mod command;
mod config;
mod host;
mod providers;
mod source;

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_security::{SecurityManager, StaticModuleLoader};

use crate::config::HostConfig;
use crate::host::Outcome;
use crate::source::FileConfigurationSource;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment
    let config = HostConfig::from_env().expect("failed to load configuration");
    tracing::info!(
        profiles_dir = %config.security.profiles_dir.display(),
        providers_file = %config.providers_file.display(),
        "Loaded configuration"
    );

    let modules = Arc::new(StaticModuleLoader::new());
    modules.register(providers::static_module());
    let source = Arc::new(FileConfigurationSource::new(&config.providers_file));

    let manager = SecurityManager::builder()
        .config(config.security.clone())
        .configuration_source(source.clone())
        .module_loader(modules)
        .build();
    manager.load().await;
    tracing::info!(
        providers = manager.get_providers().len(),
        profiles = manager.get_profiles().len(),
        "Security manager ready"
    );

    // Change notifications: SIGHUP marks the provider file as edited
    let (changes, change_rx) = mpsc::channel(16);
    let _watcher = manager.watch(change_rx);
    spawn_hangup_listener(changes, source.changed_event());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read command");
                break;
            }
        };

        let Some(command) = command::parse(&line) else {
            continue;
        };
        match command {
            Ok(command) => match host::execute(&manager, command).await {
                Outcome::Print(output) => println!("{output}"),
                Outcome::Quit => break,
            },
            Err(e) => eprintln!("{e}"),
        }
    }

    // Flush pending profile edits before exiting
    if let Err(report) = manager.save().await {
        tracing::warn!(error = %report, "Failed to save security profiles on shutdown");
    }
    tracing::info!("Shut down");
}

#[cfg(unix)]
fn spawn_hangup_listener(
    changes: mpsc::Sender<warden_security::ChangeEvent>,
    event: warden_security::ChangeEvent,
) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(hangups) => hangups,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGHUP handler");
            return;
        }
    };

    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            tracing::info!("SIGHUP received, scheduling reload");
            if changes.send(event.clone()).await.is_err() {
                break;
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_hangup_listener(
    _changes: mpsc::Sender<warden_security::ChangeEvent>,
    _event: warden_security::ChangeEvent,
) {
}
