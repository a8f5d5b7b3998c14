// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadwise serve` command implementation.
//!
//! Opens storage, builds the collaborators from configuration, starts the
//! engine loops, and serves the inbound webhook until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use leadwise_config::model::LeadwiseConfig;
use leadwise_core::{LeadwiseError, StorageAdapter};
use leadwise_engine::{Collaborators, Engine};
use leadwise_storage::SqliteStorage;
use leadwise_whatsapp::webhook::start_server;
use leadwise_whatsapp::{GatewayTransport, ServerConfig, WebhookState};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Webhook deliveries buffered ahead of the pipeline.
const INBOUND_QUEUE: usize = 256;

/// How long in-flight work may take to finish after shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Crates whose logs follow `service.log_level`.
const LOG_TARGETS: &[&str] = &[
    "leadwise",
    "leadwise_ai",
    "leadwise_automation",
    "leadwise_bus",
    "leadwise_config",
    "leadwise_engine",
    "leadwise_notify",
    "leadwise_storage",
    "leadwise_whatsapp",
];

/// Runs the `leadwise serve` command.
pub async fn run_serve(config: LeadwiseConfig) -> Result<(), LeadwiseError> {
    init_tracing(&config.service.log_level);
    info!(name = %config.service.name, "starting leadwise serve");

    let storage = open_storage(&config).await?;

    let transport = Arc::new(GatewayTransport::from_config(&config.whatsapp)?);
    let collaborators = Collaborators {
        transport,
        analysis: leadwise_ai::analysis_client_from_config(&config.classifier)?,
        notifier: leadwise_notify::notifier_from_config(&config.notification)?,
        senders: leadwise_notify::senders_from_config(&config.notification)?,
    };
    let engine = Engine::build(&config, Arc::clone(&storage), collaborators);

    let cancel = install_signal_handler();
    let tracker = TaskTracker::new();
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    engine.spawn(inbound_rx, &cancel, &tracker);

    let state = WebhookState::new(inbound_tx, config.whatsapp.webhook_secret.as_deref());
    let server = ServerConfig {
        host: config.whatsapp.bind_address.clone(),
        port: config.whatsapp.port,
    };
    let served = start_server(&server, state, cancel.clone()).await;

    // The listener is gone, whether by signal or by error: stop everything.
    cancel.cancel();
    tracker.close();
    let drained = async {
        tracker.wait().await;
        engine.escalations.wait_for_notifications().await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drained).await.is_err() {
        warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "engine tasks did not stop in time"
        );
    }
    storage.close().await?;
    info!("leadwise stopped");
    served
}

/// Opens and migrates the configured database.
pub async fn open_storage(config: &LeadwiseConfig) -> Result<Arc<SqliteStorage>, LeadwiseError> {
    let storage = SqliteStorage::new(config.storage.clone())
        .with_step_max_attempts(config.scheduler.max_attempts);
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

/// Returns a token cancelled on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, only Ctrl+C stops the service");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// `RUST_LOG` wins; otherwise every Leadwise crate logs at `log_level` and
/// everything else at `warn`.
fn filter_directives(log_level: &str) -> String {
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
