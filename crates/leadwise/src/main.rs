// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leadwise - WhatsApp conversation automation for coaching businesses.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use leadwise_config::{ConfigError, LeadwiseConfig};

/// Leadwise - WhatsApp conversation automation for coaching businesses.
#[derive(Parser, Debug)]
#[command(name = "leadwise", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook listener, pipeline, dispatcher, and automation processor.
    Serve,
    /// Validate the configuration and print the effective settings.
    CheckConfig,
    /// Manage conversation and automation rules.
    Rules {
        #[command(subcommand)]
        action: admin::RulesCommand,
    },
    /// Inspect and resolve pending escalations.
    Escalations {
        #[command(subcommand)]
        action: admin::EscalationsCommand,
    },
}

fn load(path: Option<&PathBuf>) -> Result<LeadwiseConfig, Vec<ConfigError>> {
    match path {
        Some(path) => leadwise_config::load_and_validate_path(path),
        None => leadwise_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            leadwise_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::CheckConfig) => {
            print_config_summary(&config);
            Ok(())
        }
        Some(Commands::Rules { action }) => admin::run_rules(&config, action).await,
        Some(Commands::Escalations { action }) => admin::run_escalations(&config, action).await,
        None => {
            println!("leadwise: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_config_summary(config: &LeadwiseConfig) {
    println!("configuration OK");
    println!("  service:     {} (log level {})", config.service.name, config.service.log_level);
    println!("  database:    {}", config.storage.database_path);
    println!("  gateway:     {}", config.whatsapp.gateway_url);
    println!(
        "  webhook:     {}:{} (signatures {})",
        config.whatsapp.bind_address,
        config.whatsapp.port,
        if config.whatsapp.webhook_secret.is_some() { "required" } else { "off" }
    );
    println!(
        "  classifier:  {}",
        config.classifier.endpoint.as_deref().unwrap_or("disabled (fallback analysis)")
    );
    println!(
        "  escalation:  below {:.2} sentiment, {} negative messages, {} keywords, {:?} store",
        config.escalation.negative_sentiment_threshold,
        config.escalation.negative_message_threshold,
        config.escalation.urgent_keywords.len(),
        config.escalation.store
    );
    println!(
        "  scheduler:   poll {}ms, batch {}, {} attempts",
        config.scheduler.poll_interval_ms, config.scheduler.batch_size, config.scheduler.max_attempts
    );
}
