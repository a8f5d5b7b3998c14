// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadwise rules` and `leadwise escalations` commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use leadwise_bus::EventBus;
use leadwise_config::model::{EscalationStoreKind, LeadwiseConfig};
use leadwise_core::types::{AutomationRule, ConversationRule};
use leadwise_core::{AutomationRuleStore, ConversationRuleStore, LeadwiseError, StorageAdapter};
use leadwise_engine::{ConversationRuleEngine, EscalationQueue};
use leadwise_storage::SqliteStorage;
use serde::Deserialize;

use crate::serve::open_storage;

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List a tenant's active conversation rules, and its automation rules
    /// for one event when `--event` is given.
    List {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        event: Option<String>,
    },
    /// Seed the default conversation rules for a tenant that has none.
    Seed {
        #[arg(long)]
        tenant: String,
    },
    /// Create or replace rules from a JSON file.
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum EscalationsCommand {
    /// List a tenant's pending escalations, oldest first.
    List {
        #[arg(long)]
        tenant: String,
    },
    /// Close a lead's escalation and reset its negative-message count.
    Resolve { lead_id: String },
}

/// Rules file accepted by `rules import`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    #[serde(default)]
    pub conversation: Vec<ConversationRule>,
    #[serde(default)]
    pub automation: Vec<AutomationRule>,
}

pub fn read_rule_file(path: &Path) -> Result<RuleFile, LeadwiseError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LeadwiseError::InvalidInput(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_rule_file(&content)
}

pub fn parse_rule_file(content: &str) -> Result<RuleFile, LeadwiseError> {
    serde_json::from_str(content)
        .map_err(|e| LeadwiseError::InvalidInput(format!("invalid rules file: {e}")))
}

/// Saves every rule in `file`, returning (conversation, automation) counts.
/// Nothing is saved when any conversation rule is invalid.
pub async fn import_rules(
    storage: &SqliteStorage,
    file: &RuleFile,
) -> Result<(usize, usize), LeadwiseError> {
    for rule in &file.conversation {
        rule.validate()?;
    }
    for rule in &file.conversation {
        storage.save_conversation_rule(rule).await?;
    }
    for rule in &file.automation {
        storage.save_automation_rule(rule).await?;
    }
    Ok((file.conversation.len(), file.automation.len()))
}

pub async fn run_rules(config: &LeadwiseConfig, command: RulesCommand) -> Result<(), LeadwiseError> {
    let storage = open_storage(config).await?;
    let result = rules_command(&storage, command).await;
    storage.close().await?;
    result
}

async fn rules_command(
    storage: &Arc<SqliteStorage>,
    command: RulesCommand,
) -> Result<(), LeadwiseError> {
    match command {
        RulesCommand::List { tenant, event } => {
            let rules = storage.active_conversation_rules(&tenant).await?;
            println!("conversation rules for {tenant}: {}", rules.len());
            for rule in rules {
                let delays: Vec<String> = rule
                    .steps
                    .iter()
                    .map(|s| format!("{}ms", s.delay_ms))
                    .collect();
                println!(
                    "  {} \"{}\" trigger={:?} steps=[{}]",
                    rule.id,
                    rule.name,
                    rule.trigger,
                    delays.join(", ")
                );
            }
            if let Some(event) = event {
                let rules = storage.active_rules_for_event(&tenant, &event).await?;
                println!("automation rules for {event}: {}", rules.len());
                for rule in rules {
                    let actions: Vec<&str> =
                        rule.actions.iter().map(|a| a.action_type.as_str()).collect();
                    println!(
                        "  {} \"{}\" actions=[{}]",
                        rule.id,
                        rule.name,
                        actions.join(", ")
                    );
                }
            }
        }
        RulesCommand::Seed { tenant } => {
            let engine = ConversationRuleEngine::new(storage.clone(), storage.clone());
            if engine.ensure_defaults(&tenant).await? {
                println!("default conversation rules seeded for {tenant}");
            } else {
                println!("{tenant} already has conversation rules, nothing seeded");
            }
        }
        RulesCommand::Import { file } => {
            let rules = read_rule_file(&file)?;
            let (conversation, automation) = import_rules(storage, &rules).await?;
            println!("imported {conversation} conversation and {automation} automation rules");
        }
    }
    Ok(())
}

pub async fn run_escalations(
    config: &LeadwiseConfig,
    command: EscalationsCommand,
) -> Result<(), LeadwiseError> {
    if config.escalation.store == EscalationStoreKind::Memory {
        return Err(LeadwiseError::InvalidInput(
            "escalations are kept in the serving process (escalation.store = \"memory\")".into(),
        ));
    }
    let storage = open_storage(config).await?;
    let queue = EscalationQueue::new(
        storage.clone(),
        storage.clone(),
        leadwise_notify::notifier_from_config(&config.notification)?,
        EventBus::default(),
    );
    let result = escalations_command(&queue, command).await;
    storage.close().await?;
    result
}

async fn escalations_command(
    queue: &EscalationQueue,
    command: EscalationsCommand,
) -> Result<(), LeadwiseError> {
    match command {
        EscalationsCommand::List { tenant } => {
            let pending = queue.list_pending(&tenant).await?;
            println!("pending escalations for {tenant}: {}", pending.len());
            for escalation in pending {
                println!(
                    "  {} {} {} ({}) \"{}\"",
                    escalation.created_at.to_rfc3339(),
                    escalation.lead_id,
                    escalation.reason,
                    escalation.detail,
                    escalation.message.content
                );
            }
        }
        EscalationsCommand::Resolve { lead_id } => match queue.resolve(&lead_id).await? {
            Some(_) => println!("escalation for {lead_id} resolved"),
            None => println!("no pending escalation for {lead_id}"),
        },
    }
    Ok(())
}
