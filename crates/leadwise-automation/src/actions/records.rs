// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Actions that mutate records: tasks, lead status, coach assignment.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use leadwise_bus::{BusEvent, EventPayload};
use leadwise_core::LeadwiseError;
use leadwise_core::types::{LeadStatus, Task};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{
    ASSIGN_LEAD_TO_COACH, ActionContext, ActionDeps, ActionHandler, ActionOutcome, CREATE_TASK,
    UPDATE_LEAD_STATUS, config_str, payload_text,
};
use crate::template::render;

/// Renders a config string, treating a result with unresolved placeholders
/// as missing.
fn rendered(config: &Value, key: &str, payload: &Value) -> Option<String> {
    let value = render(config_str(config, key)?, payload);
    (!value.contains("{{")).then_some(value)
}

/// `CREATE_TASK`: creates a follow-up task for the event's lead.
///
/// Config: `title` (required), `description`, `assignee` (defaults to the
/// lead's coach), `dueInHours`.
pub struct CreateTask {
    deps: ActionDeps,
}

impl CreateTask {
    pub fn new(deps: ActionDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ActionHandler for CreateTask {
    fn action_type(&self) -> &'static str {
        CREATE_TASK
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        let Some(title_template) = config_str(config, "title") else {
            return Ok(ActionOutcome::skipped("no task title configured"));
        };
        let now = Utc::now();
        let due_at = config
            .get("dueInHours")
            .and_then(Value::as_f64)
            .filter(|h| h.is_finite() && *h >= 0.0)
            .map(|h| now + Duration::seconds((h * 3600.0) as i64));
        let assignee = rendered(config, "assignee", &ctx.payload)
            .or_else(|| payload_text(&ctx.payload, "lead.assignedCoachId"));

        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            lead_id: ctx.lead_id.clone(),
            title: render(title_template, &ctx.payload),
            description: config_str(config, "description").map(|d| render(d, &ctx.payload)),
            assignee,
            due_at,
            created_at: now,
        };
        self.deps.tasks.create_task(&task).await?;
        Ok(ActionOutcome::Executed(Some(json!({ "taskId": task.id }))))
    }
}

/// `UPDATE_LEAD_STATUS`: sets the lead's status and announces the change.
pub struct UpdateLeadStatus {
    deps: ActionDeps,
}

impl UpdateLeadStatus {
    pub fn new(deps: ActionDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ActionHandler for UpdateLeadStatus {
    fn action_type(&self) -> &'static str {
        UPDATE_LEAD_STATUS
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        let Some(raw_status) = config_str(config, "status") else {
            return Ok(ActionOutcome::skipped("no status configured"));
        };
        let status = LeadStatus::from_str(raw_status)
            .map_err(|_| LeadwiseError::InvalidInput(format!("unknown lead status `{raw_status}`")))?;
        let Some(lead_id) = &ctx.lead_id else {
            warn!(event_type = %ctx.event_type, "UPDATE_LEAD_STATUS without a lead id");
            return Ok(ActionOutcome::skipped("event has no lead id"));
        };
        let Some(lead) = self.deps.leads.get_lead(lead_id).await? else {
            warn!(lead_id = %lead_id, "UPDATE_LEAD_STATUS for unknown lead");
            return Ok(ActionOutcome::skipped(format!("lead {lead_id} not found")));
        };

        if lead.status == status {
            return Ok(ActionOutcome::Executed(Some(json!({
                "status": status.to_string(),
                "changed": false,
            }))));
        }

        self.deps.leads.set_status(lead_id, status).await?;
        info!(lead_id = %lead_id, from = %lead.status, to = %status, "lead status updated");
        self.deps.bus.publish(BusEvent::new(
            ctx.tenant_id.clone(),
            EventPayload::LeadStatusChanged {
                lead_id: lead_id.clone(),
                previous_status: lead.status.to_string(),
                status: status.to_string(),
            },
        ));

        Ok(ActionOutcome::Executed(Some(json!({
            "previousStatus": lead.status.to_string(),
            "status": status.to_string(),
            "changed": true,
        }))))
    }
}

/// `ASSIGN_LEAD_TO_COACH`: assigns the lead to `coachId` (may be a template).
pub struct AssignLeadToCoach {
    deps: ActionDeps,
}

impl AssignLeadToCoach {
    pub fn new(deps: ActionDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl ActionHandler for AssignLeadToCoach {
    fn action_type(&self) -> &'static str {
        ASSIGN_LEAD_TO_COACH
    }

    async fn execute(
        &self,
        config: &Value,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, LeadwiseError> {
        let Some(coach_id) = rendered(config, "coachId", &ctx.payload) else {
            return Ok(ActionOutcome::skipped("no coach id configured"));
        };
        let Some(lead_id) = &ctx.lead_id else {
            return Ok(ActionOutcome::skipped("event has no lead id"));
        };
        match self.deps.leads.assign_coach(lead_id, &coach_id).await {
            Ok(()) => Ok(ActionOutcome::Executed(Some(json!({ "coachId": coach_id })))),
            Err(LeadwiseError::NotFound { .. }) => {
                warn!(lead_id = %lead_id, "ASSIGN_LEAD_TO_COACH for unknown lead");
                Ok(ActionOutcome::skipped(format!("lead {lead_id} not found")))
            }
            Err(e) => Err(e),
        }
    }
}
