// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the inbound pipeline and the step dispatcher.

use chrono::{TimeDelta, Utc};
use leadwise_bus::EventPayload;
use leadwise_core::types::{
    AutomationRule, ConversationRule, ConversationTrigger, Direction, EscalationReason,
    NormalizedMessage, RuleAction, RuleStep, Sentiment, StepStatus, Urgency,
};
use leadwise_core::{AutomationRuleStore, ConversationRuleStore, LeadStore};
use leadwise_engine::PipelineOutcome;
use leadwise_test_utils::TestHarness;
use leadwise_test_utils::fixtures::{analysis, inbound_message};
use serde_json::json;

const TENANT: &str = "coach-co";
const PHONE: &str = "15551234567";

fn named(text: &str, name: &str) -> NormalizedMessage {
    NormalizedMessage {
        push_name: Some(name.to_string()),
        ..inbound_message(PHONE, text)
    }
}

#[tokio::test]
async fn first_message_creates_lead_and_sends_welcome() {
    let harness = TestHarness::new().await.unwrap();
    let mut events = harness.engine.bus.subscribe();

    let outcome = harness.send(TENANT, named("hi there", "Ana")).await.unwrap();
    let PipelineOutcome::Processed {
        lead_id,
        scheduled_steps,
    } = outcome
    else {
        panic!("expected processed outcome, got {outcome:?}");
    };
    assert_eq!(scheduled_steps.len(), 3);

    let lead = harness.storage.get_lead(&lead_id).await.unwrap().unwrap();
    assert_eq!(lead.score, 10);
    assert_eq!(lead.name, "Ana");
    assert_eq!(lead.source, "whatsapp");

    let first = events.recv().await.unwrap();
    assert!(matches!(first.payload, EventPayload::LeadCreated { .. }));
    let second = events.recv().await.unwrap();
    assert!(matches!(second.payload, EventPayload::MessageReceived { .. }));

    let report = harness.tick().await.unwrap();
    assert_eq!(report.sent, 1);
    let sent = harness.transport.sent_messages().await;
    assert_eq!(sent[0].recipient, PHONE);
    assert!(sent[0].body.starts_with("Hi Ana!"), "body: {}", sent[0].body);

    let history = harness
        .engine
        .conversations
        .history(TENANT, &lead_id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].direction, Direction::Inbound);
    assert!(!history[0].automated);
    assert_eq!(history[1].direction, Direction::Outbound);
    assert!(history[1].automated);
    assert_eq!(
        harness
            .storage
            .count_steps(&lead_id, StepStatus::Pending)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn interaction_score_is_added_to_initial_score() {
    let harness = TestHarness::builder()
        .with_analysis(analysis(Sentiment::Positive, 0.9, "booking", Urgency::High))
        .build()
        .await
        .unwrap();

    let outcome = harness
        .send_message(TENANT, PHONE, "I'd love to book a session this week")
        .await
        .unwrap();
    let PipelineOutcome::Processed {
        lead_id,
        scheduled_steps,
    } = outcome
    else {
        panic!("expected processed outcome, got {outcome:?}");
    };
    // Welcome sequence plus the urgent acknowledgement.
    assert_eq!(scheduled_steps.len(), 4);

    let lead = harness.storage.get_lead(&lead_id).await.unwrap().unwrap();
    assert_eq!(lead.score, 10 + 5 + 10 + 8);
}

#[tokio::test]
async fn strongly_negative_message_escalates_and_skips_rules() {
    let harness = TestHarness::builder()
        .with_analysis(analysis(Sentiment::Negative, 0.5, "complaint", Urgency::Low))
        .build()
        .await
        .unwrap();

    let outcome = harness
        .send_message(TENANT, PHONE, "This is not what I paid for")
        .await
        .unwrap();
    let PipelineOutcome::Escalated { lead_id, reason } = outcome else {
        panic!("expected escalation, got {outcome:?}");
    };
    assert_eq!(reason, EscalationReason::NegativeSentiment);

    assert_eq!(
        harness
            .storage
            .count_steps(&lead_id, StepStatus::Pending)
            .await
            .unwrap(),
        0
    );
    let pending = harness.engine.escalations.list_pending(TENANT).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].lead_id, lead_id);

    harness.engine.escalations.wait_for_notifications().await;
    let notifications = harness.notifier.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].subject.starts_with("Escalation:"));

    // The inbound message survives the short-circuit.
    let history = harness
        .engine
        .conversations
        .history(TENANT, &lead_id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn mildly_negative_message_gets_support_reply() {
    let harness = TestHarness::builder()
        .with_analysis(analysis(Sentiment::Negative, 0.65, "general", Urgency::Low))
        .build()
        .await
        .unwrap();

    let outcome = harness
        .send_message(TENANT, PHONE, "not sure this is for me")
        .await
        .unwrap();
    let PipelineOutcome::Processed {
        lead_id,
        scheduled_steps,
    } = outcome
    else {
        panic!("expected processed outcome, got {outcome:?}");
    };
    // Welcome sequence plus the support reply.
    assert_eq!(scheduled_steps.len(), 4);
    assert!(harness.notifier.notifications().await.is_empty());

    let lead = harness.storage.get_lead(&lead_id).await.unwrap().unwrap();
    assert_eq!(lead.negative_message_count, 1);
    assert_eq!(lead.score, 10 - 3);
}

#[tokio::test]
async fn urgent_keyword_escalates_neutral_message() {
    let harness = TestHarness::new().await.unwrap();
    let outcome = harness
        .send_message(TENANT, PHONE, "It's URGENT, call me")
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PipelineOutcome::Escalated {
            reason: EscalationReason::UrgentKeyword,
            ..
        }
    ));
}

#[tokio::test]
async fn escalated_message_does_not_trigger_message_received_rules() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .storage
        .save_automation_rule(&AutomationRule {
            id: "auto-reply".into(),
            tenant_id: TENANT.into(),
            name: "Auto reply".into(),
            trigger_event: "whatsapp_message_received".into(),
            actions: vec![RuleAction {
                action_type: "SEND_WHATSAPP".into(),
                config: json!({ "template": "Thanks for your message!" }),
                conditions: vec![],
            }],
            is_active: true,
        })
        .await
        .unwrap();
    let mut events = harness.engine.bus.subscribe();

    let outcome = harness
        .send_message(TENANT, PHONE, "URGENT help needed")
        .await
        .unwrap();
    assert!(matches!(outcome, PipelineOutcome::Escalated { .. }));

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        harness.engine.processor.handle_event(&event).await.unwrap();
        names.push(event.name().to_string());
    }
    assert!(names.iter().any(|n| n == "escalation_triggered"), "events: {names:?}");
    assert!(!names.iter().any(|n| n == "whatsapp_message_received"), "events: {names:?}");
    assert_eq!(harness.transport.sent_count().await, 0);
}

#[tokio::test]
async fn redelivered_webhook_is_processed_once() {
    let harness = TestHarness::new().await.unwrap();
    let message = named("hi there", "Ana");

    let first = harness.send(TENANT, message.clone()).await.unwrap();
    let PipelineOutcome::Processed { lead_id, .. } = first else {
        panic!("expected processed outcome, got {first:?}");
    };
    let again = harness.send(TENANT, message.clone()).await.unwrap();
    assert_eq!(again, PipelineOutcome::Ignored("duplicate delivery"));

    let lead = harness.storage.get_lead(&lead_id).await.unwrap().unwrap();
    assert_eq!(lead.message_count, 1);
    assert_eq!(lead.score, 10);
    let history = harness
        .engine
        .conversations
        .history(TENANT, &lead_id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    // The same transport id from another tenant is a different message.
    let other = harness.send("other-co", message).await.unwrap();
    assert!(matches!(other, PipelineOutcome::Processed { .. }));
}

#[tokio::test]
async fn far_future_transport_timestamp_is_stored_and_lead_stays_usable() {
    let harness = TestHarness::new().await.unwrap();
    let message = NormalizedMessage {
        timestamp: chrono::DateTime::<Utc>::MAX_UTC,
        ..named("hi there", "Ana")
    };
    let outcome = harness.send(TENANT, message).await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::Processed { .. }));

    let outcome = harness.send_message(TENANT, PHONE, "still there?").await.unwrap();
    let PipelineOutcome::Processed { lead_id, .. } = outcome else {
        panic!("expected processed outcome, got {outcome:?}");
    };
    let lead = harness.storage.get_lead(&lead_id).await.unwrap().unwrap();
    assert_eq!(lead.message_count, 2);
    assert_eq!(harness.tick().await.unwrap().sent, 1);
}

#[tokio::test]
async fn conversation_rule_with_oversized_delay_is_refused() {
    let harness = TestHarness::new().await.unwrap();
    let saved = harness
        .storage
        .save_conversation_rule(&ConversationRule {
            id: "far-out".into(),
            tenant_id: TENANT.into(),
            name: "Far out".into(),
            trigger: ConversationTrigger::FirstMessage,
            steps: vec![RuleStep {
                delay_ms: 400_000_000_000_000,
                template: "too late".into(),
            }],
            is_active: true,
        })
        .await;
    assert!(saved.is_err());

    harness.send_message(TENANT, PHONE, "hello").await.unwrap();
    let report = harness.tick().await.unwrap();
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn repeated_negative_messages_escalate_until_resolved() {
    let harness = TestHarness::builder()
        .with_analysis(analysis(Sentiment::Negative, 0.7, "general", Urgency::Low))
        .with_memory_escalations()
        .build()
        .await
        .unwrap();

    for text in ["meh", "still meh"] {
        let outcome = harness.send_message(TENANT, PHONE, text).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Processed { .. }));
    }
    let outcome = harness.send_message(TENANT, PHONE, "meh again").await.unwrap();
    let PipelineOutcome::Escalated { lead_id, reason } = outcome else {
        panic!("expected escalation, got {outcome:?}");
    };
    assert_eq!(reason, EscalationReason::RepeatedNegativeMessages);

    let resolved = harness.engine.escalations.resolve(&lead_id).await.unwrap();
    assert!(resolved.is_some());
    let lead = harness.storage.get_lead(&lead_id).await.unwrap().unwrap();
    assert_eq!(lead.negative_message_count, 0);

    let outcome = harness.send_message(TENANT, PHONE, "meh").await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::Processed { .. }));
}

#[tokio::test]
async fn steps_fire_on_independent_offsets() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .storage
        .save_conversation_rule(&ConversationRule {
            id: "two-step".into(),
            tenant_id: TENANT.into(),
            name: "Two step".into(),
            trigger: ConversationTrigger::FirstMessage,
            steps: vec![
                RuleStep {
                    delay_ms: 0,
                    template: "A".into(),
                },
                RuleStep {
                    delay_ms: 1000,
                    template: "B".into(),
                },
            ],
            is_active: true,
        })
        .await
        .unwrap();

    let outcome = harness.send_message(TENANT, PHONE, "hello").await.unwrap();
    let PipelineOutcome::Processed { scheduled_steps, .. } = outcome else {
        panic!("expected processed outcome, got {outcome:?}");
    };
    assert_eq!(scheduled_steps.len(), 2);

    assert_eq!(harness.tick().await.unwrap().sent, 1);
    let later = Utc::now() + TimeDelta::seconds(2);
    assert_eq!(harness.tick_at(later).await.unwrap().sent, 1);

    let bodies: Vec<String> = harness
        .transport
        .sent_messages()
        .await
        .into_iter()
        .map(|m| m.body)
        .collect();
    assert_eq!(bodies, vec!["A", "B"]);
}

#[tokio::test]
async fn concurrent_first_messages_resolve_to_one_lead() {
    let harness = TestHarness::new().await.unwrap();
    let mut events = harness.engine.bus.subscribe();

    let outcomes = futures::future::join_all(
        (0..5).map(|i| harness.send_message(TENANT, PHONE, if i == 0 { "hi" } else { "hello?" })),
    )
    .await;

    let mut lead_ids: Vec<String> = outcomes
        .into_iter()
        .map(|o| match o.unwrap() {
            PipelineOutcome::Processed { lead_id, .. } => lead_id,
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect();
    lead_ids.dedup();
    assert_eq!(lead_ids.len(), 1);

    let lead = harness
        .storage
        .find_by_phone(TENANT, PHONE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.message_count, 5);
    // Only the creating message fires the welcome sequence.
    assert_eq!(
        harness
            .storage
            .count_steps(&lead.id, StepStatus::Pending)
            .await
            .unwrap(),
        3
    );

    let mut created = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event.payload, EventPayload::LeadCreated { .. }) {
            created += 1;
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn group_and_own_messages_are_ignored() {
    let harness = TestHarness::new().await.unwrap();
    let group = NormalizedMessage {
        is_group: true,
        ..inbound_message(PHONE, "hi all")
    };
    let own = NormalizedMessage {
        from_me: true,
        ..inbound_message(PHONE, "hi")
    };
    assert!(matches!(
        harness.send(TENANT, group).await.unwrap(),
        PipelineOutcome::Ignored(_)
    ));
    assert!(matches!(
        harness.send(TENANT, own).await.unwrap(),
        PipelineOutcome::Ignored(_)
    ));
    assert!(harness.storage.find_by_phone(TENANT, PHONE).await.unwrap().is_none());
}

#[tokio::test]
async fn disconnected_session_defers_delivery() {
    let harness = TestHarness::new().await.unwrap();
    harness.transport.set_connected(false);
    harness.send_message(TENANT, PHONE, "hi").await.unwrap();

    let report = harness.tick().await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(harness.transport.sent_count().await, 0);

    harness.transport.set_connected(true);
    assert_eq!(harness.tick().await.unwrap().sent, 1);
}
