// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation processor against SQLite storage and mock collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadwise_ai::AnalysisClient;
use leadwise_automation::{ActionDeps, ActionRegistry, ActionResult, AutomationProcessor};
use leadwise_bus::{BusEvent, EventBus, EventPayload};
use leadwise_core::types::{
    AutomationRule, Condition, ConditionOperator, Lead, LeadStatus, NewContact, RuleAction,
    Sentiment, Urgency,
};
use leadwise_core::{AutomationRuleStore, LeadStore, MessageStore, TaskStore};
use leadwise_storage::SqliteStorage;
use leadwise_test_utils::fixtures::{analysis, temp_storage};
use leadwise_test_utils::{MockClassifier, MockNotifier, MockSender, MockTransport};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TENANT: &str = "coach-co";

struct Setup {
    storage: Arc<SqliteStorage>,
    transport: Arc<MockTransport>,
    notifier: Arc<MockNotifier>,
    classifier: Arc<MockClassifier>,
    email: Arc<MockSender>,
    sms: Arc<MockSender>,
    bus: EventBus,
    processor: Arc<AutomationProcessor>,
    _dir: TempDir,
}

async fn setup() -> Setup {
    build(true).await
}

/// Builds the processor; without `ai_enabled` the AI actions see no
/// classifier.
async fn build(ai_enabled: bool) -> Setup {
    let (storage, dir) = temp_storage().await.unwrap();
    let transport = Arc::new(MockTransport::new());
    let classifier = Arc::new(MockClassifier::new(analysis(
        Sentiment::Positive,
        0.9,
        "booking",
        Urgency::High,
    )));
    let notifier = Arc::new(MockNotifier::new());
    let email = Arc::new(MockSender::new("email"));
    let sms = Arc::new(MockSender::new("sms"));
    let bus = EventBus::default();
    let analysis_client = if ai_enabled {
        AnalysisClient::new(classifier.clone(), Duration::from_secs(2))
    } else {
        AnalysisClient::disabled()
    };

    let registry = ActionRegistry::with_builtins(ActionDeps {
        transport: transport.clone(),
        leads: storage.clone(),
        messages: storage.clone(),
        tasks: storage.clone(),
        notifier: notifier.clone(),
        senders: vec![email.clone(), sms.clone()],
        analysis: analysis_client,
        bus: bus.clone(),
    });
    let processor = Arc::new(AutomationProcessor::new(
        storage.clone(),
        storage.clone(),
        Arc::new(registry),
        16,
    ));
    Setup {
        storage,
        transport,
        notifier,
        classifier,
        email,
        sms,
        bus,
        processor,
        _dir: dir,
    }
}

async fn lead(storage: &SqliteStorage) -> Lead {
    storage
        .upsert_contact(&NewContact {
            tenant_id: TENANT.into(),
            phone_number: "15551234567".into(),
            name: "Ana".into(),
            source: "whatsapp".into(),
            initial_score: 10,
            first_message: "hi".into(),
            contacted_at: Utc::now(),
        })
        .await
        .unwrap()
        .lead
}

fn action(action_type: &str, config: Value, conditions: Vec<Condition>) -> RuleAction {
    RuleAction {
        action_type: action_type.into(),
        config,
        conditions,
    }
}

async fn save_rule(storage: &SqliteStorage, id: &str, event: &str, actions: Vec<RuleAction>) {
    storage
        .save_automation_rule(&AutomationRule {
            id: id.into(),
            tenant_id: TENANT.into(),
            name: id.into(),
            trigger_event: event.into(),
            actions,
            is_active: true,
        })
        .await
        .unwrap();
}

fn custom(name: &str, lead_id: Option<&str>, data: Value) -> BusEvent {
    BusEvent::new(
        TENANT,
        EventPayload::Custom {
            name: name.into(),
            lead_id: lead_id.map(str::to_string),
            data,
        },
    )
}

fn created(lead: &Lead) -> BusEvent {
    BusEvent::new(
        TENANT,
        EventPayload::LeadCreated {
            lead_id: lead.id.clone(),
            phone_number: lead.phone_number.clone(),
            source: "whatsapp".into(),
        },
    )
}

#[tokio::test]
async fn conditions_gate_each_action() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    let hot = Condition {
        field: "leadTemperature".into(),
        operator: ConditionOperator::Eq,
        value: json!("Hot"),
    };
    let cold = Condition {
        value: json!("Cold"),
        ..hot.clone()
    };
    save_rule(
        &s.storage,
        "hot-leads",
        "lead_scored",
        vec![
            action("SEND_WHATSAPP", json!({"template": "Hi {{lead.name}}, great news!"}), vec![hot]),
            action("CREATE_TASK", json!({"title": "Nurture {{lead.name}}"}), vec![cold]),
        ],
    )
    .await;

    let report = s
        .processor
        .handle_event(&custom("lead_scored", Some(&lead.id), json!({"leadTemperature": "Hot"})))
        .await
        .unwrap();
    assert_eq!(report.rules_matched, 1);
    assert!(matches!(report.actions[0].result, ActionResult::Executed(_)));
    assert_eq!(report.actions[1].result, ActionResult::ConditionsNotMet);

    let sent = s.transport.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "15551234567");
    assert_eq!(sent[0].body, "Hi Ana, great news!");

    let logged = s.storage.recent_messages(TENANT, &lead.id, 5).await.unwrap();
    assert_eq!(logged.len(), 1);
    assert!(logged[0].automated);
    assert!(s.storage.list_tasks(TENANT).await.unwrap().is_empty());
}

#[tokio::test]
async fn failures_do_not_stop_later_actions_or_rules() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    s.transport.fail_next_sends(1);
    save_rule(
        &s.storage,
        "first",
        "lead_created",
        vec![
            action("POST_TO_SLACK", json!({}), vec![]),
            action("SEND_WHATSAPP", json!({"template": "Welcome!"}), vec![]),
            action("CREATE_TASK", json!({"title": "Call {{lead.name}}"}), vec![]),
        ],
    )
    .await;
    save_rule(
        &s.storage,
        "second",
        "lead_created",
        vec![action(
            "SEND_NOTIFICATION",
            json!({"message": "New lead {{lead.name}} ({{phoneNumber}})"}),
            vec![],
        )],
    )
    .await;

    let report = s.processor.handle_event(&created(&lead)).await.unwrap();
    assert_eq!(report.rules_matched, 2);
    let results: Vec<&ActionResult> = report.actions.iter().map(|a| &a.result).collect();
    assert_eq!(results[0], &ActionResult::UnknownType);
    assert!(matches!(results[1], ActionResult::Failed(_)));
    assert!(matches!(results[2], ActionResult::Executed(_)));
    assert!(matches!(results[3], ActionResult::Executed(_)));
    assert_eq!(report.failed(), 1);

    let tasks = s.storage.list_tasks(TENANT).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Call Ana");
    assert_eq!(tasks[0].lead_id.as_deref(), Some(lead.id.as_str()));

    let notifications = s.notifier.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].subject, "Automation: lead_created");
    assert_eq!(notifications[0].body, "New lead Ana (15551234567)");
}

#[tokio::test]
async fn status_change_is_published_only_when_status_changes() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    let mut events = s.bus.subscribe();
    save_rule(
        &s.storage,
        "contact",
        "lead_created",
        vec![action("UPDATE_LEAD_STATUS", json!({"status": "contacted"}), vec![])],
    )
    .await;

    let first = s.processor.handle_event(&created(&lead)).await.unwrap();
    assert!(matches!(first.actions[0].result, ActionResult::Executed(_)));
    let updated = s.storage.get_lead(&lead.id).await.unwrap().unwrap();
    assert_eq!(updated.status, LeadStatus::Contacted);

    let published = events.try_recv().unwrap();
    assert!(matches!(
        published.payload,
        EventPayload::LeadStatusChanged { ref status, .. } if status == "contacted"
    ));

    let second = s.processor.handle_event(&created(&lead)).await.unwrap();
    assert_eq!(
        second.actions[0].result,
        ActionResult::Executed(Some(json!({"status": "contacted", "changed": false})))
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn status_update_without_lead_is_skipped() {
    let s = setup().await;
    save_rule(
        &s.storage,
        "orphan",
        "form_submitted",
        vec![action("UPDATE_LEAD_STATUS", json!({"status": "qualified"}), vec![])],
    )
    .await;

    let report = s
        .processor
        .handle_event(&custom("form_submitted", None, json!({})))
        .await
        .unwrap();
    assert!(matches!(report.actions[0].result, ActionResult::Skipped(_)));

    let report = s
        .processor
        .handle_event(&custom("form_submitted", Some("missing"), json!({})))
        .await
        .unwrap();
    assert!(matches!(report.actions[0].result, ActionResult::Skipped(_)));
}

#[tokio::test]
async fn redelivered_event_runs_once() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    save_rule(
        &s.storage,
        "welcome",
        "lead_created",
        vec![action("SEND_WHATSAPP", json!({"template": "Welcome!"}), vec![])],
    )
    .await;

    let event = created(&lead);
    assert!(!s.processor.handle_event(&event).await.unwrap().duplicate);
    assert!(s.processor.handle_event(&event).await.unwrap().duplicate);
    assert_eq!(s.transport.sent_count().await, 1);
}

#[tokio::test]
async fn disconnected_session_skips_whatsapp() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    s.transport.set_connected(false);
    save_rule(
        &s.storage,
        "welcome",
        "lead_created",
        vec![action("SEND_WHATSAPP", json!({"template": "Welcome!"}), vec![])],
    )
    .await;

    let report = s.processor.handle_event(&created(&lead)).await.unwrap();
    assert!(matches!(report.actions[0].result, ActionResult::Skipped(_)));
    assert_eq!(s.transport.sent_count().await, 0);
}

#[tokio::test]
async fn ai_score_and_email_actions() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    save_rule(
        &s.storage,
        "score",
        "web_message",
        vec![
            action("AI_SCORE_LEAD", json!({}), vec![]),
            action(
                "CREATE_EMAIL_MESSAGE",
                json!({
                    "to": "{{email}}",
                    "subject": "Thanks {{lead.name}}",
                    "template": "We got: {{message.content}}",
                }),
                vec![],
            ),
        ],
    )
    .await;

    let report = s
        .processor
        .handle_event(&custom(
            "web_message",
            Some(&lead.id),
            json!({"email": "ana@example.com", "message": {"content": "Can I book a call?"}}),
        ))
        .await
        .unwrap();
    assert_eq!(report.executed(), 2);

    let scored = s.storage.get_lead(&lead.id).await.unwrap().unwrap();
    assert_eq!(scored.score, 10 + 5 + 10 + 8);

    let emails = s.email.sent().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].recipient, "ana@example.com");
    assert_eq!(emails[0].subject.as_deref(), Some("Thanks Ana"));
    assert_eq!(emails[0].body, "We got: Can I book a call?");
}

#[tokio::test]
async fn assign_lead_to_coach_sets_the_coach() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    save_rule(
        &s.storage,
        "assign",
        "lead_qualified",
        vec![action("ASSIGN_LEAD_TO_COACH", json!({"coachId": "{{coach}}"}), vec![])],
    )
    .await;

    let report = s
        .processor
        .handle_event(&custom("lead_qualified", Some(&lead.id), json!({"coach": "coach-7"})))
        .await
        .unwrap();
    assert_eq!(
        report.actions[0].result,
        ActionResult::Executed(Some(json!({"coachId": "coach-7"})))
    );
    let assigned = s.storage.get_lead(&lead.id).await.unwrap().unwrap();
    assert_eq!(assigned.assigned_coach_id.as_deref(), Some("coach-7"));
}

#[tokio::test]
async fn assign_lead_to_coach_skips_unknown_lead_or_coach() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    save_rule(
        &s.storage,
        "assign",
        "lead_qualified",
        vec![action("ASSIGN_LEAD_TO_COACH", json!({"coachId": "{{coach}}"}), vec![])],
    )
    .await;

    let report = s
        .processor
        .handle_event(&custom("lead_qualified", Some("missing"), json!({"coach": "coach-7"})))
        .await
        .unwrap();
    assert_eq!(
        report.actions[0].result,
        ActionResult::Skipped("lead missing not found".into())
    );
    assert_eq!(report.failed(), 0);

    // The template has nothing to fill `{{coach}}` with.
    let report = s
        .processor
        .handle_event(&custom("lead_qualified", Some(&lead.id), json!({})))
        .await
        .unwrap();
    assert!(matches!(report.actions[0].result, ActionResult::Skipped(_)));
    let unchanged = s.storage.get_lead(&lead.id).await.unwrap().unwrap();
    assert_eq!(unchanged.assigned_coach_id, None);
}

#[tokio::test]
async fn ai_generate_copy_renders_the_prompt() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    s.classifier.set_generated("Ana, your free session is waiting!").await;
    save_rule(
        &s.storage,
        "copy",
        "lead_created",
        vec![action(
            "AI_GENERATE_COPY",
            json!({"prompt": "Write a short invite for {{lead.name}}"}),
            vec![],
        )],
    )
    .await;

    let report = s.processor.handle_event(&created(&lead)).await.unwrap();
    assert_eq!(
        report.actions[0].result,
        ActionResult::Executed(Some(json!({"text": "Ana, your free session is waiting!"})))
    );
    let calls = s.classifier.calls().await;
    assert_eq!(calls, vec!["Write a short invite for Ana".to_string()]);
}

#[tokio::test]
async fn ai_actions_are_skipped_without_a_classifier() {
    let s = build(false).await;
    let lead = lead(&s.storage).await;
    save_rule(
        &s.storage,
        "copy",
        "lead_created",
        vec![action("AI_GENERATE_COPY", json!({"prompt": "Invite {{lead.name}}"}), vec![])],
    )
    .await;

    let report = s.processor.handle_event(&created(&lead)).await.unwrap();
    assert_eq!(
        report.actions[0].result,
        ActionResult::Skipped("no AI classifier configured".into())
    );
    assert!(s.classifier.calls().await.is_empty());
}

#[tokio::test]
async fn ai_detect_sentiment_reports_the_analysis() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    save_rule(
        &s.storage,
        "sentiment",
        "web_message",
        vec![action("AI_DETECT_SENTIMENT", json!({"textField": "note"}), vec![])],
    )
    .await;

    let report = s
        .processor
        .handle_event(&custom(
            "web_message",
            Some(&lead.id),
            json!({"note": "Loved the first session"}),
        ))
        .await
        .unwrap();
    let ActionResult::Executed(Some(value)) = &report.actions[0].result else {
        panic!("expected executed, got {:?}", report.actions[0].result);
    };
    assert_eq!(value["sentiment"], "positive");
    assert_eq!(value["intent"], "booking");
    assert_eq!(value["urgency"], "high");
    assert_eq!(
        s.classifier.calls().await,
        vec!["Loved the first session".to_string()]
    );

    // Detection alone never touches the lead score.
    let unchanged = s.storage.get_lead(&lead.id).await.unwrap().unwrap();
    assert_eq!(unchanged.score, 10);
}

#[tokio::test]
async fn sms_message_goes_to_the_lead_phone() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    save_rule(
        &s.storage,
        "sms",
        "lead_created",
        vec![action(
            "CREATE_SMS_MESSAGE",
            json!({"template": "Hi {{lead.name}}, reply YES to book"}),
            vec![],
        )],
    )
    .await;

    let report = s.processor.handle_event(&created(&lead)).await.unwrap();
    let ActionResult::Executed(Some(value)) = &report.actions[0].result else {
        panic!("expected executed, got {:?}", report.actions[0].result);
    };
    assert_eq!(value["channel"], "sms");
    assert_eq!(value["recipient"], "15551234567");

    let texts = s.sms.sent().await;
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].tenant_id, TENANT);
    assert_eq!(texts[0].recipient, "15551234567");
    assert_eq!(texts[0].subject, None);
    assert_eq!(texts[0].body, "Hi Ana, reply YES to book");
    assert!(s.email.sent().await.is_empty());
    assert_eq!(s.transport.sent_count().await, 0);
}

#[tokio::test]
async fn run_loop_handles_published_events() {
    let s = setup().await;
    let lead = lead(&s.storage).await;
    save_rule(
        &s.storage,
        "welcome",
        "lead_created",
        vec![action("SEND_WHATSAPP", json!({"template": "Welcome {{lead.name}}!"}), vec![])],
    )
    .await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Arc::clone(&s.processor).run(s.bus.subscribe(), cancel.clone()));
    s.bus.publish(created(&lead));

    assert!(s.transport.wait_for_sent(1, Duration::from_secs(5)).await);
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("processor should stop")
        .unwrap();
}
