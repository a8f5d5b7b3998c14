// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end: signed webhook delivery through the running engine loops.

use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use leadwise_core::types::{AutomationRule, Direction, RuleAction};
use leadwise_core::{AutomationRuleStore, LeadStore, TaskStore};
use leadwise_test_utils::TestHarness;
use leadwise_whatsapp::WebhookState;
use leadwise_whatsapp::webhook::{SIGNATURE_HEADER, router, sign};
use serde_json::{Value, json};
use serial_test::serial;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

const SECRET: &str = "webhook-secret";
const TENANT: &str = "coach-co";

fn raw_message(id: &str, text: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "key": {"remoteJid": "15551234567@s.whatsapp.net", "id": id, "fromMe": false},
        "message": {"conversation": text},
        "messageTimestamp": 1_772_359_200,
        "pushName": "Maria"
    }))
    .unwrap()
}

fn signed_request(body: Vec<u8>) -> Request<Body> {
    let signature = sign(SECRET.as_bytes(), &body).unwrap();
    Request::builder()
        .method("POST")
        .uri(format!("/webhook/{TENANT}"))
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
#[serial]
async fn webhook_message_flows_through_engine() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .storage
        .save_automation_rule(&AutomationRule {
            id: "new-lead-task".into(),
            tenant_id: TENANT.into(),
            name: "Call new leads".into(),
            trigger_event: "lead_created".into(),
            actions: vec![RuleAction {
                action_type: "CREATE_TASK".into(),
                config: json!({"title": "Call {{lead.name}}"}),
                conditions: vec![],
            }],
            is_active: true,
        })
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    let (tx, rx) = mpsc::channel(16);
    harness.engine.spawn(rx, &cancel, &tracker);
    let app = router(WebhookState::new(tx, Some(SECRET)));

    let response = app
        .oneshot(signed_request(raw_message("M1", "Hi, is the program still open?")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), 1024).await.unwrap()).unwrap();
    assert_eq!(body["accepted"], 1);

    assert!(
        harness
            .transport
            .wait_for_sent(1, Duration::from_secs(5))
            .await,
        "welcome step should be sent"
    );
    let sent = harness.transport.sent_messages().await;
    assert_eq!(sent[0].recipient, "15551234567");
    assert!(sent[0].body.starts_with("Hi Maria!"), "body: {}", sent[0].body);

    let storage = harness.storage.clone();
    assert!(
        wait_until(Duration::from_secs(5), || {
            let storage = storage.clone();
            async move { storage.list_tasks(TENANT).await.unwrap().len() == 1 }
        })
        .await,
        "lead_created automation should create a task"
    );
    let tasks = harness.storage.list_tasks(TENANT).await.unwrap();
    assert_eq!(tasks[0].title, "Call Maria");

    let lead = harness
        .storage
        .find_by_phone(TENANT, "15551234567")
        .await
        .unwrap()
        .unwrap();
    let history = harness
        .engine
        .conversations
        .history(TENANT, &lead.id, 10)
        .await
        .unwrap();
    assert_eq!(history[0].direction, Direction::Inbound);
    assert_eq!(history[0].body, "Hi, is the program still open?");
    assert!(history.iter().any(|m| m.automated));

    cancel.cancel();
    tracker.close();
    tokio::time::timeout(Duration::from_secs(5), tracker.wait())
        .await
        .expect("engine tasks should stop");
}

#[tokio::test]
#[serial]
async fn unsigned_webhook_is_rejected_before_the_pipeline() {
    let harness = TestHarness::new().await.unwrap();
    let (tx, mut rx) = mpsc::channel(4);
    let app = router(WebhookState::new(tx, Some(SECRET)));

    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhook/{TENANT}"))
        .header("content-type", "application/json")
        .body(Body::from(raw_message("M2", "hello")))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(rx.try_recv().is_err());
    assert!(
        harness
            .storage
            .find_by_phone(TENANT, "15551234567")
            .await
            .unwrap()
            .is_none()
    );
}
