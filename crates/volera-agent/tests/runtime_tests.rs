// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use tempfile::TempDir;
use volera_agent::{AgentRuntime, Prompt, RetryPolicy};
use volera_config::model::CreditsConfig;
use volera_core::{Charge, VoleraError};
use volera_credits::CreditLedger;
use volera_storage::Database;
use volera_test_utils::{MockProvider, MockReply};

struct Fixture {
    runtime: AgentRuntime,
    ledger: Arc<CreditLedger>,
    provider: Arc<MockProvider>,
    _db: Database,
    _dir: TempDir,
}

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(8),
        call_timeout: Duration::from_secs(20),
    }
}

async fn fixture(provider: MockProvider, credits: CreditsConfig, policy: RetryPolicy) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("agent.db").to_str().unwrap())
        .await
        .unwrap();
    let ledger = Arc::new(CreditLedger::new(db.connection().clone(), &credits).unwrap());
    let provider = Arc::new(provider);
    let runtime = AgentRuntime::new(provider.clone(), ledger.clone(), policy);
    Fixture {
        runtime,
        ledger,
        provider,
        _db: db,
        _dir: dir,
    }
}

fn funded(initial_balance: i64) -> CreditsConfig {
    CreditsConfig {
        initial_balance,
        ..CreditsConfig::default()
    }
}

#[tokio::test]
async fn insufficient_credits_fail_before_the_model_is_called() {
    let f = fixture(MockProvider::new(), funded(0), fast_policy(3)).await;

    let err = f
        .runtime
        .call_llm("alice", &Prompt::user("hi"), Charge::Text, "m", None, &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VoleraError::InsufficientCredits {
            required: 1,
            available: 0
        }
    ));
    assert_eq!(f.provider.call_count(), 0);
}

#[tokio::test]
async fn successful_call_deducts_once_and_returns_history() {
    let provider = MockProvider::with_responses(vec!["a fine answer".into()]);
    let f = fixture(provider, funded(10), fast_policy(3)).await;

    let response = f
        .runtime
        .call_llm(
            "alice",
            &Prompt::new("be brief", "which laptop?"),
            Charge::Text,
            "openai/gpt-4o-mini",
            Some(serde_json::json!({"locale": "en-US"})),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(response.text, "a fine answer");
    assert_eq!(response.new_messages.len(), 2);
    assert_eq!(response.new_messages[0].content, "which laptop?");
    assert_eq!(f.ledger.balance("alice").await.unwrap(), 9);

    let txs = f.ledger.transactions("alice").await.unwrap();
    let charged: Vec<_> = txs.iter().filter(|t| t.delta < 0).collect();
    assert_eq!(charged.len(), 1);
    assert_eq!(charged[0].ledger_key.as_deref(), Some(response.id.as_str()));

    let request = &f.provider.requests()[0];
    assert_eq!(request.model, "openai/gpt-4o-mini");
    assert_eq!(request.system.as_deref(), Some("be brief"));
    assert_eq!(request.deps.as_ref().unwrap()["locale"], "en-US");
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_backoff() {
    let provider = MockProvider::new();
    provider.push(MockReply::Transient("429".into()));
    provider.push(MockReply::Transient("503".into()));
    provider.push(MockReply::Text("third time".into()));
    let f = fixture(provider, funded(10), fast_policy(3)).await;

    let started = tokio::time::Instant::now();
    let response = f
        .runtime
        .call_llm("alice", &Prompt::user("q"), Charge::Text, "m", None, &[])
        .await
        .unwrap();

    assert_eq!(response.text, "third time");
    assert_eq!(f.provider.call_count(), 3);
    // 500ms then 1s of backoff.
    assert!(started.elapsed() >= Duration::from_millis(1_500));
    assert_eq!(f.ledger.balance("alice").await.unwrap(), 9);
}

#[tokio::test]
async fn fatal_errors_are_not_retried() {
    let provider = MockProvider::new();
    provider.push(MockReply::Fatal("400 bad request".into()));
    let f = fixture(provider, funded(10), fast_policy(3)).await;

    let err = f
        .runtime
        .call_llm("alice", &Prompt::user("q"), Charge::Text, "m", None, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, VoleraError::Provider { transient: false, .. }));
    assert_eq!(f.provider.call_count(), 1);
    assert_eq!(f.ledger.balance("alice").await.unwrap(), 10);
}

#[tokio::test(start_paused = true)]
async fn each_attempt_times_out_once() {
    let provider = MockProvider::new();
    provider.push(MockReply::Hang);
    provider.push(MockReply::Hang);
    let f = fixture(provider, funded(10), fast_policy(1)).await;

    let err = f
        .runtime
        .call_llm("alice", &Prompt::user("q"), Charge::Text, "m", None, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, VoleraError::Timeout { duration } if duration == Duration::from_secs(20)));
    assert_eq!(f.provider.call_count(), 2);
    assert_eq!(f.ledger.balance("alice").await.unwrap(), 10);
}

#[tokio::test]
async fn daily_limit_blocks_the_call() {
    let credits = CreditsConfig {
        initial_balance: 1_000,
        daily_limit: Some(1),
        ..CreditsConfig::default()
    };
    let provider = MockProvider::with_responses(vec!["one".into(), "two".into()]);
    let f = fixture(provider, credits, fast_policy(0)).await;

    f.runtime
        .call_llm("alice", &Prompt::user("q"), Charge::Text, "m", None, &[])
        .await
        .unwrap();
    let err = f
        .runtime
        .call_llm("alice", &Prompt::user("q"), Charge::Text, "m", None, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, VoleraError::DailyLimitExceeded { limit: 1, .. }));
    assert_eq!(f.provider.call_count(), 1);
}

#[derive(Debug, Deserialize, JsonSchema, PartialEq)]
struct Verdict {
    status: String,
    ids: Vec<String>,
}

#[tokio::test]
async fn structured_output_is_validated_and_decoded() {
    let provider = MockProvider::new();
    provider.push_for(
        "verdict",
        MockReply::Text("```json\n{\"status\": \"ok\", \"ids\": [\"a\"]}\n```".into()),
    );
    let f = fixture(provider, funded(10), fast_policy(0)).await;

    let out = f
        .runtime
        .call_structured::<Verdict>("alice", "verdict", &Prompt::user("judge"), Charge::Text, "m", None, &[])
        .await
        .unwrap();

    assert_eq!(
        out.value,
        Some(Verdict {
            status: "ok".into(),
            ids: vec!["a".into()],
        })
    );
    let request = &f.provider.requests()[0];
    let format = request.response_format.as_ref().unwrap();
    assert_eq!(format.name, "verdict");
    assert!(format.schema["properties"]["ids"].is_object());
}

#[tokio::test]
async fn schema_violation_is_retried_once() {
    let provider = MockProvider::new();
    provider.push_for("verdict", MockReply::json(serde_json::json!({"status": 3})));
    provider.push_for("verdict", MockReply::json(serde_json::json!({"status": "ok", "ids": []})));
    let f = fixture(provider, funded(10), fast_policy(0)).await;

    let out = f
        .runtime
        .call_structured::<Verdict>("alice", "verdict", &Prompt::user("judge"), Charge::Text, "m", None, &[])
        .await
        .unwrap();

    assert_eq!(out.value.unwrap().status, "ok");
    assert_eq!(f.provider.call_count(), 2);
}

#[tokio::test]
async fn persistent_violation_yields_no_value() {
    let provider = MockProvider::new();
    provider.always_for("verdict", MockReply::Text("I cannot answer in JSON".into()));
    let f = fixture(provider, funded(10), fast_policy(0)).await;

    let out = f
        .runtime
        .call_structured::<Verdict>("alice", "verdict", &Prompt::user("judge"), Charge::Text, "m", None, &[])
        .await
        .unwrap();

    assert!(out.value.is_none());
    assert_eq!(out.response.text, "I cannot answer in JSON");
    assert_eq!(f.provider.call_count(), 2);
}
