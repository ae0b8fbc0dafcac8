//! End-to-end: a scenario executed through the bridge.
//!
//! The runner lives on the caller side of a channel transport; the
//! responder answers on the page side against an in-memory document.
//! This is the same wiring the extension uses, minus the browser.

use cake_bridge::{BridgeDriver, ChannelTransport, PageResponder};
use cake_core::{
    MemoryPage, MemoryScenarioStore, NewScenario, ScenarioPatch, ScenarioStore, TestRunner,
};
use cake_proto::{
    AssertionKind, AssertionSpec, RunStatus, ScenarioStatus, SpecValue, StepAction, StepStatus,
    TargetLocator, TestStep, now_ms,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn login_page() -> MemoryPage {
    MemoryPage::from_value(json!({
        "tag": "body",
        "children": [
            {
                "tag": "button", "id": "login-btn", "text": "Log in",
                "onClick": [
                    {"action": "set_text", "selector": "#status", "text": "Welcome"}
                ]
            },
            {"tag": "input", "id": "email"},
            {"tag": "div", "id": "status", "text": "Signed out"}
        ]
    }))
    .unwrap()
}

fn step(id: &str, action: StepAction) -> TestStep {
    TestStep {
        id: id.to_string(),
        timestamp_ms: now_ms(),
        action,
    }
}

async fn seed_login_scenario(store: &MemoryScenarioStore, expected_status: &str) -> String {
    let scenario = store
        .add_scenario(NewScenario {
            name: "login via bridge".into(),
            ..NewScenario::default()
        })
        .await
        .unwrap();
    let steps = vec![
        step(
            "s1",
            StepAction::Click {
                target: TargetLocator::css("#login-btn"),
            },
        ),
        step(
            "s2",
            StepAction::Input {
                target: TargetLocator::css("#email"),
                value: "user@example.com".into(),
            },
        ),
        step(
            "s3",
            StepAction::Assert {
                target: TargetLocator::css("#status"),
                assertion: AssertionSpec::new(AssertionKind::TextEquals, expected_status)
                    .with_timeout(Duration::from_millis(200))
                    .with_retry_interval(Duration::from_millis(40)),
            },
        ),
    ];
    store
        .update_scenario(
            &scenario.id,
            ScenarioPatch {
                steps: Some(steps),
                ..ScenarioPatch::default()
            },
        )
        .await
        .unwrap();
    scenario.id
}

/// Spawns a page-side responder and returns the caller-side driver.
fn bridge_over(page: MemoryPage) -> BridgeDriver {
    let (transport, receiver) = ChannelTransport::pair();
    let responder = PageResponder::new(Arc::new(page));
    tokio::spawn(async move { responder.serve(receiver).await });
    BridgeDriver::new(Arc::new(transport))
}

#[tokio::test]
async fn scenario_passes_across_the_bridge() {
    let page = login_page();
    let driver = bridge_over(page.clone());
    assert!(driver.ping().await);

    let store = Arc::new(MemoryScenarioStore::new());
    let scenario_id = seed_login_scenario(&store, "Welcome").await;

    let runner = TestRunner::new(Arc::clone(&store) as Arc<dyn ScenarioStore>, Arc::new(driver));
    let run = runner.run_scenario(&scenario_id).await.unwrap();

    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.passed_steps, 3);
    assert_eq!(run.failed_steps, 0);

    // The click really happened on the page side.
    assert_eq!(page.click_count("#login-btn").unwrap(), 1);
    assert_eq!(
        page.dispatched_events("#email").unwrap(),
        vec!["input".to_string(), "change".to_string()]
    );

    let stored = store.get_scenario(&scenario_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScenarioStatus::Passed);
    assert_eq!(stored.run_count, 1);
}

#[tokio::test]
async fn failed_assertion_carries_page_side_actual() {
    let driver = bridge_over(login_page());
    let store = Arc::new(MemoryScenarioStore::new());
    // The page ends up saying "Welcome", not "Signed in".
    let scenario_id = seed_login_scenario(&store, "Signed in").await;

    let runner = TestRunner::new(Arc::clone(&store) as Arc<dyn ScenarioStore>, Arc::new(driver));
    let run = runner.run_scenario(&scenario_id).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    let third = &run.step_results[2];
    assert_eq!(third.status, StepStatus::Failed);
    let assertion = third.assertion.as_ref().unwrap();
    assert_eq!(assertion.actual, Some(SpecValue::Str("Welcome".into())));
    assert_eq!(assertion.expected, SpecValue::Str("Signed in".into()));
}

#[tokio::test]
async fn missing_click_target_fails_the_step_not_the_run_call() {
    let driver = bridge_over(login_page());
    let store = Arc::new(MemoryScenarioStore::new());
    let scenario = store
        .add_scenario(NewScenario {
            name: "broken click".into(),
            ..NewScenario::default()
        })
        .await
        .unwrap();
    store
        .update_scenario(
            &scenario.id,
            ScenarioPatch {
                steps: Some(vec![step(
                    "s1",
                    StepAction::Click {
                        target: TargetLocator::css("#missing"),
                    },
                )]),
                ..ScenarioPatch::default()
            },
        )
        .await
        .unwrap();

    let runner = TestRunner::new(Arc::clone(&store) as Arc<dyn ScenarioStore>, Arc::new(driver));
    let run = runner.run_scenario(&scenario.id).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(
        run.step_results[0]
            .error
            .as_ref()
            .unwrap()
            .contains("element not found")
    );
}

#[tokio::test]
async fn dead_page_context_fails_steps_instead_of_hanging() {
    let (transport, receiver) = ChannelTransport::pair();
    drop(receiver);
    let driver = BridgeDriver::new(Arc::new(transport));

    let store = Arc::new(MemoryScenarioStore::new());
    let scenario_id = seed_login_scenario(&store, "Welcome").await;

    let runner = TestRunner::new(Arc::clone(&store) as Arc<dyn ScenarioStore>, Arc::new(driver));
    let run = runner.run_scenario(&scenario_id).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failed_steps, 3);
    // The scenario is not stuck at Running.
    let stored = store.get_scenario(&scenario_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScenarioStatus::Failed);
}
