use std::sync::Arc;

use action_primitives::testing::RecordingSurface;
use action_primitives::Action;
use agent_core::{
    ActionLoopConfig, ActionLoopDriver, FailureReason, OracleInput, ScriptedOracle, TerminalResult,
};
use paperpilot_cli::{Credentials, JournalGuidelines, ResearchTask, TaskError, TaskRunner};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn credentials() -> Credentials {
    Credentials {
        library_username: "jdoe".into(),
        library_password: "library-secret".into(),
        google_username: "jdoe@example.com".into(),
        google_password: "google-secret".into(),
    }
}

fn runner(oracle: Arc<ScriptedOracle>) -> TaskRunner {
    TaskRunner::new(
        ActionLoopDriver::new(oracle, ActionLoopConfig::minimal()),
        credentials(),
    )
}

#[tokio::test]
async fn library_search_returns_the_loop_result_verbatim() {
    let oracle = Arc::new(ScriptedOracle::actions_then_message(
        vec![
            json!({"type": "click", "x": 200, "y": 140}),
            json!({"type": "type", "text": "soil carbon"}),
            json!({"type": "keypress", "keys": ["ENTER"]}),
        ],
        "1. Soil carbon dynamics (Lee, 2022)",
    ));
    let surface = Arc::new(RecordingSurface::new("library"));

    let result = runner(oracle.clone())
        .run(
            surface.clone(),
            &ResearchTask::LibrarySearch {
                query: "soil carbon".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        result.result,
        TerminalResult::completed("1. Soil carbon dynamics (Lee, 2022)")
    );
    assert_eq!(result.actions_dispatched, 3);
    assert_eq!(surface.dispatch_count(), 3);
    assert_eq!(surface.release_count(), 1);
    assert!(matches!(surface.dispatched()[1], Action::TypeText { .. }));

    let requests = oracle.requests().await;
    match &requests[0].input {
        OracleInput::Initial { goal, .. } => {
            assert!(goal.contains("query: soil carbon"));
            assert!(goal.contains("password 'library-secret'"));
        }
        other => panic!("first turn should be initial, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_sessions_are_not_dressed_up() {
    let oracle = Arc::new(ScriptedOracle::actions_then_message(
        vec![json!({"type": "click", "x": 10})],
        "unreachable",
    ));
    let surface = Arc::new(RecordingSurface::new("drive"));

    let result = runner(oracle)
        .run(surface.clone(), &ResearchTask::DriveLogin)
        .await
        .unwrap();

    assert!(!result.is_success());
    assert!(matches!(
        result.failure(),
        Some(FailureReason::InvalidAction(_))
    ));
    assert_eq!(surface.dispatch_count(), 0);
    assert_eq!(surface.release_count(), 1);
}

#[tokio::test]
async fn invalid_task_input_releases_the_surface_without_consulting() {
    let oracle = Arc::new(ScriptedOracle::new(Vec::new()));
    let surface = Arc::new(RecordingSurface::new("docs"));

    let err = runner(oracle.clone())
        .run(
            surface.clone(),
            &ResearchTask::FormatDocument {
                url: "  ".into(),
                guidelines: JournalGuidelines::default(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::MissingInput("document url")));
    assert_eq!(surface.release_count(), 1);
    assert_eq!(surface.frame_count(), 0);
    assert!(oracle.requests().await.is_empty());
}

#[tokio::test]
async fn cancelled_runner_ends_sessions_as_cancelled() {
    let oracle = Arc::new(ScriptedOracle::actions_then_message(Vec::new(), "never"));
    let token = CancellationToken::new();
    token.cancel();
    let surface = Arc::new(RecordingSurface::new("cancel"));

    let result = runner(oracle)
        .with_cancel(token)
        .run_goal(surface.clone(), "open the library")
        .await
        .unwrap();

    assert_eq!(result.failure(), Some(&FailureReason::Cancelled));
    assert_eq!(surface.release_count(), 1);
}
