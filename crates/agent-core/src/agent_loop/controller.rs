//! Action-loop driver: capture, consult, execute, repeat.
//!
//! ```text
//! INIT -> AWAITING_ORACLE -> EXECUTING_ACTION -> AWAITING_ORACLE -> ... -> DONE | ERROR
//! ```
//!
//! Each turn captures a frame, hands it to the oracle and either stops on a
//! terminal message or executes exactly one action. The surface is released
//! exactly once on every exit path.

use std::sync::Arc;
use std::time::Duration;

use action_primitives::{
    Action, ActionExecutor, ExecutionError, RawAction, Surface, SurfaceError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{ActionLoopConfig, SafetyCheckPolicy};
use super::session::Session;
use super::types::{ActionLoopResult, FailureReason, TerminalResult, TurnRecord};
use crate::errors::AgentError;
use crate::oracle::{
    OracleInput, OracleRequest, OracleResponse, PlanningOracle, ResponseItem, SafetyCheck,
    SurfaceCapabilities,
};

/// What a single oracle response asks the driver to do.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnDecision {
    Act {
        call_id: String,
        action: RawAction,
        safety_checks: Vec<SafetyCheck>,
    },
    Terminal(String),
    Empty,
}

impl TurnDecision {
    /// Reduce a response to one decision.
    ///
    /// The first action wins; extra actions are dropped with a warning and a
    /// message next to an action is only logged. Without actions, every
    /// message text is joined into the terminal answer.
    pub fn from_response(response: OracleResponse) -> Self {
        let mut first_call = None;
        let mut extra_calls = 0usize;
        let mut messages = Vec::new();

        for item in response.items {
            match item {
                ResponseItem::ActionCall {
                    call_id,
                    action,
                    safety_checks,
                } => {
                    if first_call.is_none() {
                        first_call = Some((call_id, action, safety_checks));
                    } else {
                        extra_calls += 1;
                    }
                }
                ResponseItem::Message { text } => messages.push(text),
            }
        }

        match first_call {
            Some((call_id, action, safety_checks)) => {
                if extra_calls > 0 {
                    warn!(
                        ignored = extra_calls,
                        "oracle proposed several actions; executing the first"
                    );
                }
                if !messages.is_empty() {
                    debug!(text = %messages.join("\n"), "oracle message alongside an action");
                }
                TurnDecision::Act {
                    call_id,
                    action,
                    safety_checks,
                }
            }
            None if !messages.is_empty() => TurnDecision::Terminal(messages.join("\n")),
            None => TurnDecision::Empty,
        }
    }
}

/// Action already executed whose follow-up frame the oracle has not seen yet.
struct PendingCall {
    call_id: String,
    acknowledged: Vec<SafetyCheck>,
}

/// Drives sessions against surfaces with one oracle and one configuration.
///
/// The driver is shareable; every `run` owns its own [`Session`].
pub struct ActionLoopDriver {
    oracle: Arc<dyn PlanningOracle>,
    config: ActionLoopConfig,
    executor: ActionExecutor,
}

impl ActionLoopDriver {
    pub fn new(oracle: Arc<dyn PlanningOracle>, config: ActionLoopConfig) -> Self {
        let executor = ActionExecutor::with_timeouts(
            Duration::from_millis(config.wait_interval_ms),
            Duration::from_millis(config.quiescence_timeout_ms),
        );
        Self {
            oracle,
            config,
            executor,
        }
    }

    pub fn config(&self) -> &ActionLoopConfig {
        &self.config
    }

    /// Run `goal` against `surface` until a terminal result.
    pub async fn run<S: Surface>(
        &self,
        surface: S,
        goal: &str,
    ) -> Result<ActionLoopResult, AgentError> {
        self.run_with_cancel(surface, goal, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), checking `cancel` between turns and while
    /// waiting on the oracle.
    ///
    /// An `Err` means the session never started; the surface is still released.
    pub async fn run_with_cancel<S: Surface>(
        &self,
        surface: S,
        goal: &str,
        cancel: CancellationToken,
    ) -> Result<ActionLoopResult, AgentError> {
        let goal = goal.trim();
        let refusal = if goal.is_empty() {
            Some(AgentError::invalid_request("goal cannot be empty"))
        } else {
            self.config.validate().err()
        };
        if let Some(err) = refusal {
            release(&surface).await;
            return Err(err);
        }

        let mut session = Session::new();
        info!(
            session_id = %session.id(),
            oracle = self.oracle.name(),
            max_turns = self.config.max_turns,
            viewport = %surface.viewport(),
            "action loop started"
        );

        let outcome = self.drive(&surface, &mut session, goal, &cancel).await;
        session.finish(outcome.is_completed());
        release(&surface).await;

        match &outcome {
            TerminalResult::Completed { message } => info!(
                session_id = %session.id(),
                turns = session.turns(),
                actions = session.actions_dispatched(),
                message = %message,
                "action loop completed"
            ),
            TerminalResult::Failed { reason } => warn!(
                session_id = %session.id(),
                turns = session.turns(),
                actions = session.actions_dispatched(),
                reason = reason.kind(),
                detail = %reason,
                "action loop failed"
            ),
        }

        Ok(ActionLoopResult {
            session_id: session.id().clone(),
            result: outcome,
            turns: session.turns(),
            actions_dispatched: session.actions_dispatched(),
            elapsed_ms: session.elapsed_ms(),
            final_url: session.last_url().map(str::to_string),
            history: session.take_history(),
        })
    }

    async fn drive(
        &self,
        surface: &dyn Surface,
        session: &mut Session,
        goal: &str,
        cancel: &CancellationToken,
    ) -> TerminalResult {
        let capabilities = SurfaceCapabilities {
            viewport: surface.viewport(),
            environment: surface.environment(),
        };
        let mut pending: Option<PendingCall> = None;

        loop {
            if cancel.is_cancelled() {
                return TerminalResult::failed(FailureReason::Cancelled);
            }
            if session.turns() >= self.config.max_turns {
                return TerminalResult::failed(FailureReason::TurnBudgetExceeded {
                    max_turns: self.config.max_turns,
                });
            }

            let frame = match surface.capture_frame().await {
                Ok(frame) => frame,
                Err(err) => return surface_failure(err),
            };
            session.observe_url(frame.url.clone());

            let input = match (session.conversation().cloned(), pending.take()) {
                (Some(conversation), Some(call)) => OracleInput::FollowUp {
                    conversation,
                    call_id: call.call_id,
                    frame,
                    acknowledged_safety_checks: call.acknowledged,
                },
                _ => OracleInput::Initial {
                    goal: goal.to_string(),
                    frame,
                },
            };

            let turn = session.begin_turn();
            debug!(session_id = %session.id(), turn, "consulting oracle");
            let request = OracleRequest {
                capabilities,
                input,
            };

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return TerminalResult::failed(FailureReason::Cancelled);
                }
                response = tokio::time::timeout(
                    self.config.oracle_timeout_duration(),
                    self.oracle.consult(request),
                ) => response,
            };
            let response = match response {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => {
                    return TerminalResult::failed(FailureReason::OracleUnavailable(
                        err.to_string(),
                    ))
                }
                Err(_) => {
                    return TerminalResult::failed(FailureReason::OracleUnavailable(format!(
                        "no answer within {} ms",
                        self.config.oracle_timeout_ms
                    )))
                }
            };
            session.advance(response.conversation.clone());

            let (call_id, raw, safety_checks) = match TurnDecision::from_response(response) {
                TurnDecision::Terminal(message) => {
                    session.record(TurnRecord {
                        turn,
                        kind: None,
                        summary: message.clone(),
                        quiescent: None,
                        terminal: true,
                        url: session.last_url().map(str::to_string),
                    });
                    return TerminalResult::completed(message);
                }
                TurnDecision::Empty => {
                    return TerminalResult::failed(FailureReason::InvalidResponse(
                        "response carried neither an action nor a message".to_string(),
                    ))
                }
                TurnDecision::Act {
                    call_id,
                    action,
                    safety_checks,
                } => (call_id, action, safety_checks),
            };

            if !safety_checks.is_empty() {
                let codes = describe_checks(&safety_checks);
                match self.config.safety_checks {
                    SafetyCheckPolicy::Refuse => {
                        return TerminalResult::failed(FailureReason::SafetyCheckRefused(codes))
                    }
                    SafetyCheckPolicy::Acknowledge => {
                        warn!(session_id = %session.id(), checks = %codes, "acknowledging safety checks")
                    }
                }
            }

            let action = match raw.parse() {
                Ok(action) => action,
                Err(err) => {
                    warn!(
                        session_id = %session.id(),
                        turn,
                        kind = raw.kind_hint().unwrap_or("<none>"),
                        error = %err,
                        "rejecting action"
                    );
                    return TerminalResult::failed(FailureReason::InvalidAction(err.to_string()));
                }
            };

            match self.execute(surface, session, turn, &action).await {
                Ok(()) => {}
                Err(outcome) => return outcome,
            }

            pending = Some(PendingCall {
                call_id,
                acknowledged: safety_checks,
            });
        }
    }

    async fn execute(
        &self,
        surface: &dyn Surface,
        session: &mut Session,
        turn: u32,
        action: &Action,
    ) -> Result<(), TerminalResult> {
        match self.executor.execute(surface, action).await {
            Ok(report) => {
                if report.dispatched {
                    session.count_dispatch();
                }
                session.record(TurnRecord {
                    turn,
                    kind: Some(report.kind),
                    summary: action.summary(),
                    quiescent: Some(report.quiescent),
                    terminal: false,
                    url: session.last_url().map(str::to_string),
                });
                Ok(())
            }
            Err(ExecutionError::Invalid(err)) => Err(TerminalResult::failed(
                FailureReason::InvalidAction(err.to_string()),
            )),
            Err(ExecutionError::Surface(err)) => Err(surface_failure(err)),
        }
    }
}

fn surface_failure(err: SurfaceError) -> TerminalResult {
    TerminalResult::failed(FailureReason::SurfaceError(err.to_string()))
}

fn describe_checks(checks: &[SafetyCheck]) -> String {
    checks
        .iter()
        .map(|check| check.code.as_deref().unwrap_or(&check.id))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn release<S: Surface>(surface: &S) {
    if let Err(err) = surface.release().await {
        warn!(error = %err, "surface release failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleError, ScriptedOracle};
    use action_primitives::testing::{RecordingSurface, SharedJournal, SurfaceCall};
    use serde_json::json;

    fn driver(oracle: Arc<ScriptedOracle>) -> ActionLoopDriver {
        ActionLoopDriver::new(oracle, ActionLoopConfig::minimal())
    }

    fn click(x: i32, y: i32) -> serde_json::Value {
        json!({"type": "click", "x": x, "y": y})
    }

    #[tokio::test]
    async fn terminal_first_turn_dispatches_nothing() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(vec![], "nothing to do"));
        let surface = Arc::new(RecordingSurface::new("page"));

        let result = driver(oracle.clone())
            .run(surface.clone(), "say hi")
            .await
            .unwrap();

        assert_eq!(result.result, TerminalResult::completed("nothing to do"));
        assert_eq!(surface.dispatch_count(), 0);
        assert_eq!(surface.frame_count(), 1);
        assert_eq!(surface.release_count(), 1);
        assert_eq!(result.turns, 1);

        let requests = oracle.requests().await;
        assert!(matches!(
            &requests[0].input,
            OracleInput::Initial { goal, .. } if goal == "say hi"
        ));
    }

    #[tokio::test]
    async fn click_then_terminal_dispatches_once_with_two_frames() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(
            vec![click(100, 200)],
            "clicked",
        ));
        let surface = Arc::new(RecordingSurface::new("page"));

        let result = driver(oracle.clone())
            .run(surface.clone(), "click the button")
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(surface.dispatched(), vec![Action::click(100, 200)]);
        assert_eq!(surface.frame_count(), 2);
        assert_eq!(result.actions_dispatched, 1);
        assert_eq!(result.history[0].url.as_deref(), Some("about:blank#page"));

        let requests = oracle.requests().await;
        match &requests[1].input {
            OracleInput::FollowUp {
                conversation,
                call_id,
                ..
            } => {
                assert_eq!(conversation.as_str(), "resp_0");
                assert_eq!(call_id, "call_0");
            }
            other => panic!("expected follow-up, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_coordinate_fails_without_dispatch() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(
            vec![json!({"type": "click", "x": 5})],
            "unreachable",
        ));
        let surface = Arc::new(RecordingSurface::new("page"));

        let result = driver(oracle).run(surface.clone(), "click").await.unwrap();

        assert!(matches!(
            result.failure(),
            Some(FailureReason::InvalidAction(detail)) if detail.contains('y')
        ));
        assert_eq!(surface.dispatch_count(), 0);
        assert_eq!(surface.release_count(), 1);
    }

    #[tokio::test]
    async fn unknown_action_kind_fails_closed() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(
            vec![json!({"type": "teleport", "x": 1, "y": 1})],
            "unreachable",
        ));
        let surface = Arc::new(RecordingSurface::new("page"));

        let result = driver(oracle).run(surface.clone(), "go").await.unwrap();
        assert!(matches!(
            result.failure(),
            Some(FailureReason::InvalidAction(_))
        ));
        assert_eq!(surface.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn quiescence_timeout_is_not_fatal() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(
            vec![click(1, 1), json!({"type": "type", "text": "llm agents"})],
            "typed",
        ));
        let surface = Arc::new(RecordingSurface::new("busy").with_quiescent(false));

        let result = driver(oracle).run(surface.clone(), "search").await.unwrap();

        assert!(result.is_success());
        assert_eq!(surface.dispatch_count(), 2);
        assert!(result
            .history
            .iter()
            .filter(|record| !record.terminal)
            .all(|record| record.quiescent == Some(false)));
    }

    #[tokio::test]
    async fn dispatch_failure_releases_exactly_once() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(
            vec![click(1, 1), click(2, 2)],
            "unreachable",
        ));
        let surface = Arc::new(RecordingSurface::new("flaky").failing_dispatch_after(1));

        let result = driver(oracle).run(surface.clone(), "click twice").await.unwrap();

        assert!(matches!(
            result.failure(),
            Some(FailureReason::SurfaceError(_))
        ));
        assert_eq!(surface.release_count(), 1);
        assert_eq!(surface.calls().last(), Some(&SurfaceCall::Release));
    }

    #[tokio::test]
    async fn capture_failure_is_a_surface_error() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(vec![click(1, 1)], "x"));
        let surface = Arc::new(RecordingSurface::new("closing").failing_capture_after(1));

        let result = driver(oracle).run(surface.clone(), "click").await.unwrap();
        assert!(matches!(
            result.failure(),
            Some(FailureReason::SurfaceError(detail)) if detail.contains("closed")
        ));
        assert_eq!(surface.release_count(), 1);
    }

    #[tokio::test]
    async fn oracle_error_is_oracle_unavailable() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Err(OracleError::Status {
            status: 503,
            body: "overloaded".into(),
        })]));
        let surface = Arc::new(RecordingSurface::new("page"));

        let result = driver(oracle.clone()).run(surface.clone(), "go").await.unwrap();
        assert!(matches!(
            result.failure(),
            Some(FailureReason::OracleUnavailable(_))
        ));
        // no silent retry
        assert_eq!(oracle.requests().await.len(), 1);
        assert_eq!(surface.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_oracle_times_out() {
        let oracle = Arc::new(
            ScriptedOracle::actions_then_message(vec![], "late").with_latency(Duration::from_secs(5)),
        );
        let surface = Arc::new(RecordingSurface::new("page"));
        let driver = ActionLoopDriver::new(oracle, ActionLoopConfig::minimal().oracle_timeout(100));

        let result = driver.run(surface.clone(), "go").await.unwrap();
        assert!(matches!(
            result.failure(),
            Some(FailureReason::OracleUnavailable(detail)) if detail.contains("100 ms")
        ));
    }

    #[tokio::test]
    async fn empty_response_is_invalid() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(OracleResponse::new(
            "resp_0",
            vec![],
        ))]));
        let surface = Arc::new(RecordingSurface::new("page"));

        let result = driver(oracle).run(surface.clone(), "go").await.unwrap();
        assert!(matches!(
            result.failure(),
            Some(FailureReason::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn turn_budget_bounds_the_loop() {
        let actions = (0..20).map(|i| click(i, i)).collect();
        let oracle = Arc::new(ScriptedOracle::actions_then_message(actions, "never"));
        let surface = Arc::new(RecordingSurface::new("page"));
        let driver = ActionLoopDriver::new(oracle.clone(), ActionLoopConfig::minimal().max_turns(3));

        let result = driver.run(surface.clone(), "loop").await.unwrap();

        assert_eq!(
            result.failure(),
            Some(&FailureReason::TurnBudgetExceeded { max_turns: 3 })
        );
        assert_eq!(oracle.requests().await.len(), 3);
        assert_eq!(surface.dispatch_count(), 3);
        assert_eq!(surface.release_count(), 1);
    }

    #[tokio::test]
    async fn several_actions_take_the_first() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(OracleResponse::new(
                "resp_0",
                vec![
                    ResponseItem::action("call_a", click(1, 1)),
                    ResponseItem::action("call_b", click(9, 9)),
                ],
            )),
            Ok(OracleResponse::new("resp_1", vec![ResponseItem::message("ok")])),
        ]));
        let surface = Arc::new(RecordingSurface::new("page"));

        let result = driver(oracle.clone()).run(surface.clone(), "go").await.unwrap();
        assert!(result.is_success());
        assert_eq!(surface.dispatched(), vec![Action::click(1, 1)]);

        let requests = oracle.requests().await;
        assert!(matches!(
            &requests[1].input,
            OracleInput::FollowUp { call_id, .. } if call_id == "call_a"
        ));
    }

    #[test]
    fn messages_without_actions_are_joined() {
        let decision = TurnDecision::from_response(OracleResponse::new(
            "r",
            vec![ResponseItem::message("Found 3 papers."), ResponseItem::message("Done.")],
        ));
        assert_eq!(
            decision,
            TurnDecision::Terminal("Found 3 papers.\nDone.".to_string())
        );
    }

    #[test]
    fn action_beats_message() {
        let decision = TurnDecision::from_response(OracleResponse::new(
            "r",
            vec![
                ResponseItem::message("clicking search"),
                ResponseItem::action("c1", click(3, 4)),
            ],
        ));
        assert!(matches!(decision, TurnDecision::Act { call_id, .. } if call_id == "c1"));
    }

    fn call_with_checks(call_id: &str) -> ResponseItem {
        ResponseItem::ActionCall {
            call_id: call_id.to_string(),
            action: RawAction::new(click(5, 5)),
            safety_checks: vec![SafetyCheck {
                id: "sc_1".into(),
                code: Some("malicious_instructions".into()),
                message: None,
            }],
        }
    }

    #[tokio::test]
    async fn safety_checks_are_acknowledged_on_the_next_turn() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(OracleResponse::new("resp_0", vec![call_with_checks("call_0")])),
            Ok(OracleResponse::new("resp_1", vec![ResponseItem::message("ok")])),
        ]));
        let surface = Arc::new(RecordingSurface::new("page"));

        let result = driver(oracle.clone()).run(surface.clone(), "go").await.unwrap();
        assert!(result.is_success());

        let requests = oracle.requests().await;
        match &requests[1].input {
            OracleInput::FollowUp {
                acknowledged_safety_checks,
                ..
            } => assert_eq!(acknowledged_safety_checks[0].id, "sc_1"),
            other => panic!("expected follow-up, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refuse_policy_stops_before_dispatch() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(OracleResponse::new(
            "resp_0",
            vec![call_with_checks("call_0")],
        ))]));
        let surface = Arc::new(RecordingSurface::new("page"));
        let driver = ActionLoopDriver::new(
            oracle,
            ActionLoopConfig::minimal().safety_checks(SafetyCheckPolicy::Refuse),
        );

        let result = driver.run(surface.clone(), "go").await.unwrap();
        assert!(matches!(
            result.failure(),
            Some(FailureReason::SafetyCheckRefused(codes)) if codes == "malicious_instructions"
        ));
        assert_eq!(surface.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(vec![], "x"));
        let surface = Arc::new(RecordingSurface::new("page"));
        let token = CancellationToken::new();
        token.cancel();

        let result = driver(oracle.clone())
            .run_with_cancel(surface.clone(), "go", token)
            .await
            .unwrap();
        assert_eq!(result.failure(), Some(&FailureReason::Cancelled));
        assert!(oracle.requests().await.is_empty());
        assert_eq!(surface.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_while_waiting_on_the_oracle() {
        let oracle = Arc::new(
            ScriptedOracle::actions_then_message(vec![], "late").with_latency(Duration::from_secs(30)),
        );
        let surface = Arc::new(RecordingSurface::new("page"));
        let driver = ActionLoopDriver::new(oracle, ActionLoopConfig::default());
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let result = driver
            .run_with_cancel(surface.clone(), "go", token)
            .await
            .unwrap();
        canceller.await.unwrap();
        assert_eq!(result.failure(), Some(&FailureReason::Cancelled));
        assert_eq!(surface.release_count(), 1);
    }

    #[tokio::test]
    async fn empty_goal_is_rejected_and_surface_released() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(vec![], "x"));
        let surface = Arc::new(RecordingSurface::new("page"));

        let err = driver(oracle.clone())
            .run(surface.clone(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
        assert!(oracle.requests().await.is_empty());
        assert_eq!(surface.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_action_does_not_touch_the_surface() {
        let oracle = Arc::new(ScriptedOracle::actions_then_message(
            vec![json!({"type": "wait"}), json!({"type": "screenshot"})],
            "waited",
        ));
        let surface = Arc::new(RecordingSurface::new("page"));
        let driver = ActionLoopDriver::new(oracle, ActionLoopConfig::default());

        let result = driver.run(surface.clone(), "wait").await.unwrap();
        assert!(result.is_success());
        assert_eq!(surface.dispatch_count(), 0);
        assert_eq!(surface.quiescence_checks(), 2);
        assert_eq!(result.actions_dispatched, 0);
        assert_eq!(surface.frame_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_sessions_do_not_interleave() {
        let journal: SharedJournal = Default::default();
        let script_a: Vec<_> = (0..4).map(|i| click(i, 0)).collect();
        let script_b: Vec<_> = (0..4).map(|i| click(0, 100 + i)).collect();

        let driver_a = driver(Arc::new(ScriptedOracle::actions_then_message(
            script_a, "a done",
        )));
        let driver_b = driver(Arc::new(ScriptedOracle::actions_then_message(
            script_b, "b done",
        )));
        let surface_a = Arc::new(
            RecordingSurface::new("a")
                .with_journal(journal.clone())
                .with_dispatch_delay(Duration::from_millis(5)),
        );
        let surface_b = Arc::new(
            RecordingSurface::new("b")
                .with_journal(journal.clone())
                .with_dispatch_delay(Duration::from_millis(5)),
        );

        let (a, b) = tokio::join!(
            driver_a.run(surface_a.clone(), "session a"),
            driver_b.run(surface_b.clone(), "session b"),
        );

        assert_eq!(a.unwrap().message(), Some("a done"));
        assert_eq!(b.unwrap().message(), Some("b done"));
        assert_eq!(surface_a.max_in_flight(), 1);
        assert_eq!(surface_b.max_in_flight(), 1);

        let entries = journal.lock().clone();
        let for_a: Vec<_> = entries
            .iter()
            .filter(|(name, _)| name == "a")
            .map(|(_, action)| action.clone())
            .collect();
        assert_eq!(for_a, (0..4).map(|i| Action::click(i, 0)).collect::<Vec<_>>());
        assert!(entries
            .iter()
            .filter(|(name, _)| name == "b")
            .all(|(_, action)| matches!(action, Action::Click { x: 0, .. })));
    }
}
