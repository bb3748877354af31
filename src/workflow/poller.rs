use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::cancel::CancellationSignal;
use crate::engine::types::WorkflowResponse;
use crate::engine::Engine;
use crate::error::Result;
use crate::workflow::controller::{OperationOutcome, ResolutionController};

/// Recurring timer owned by the poll loop. Started at most once, stopped at
/// most once.
#[async_trait]
pub trait Scheduler: Send {
    fn start(&mut self, period: Duration);

    /// Resolves on the next tick. Pending forever while not running.
    async fn tick(&mut self);

    fn stop(&mut self);
}

/// `tokio::time::Interval` backed scheduler. The first tick fires one full
/// period after `start`.
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    interval: Option<Interval>,
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    fn start(&mut self, period: Duration) {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn stop(&mut self) {
        self.interval = None;
    }
}

type AbortTask = JoinHandle<Result<WorkflowResponse>>;

/// Drives one submitted workflow to settlement: timer ticks query the engine,
/// a cancellation fires an abort, and every result is folded back through the
/// controller.
pub struct PollLoop<S> {
    engine: Arc<dyn Engine>,
    controller: ResolutionController<S>,
    period: Duration,
}

impl<S: Scheduler> PollLoop<S> {
    pub fn new(engine: Arc<dyn Engine>, controller: ResolutionController<S>, period: Duration) -> Self {
        Self {
            engine,
            controller,
            period,
        }
    }

    pub async fn run(
        self,
        initial_status: &str,
        cancel: CancellationSignal,
    ) -> Result<OperationOutcome> {
        self.run_with_controller(initial_status, cancel)
            .await
            .into_outcome()
    }

    /// Same as `run`, but hands back the settled controller for inspection.
    pub async fn run_with_controller(
        mut self,
        initial_status: &str,
        mut cancel: CancellationSignal,
    ) -> ResolutionController<S> {
        let id = self.controller.handle().id().to_string();

        // An already-final first status resolves without ever starting the timer.
        self.controller.process_status(initial_status);
        self.controller.start_timer(self.period);

        let mut abort_task: Option<AbortTask> = None;

        while !self.controller.is_settled() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!(id = %id, "Cancellation requested, aborting workflow");
                    let engine = Arc::clone(&self.engine);
                    let abort_id = id.clone();
                    abort_task = Some(tokio::spawn(async move { engine.abort(&abort_id).await }));
                }
                joined = join_abort(&mut abort_task) => {
                    abort_task = None;
                    self.controller.on_abort_result(joined);
                }
                _ = self.controller.next_tick() => {
                    let result = self.engine.query_status(&id).await;
                    self.controller.on_query_result(result);
                }
            }
        }

        // An abort still in flight completes server-side; its reply is dropped.
        if abort_task.is_some() {
            tracing::debug!(id = %id, "Detaching in-flight abort request");
        }

        if self.controller.settled_as_failure() {
            let metadata = self.engine.metadata(&id).await;
            self.controller.report_failure_details(metadata);
        }

        self.controller
    }
}

async fn join_abort(task: &mut Option<AbortTask>) -> Result<WorkflowResponse> {
    match task.as_mut() {
        Some(handle) => handle.await?,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancellation;
    use crate::engine::types::WorkflowHandle;
    use crate::error::AppError;
    use crate::notify::Level;
    use crate::testing::{CountingScheduler, RecordingSink, ScriptedEngine};

    const PERIOD: Duration = Duration::from_millis(100);

    fn poll_loop(
        engine: &Arc<ScriptedEngine>,
        sink: &Arc<RecordingSink>,
        max_query_failures: Option<u32>,
    ) -> PollLoop<CountingScheduler> {
        let controller = ResolutionController::new(
            WorkflowHandle::new("wf-1", "hello.wdl"),
            sink.clone(),
            CountingScheduler::default(),
            max_query_failures,
        );
        PollLoop::new(engine.clone(), controller, PERIOD)
    }

    #[tokio::test(start_paused = true)]
    async fn test_submitted_running_succeeded() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok("Running"), Ok("Succeeded")]));
        let sink = Arc::new(RecordingSink::default());

        let started = Instant::now();
        let controller = poll_loop(&engine, &sink, None)
            .run_with_controller("Submitted", CancellationSignal::never())
            .await;

        assert_eq!(controller.scheduler().starts(), 1);
        assert_eq!(controller.scheduler().stops(), 1);
        assert_eq!(
            controller.into_outcome().unwrap(),
            OperationOutcome {
                id: "wf-1".to_string(),
                status: "Succeeded".to_string(),
            }
        );
        assert_eq!(engine.queries(), 2);
        assert_eq!(started.elapsed(), PERIOD * 2);
        assert_eq!(
            sink.levels(),
            vec![Level::Progress, Level::Progress, Level::Info]
        );

        // No further ticks after settlement.
        tokio::time::sleep(PERIOD * 5).await;
        assert_eq!(engine.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_terminal_status_never_starts_timer() {
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        let sink = Arc::new(RecordingSink::default());

        let controller = poll_loop(&engine, &sink, None)
            .run_with_controller("Succeeded", CancellationSignal::never())
            .await;

        assert_eq!(controller.scheduler().starts(), 0);
        assert_eq!(engine.queries(), 0);
        assert_eq!(sink.levels(), vec![Level::Info]);
        assert_eq!(controller.into_outcome().unwrap().status, "Succeeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_running_notified_once() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok("Running"),
            Ok("Running"),
            Ok("Running"),
            Ok("Succeeded"),
        ]));
        let sink = Arc::new(RecordingSink::default());

        let outcome = poll_loop(&engine, &sink, None)
            .run("Submitted", CancellationSignal::never())
            .await
            .unwrap();

        assert_eq!(outcome.status, "Succeeded");
        let running = sink
            .messages()
            .iter()
            .filter(|m| m.starts_with("Running"))
            .count();
        assert_eq!(running, 1);
        assert_eq!(engine.queries(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_failure_does_not_stop_polling() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Err("connection reset"),
            Ok("Running"),
            Err("gateway timeout"),
            Ok("Failed"),
        ]));
        let sink = Arc::new(RecordingSink::default());

        let outcome = poll_loop(&engine, &sink, None)
            .run("Submitted", CancellationSignal::never())
            .await
            .unwrap();

        assert_eq!(outcome.status, "Failed");
        assert_eq!(
            sink.levels(),
            vec![
                Level::Progress,
                Level::Error,
                Level::Progress,
                Level::Error,
                Level::Error
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_workflow_reports_failure_details() {
        let engine = Arc::new(
            ScriptedEngine::new(vec![Ok("Running"), Ok("Failed")])
                .with_failures(Ok(vec!["Task hello.say exited with code 1"])),
        );
        let sink = Arc::new(RecordingSink::default());

        let outcome = poll_loop(&engine, &sink, None)
            .run("Submitted", CancellationSignal::never())
            .await
            .unwrap();

        assert_eq!(outcome.status, "Failed");
        assert_eq!(
            sink.levels(),
            vec![Level::Progress, Level::Progress, Level::Error, Level::Error]
        );
        assert!(sink.messages()[3].ends_with("Task hello.say exited with code 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_details_error_is_not_fatal() {
        let engine = Arc::new(
            ScriptedEngine::new(vec![Ok("Failed")]).with_failures(Err("metadata unavailable")),
        );
        let sink = Arc::new(RecordingSink::default());

        let outcome = poll_loop(&engine, &sink, None)
            .run("Submitted", CancellationSignal::never())
            .await
            .unwrap();

        assert_eq!(outcome.status, "Failed");
        assert!(sink.messages()[2].contains("metadata unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_failure_cap() {
        let engine = Arc::new(ScriptedEngine::new(vec![Err("down"), Err("down"), Err("down")]));
        let sink = Arc::new(RecordingSink::default());

        let err = poll_loop(&engine, &sink, Some(3))
            .run("Submitted", CancellationSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::QueryRetriesExhausted { attempts: 3, .. }));
        assert_eq!(engine.queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_then_polls_to_aborted() {
        let engine = Arc::new(
            ScriptedEngine::new(vec![Ok("Running"), Ok("Aborting"), Ok("Aborted")])
                .with_abort_reply(Ok("Aborting")),
        );
        let sink = Arc::new(RecordingSink::default());
        let (source, signal) = cancellation();
        engine.cancel_after_query(1, source);

        let controller = poll_loop(&engine, &sink, None)
            .run_with_controller("Submitted", signal)
            .await;

        assert_eq!(engine.aborts(), 1);
        assert_eq!(engine.queries(), 3);
        assert_eq!(controller.scheduler().stops(), 1);
        // Submitted, Running, Aborting (once, despite abort reply + query), Aborted
        assert_eq!(
            sink.levels(),
            vec![
                Level::Progress,
                Level::Progress,
                Level::Warning,
                Level::Warning
            ]
        );
        assert_eq!(controller.into_outcome().unwrap().status, "Aborted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_reply_can_settle_directly() {
        let engine = Arc::new(
            ScriptedEngine::new(vec![Ok("Running"), Ok("Running")]).with_abort_reply(Ok("Aborted")),
        );
        let sink = Arc::new(RecordingSink::default());
        let (source, signal) = cancellation();
        engine.cancel_after_query(1, source);

        let outcome = poll_loop(&engine, &sink, None)
            .run("Submitted", signal)
            .await
            .unwrap();

        assert_eq!(outcome.status, "Aborted");
        assert_eq!(engine.queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_failure_keeps_polling() {
        let engine = Arc::new(
            ScriptedEngine::new(vec![Ok("Running"), Ok("Succeeded")])
                .with_abort_reply(Err("abort refused")),
        );
        let sink = Arc::new(RecordingSink::default());
        let (source, signal) = cancellation();
        engine.cancel_after_query(1, source);

        let outcome = poll_loop(&engine, &sink, None)
            .run("Submitted", signal)
            .await
            .unwrap();

        assert_eq!(outcome.status, "Succeeded");
        assert!(sink.messages().iter().any(|m| m.contains("Failed to abort")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_once_for_every_cancellation_point() {
        for ticks in 1..=5usize {
            for cancel_after in 0..=ticks {
                let mut script: Vec<std::result::Result<&str, &str>> = vec![Ok("Running"); ticks - 1];
                script.push(Ok("Succeeded"));
                let engine = Arc::new(ScriptedEngine::new(script).with_abort_reply(Ok("Aborting")));
                let sink = Arc::new(RecordingSink::default());
                let (source, signal) = cancellation();
                if cancel_after == 0 {
                    source.cancel();
                } else {
                    engine.cancel_after_query(cancel_after, source);
                }

                let controller = poll_loop(&engine, &sink, None)
                    .run_with_controller("Submitted", signal)
                    .await;

                let terminal = sink
                    .levels()
                    .into_iter()
                    .filter(|l| matches!(l, Level::Info | Level::Error))
                    .count();
                assert_eq!(terminal, 1, "ticks={ticks} cancel_after={cancel_after}");
                assert_eq!(controller.scheduler().stops(), 1);
                assert_eq!(controller.into_outcome().unwrap().status, "Succeeded");
            }
        }
    }
}
