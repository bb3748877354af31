//! Fakes shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::cancel::CancellationSource;
use crate::engine::types::{Failure, WorkflowMetadata, WorkflowResponse, WorkflowSpec};
use crate::engine::Engine;
use crate::error::{AppError, Result};
use crate::notify::{Level, Notification, ProgressSink};
use crate::workflow::poller::{IntervalScheduler, Scheduler};

#[derive(Debug, Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn levels(&self) -> Vec<Level> {
        self.notifications.lock().unwrap().iter().map(|n| n.level).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }
}

impl ProgressSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

/// Counts start/stop calls. The real interval is only built on the first
/// `tick`, so `start` and `stop` work without a runtime.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    inner: IntervalScheduler,
    pending: Option<Duration>,
    starts: usize,
    stops: usize,
}

impl CountingScheduler {
    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn stops(&self) -> usize {
        self.stops
    }
}

#[async_trait]
impl Scheduler for CountingScheduler {
    fn start(&mut self, period: Duration) {
        self.starts += 1;
        self.pending = Some(period);
    }

    async fn tick(&mut self) {
        if let Some(period) = self.pending.take() {
            self.inner.start(period);
        }
        self.inner.tick().await
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.pending = None;
        self.inner.stop();
    }
}

type Scripted = std::result::Result<&'static str, &'static str>;

/// Engine that replays a fixed list of status replies.
pub struct ScriptedEngine {
    statuses: Mutex<VecDeque<Scripted>>,
    abort_reply: Scripted,
    metadata_reply: std::result::Result<Vec<&'static str>, &'static str>,
    cancel_trigger: Mutex<Option<(usize, CancellationSource)>>,
    queries: AtomicUsize,
    aborts: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(statuses: Vec<Scripted>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            abort_reply: Ok("Aborting"),
            metadata_reply: Ok(Vec::new()),
            cancel_trigger: Mutex::new(None),
            queries: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
        }
    }

    pub fn with_abort_reply(mut self, reply: Scripted) -> Self {
        self.abort_reply = reply;
        self
    }

    /// Workflow-level failure messages served by `metadata`, or its error.
    pub fn with_failures(mut self, reply: std::result::Result<Vec<&'static str>, &'static str>) -> Self {
        self.metadata_reply = reply;
        self
    }

    /// Fire `source` while serving the `n`-th status query.
    pub fn cancel_after_query(&self, n: usize, source: CancellationSource) {
        *self.cancel_trigger.lock().unwrap() = Some((n, source));
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    fn reply(id: &str, scripted: Scripted) -> Result<WorkflowResponse> {
        scripted
            .map(|status| WorkflowResponse {
                id: id.to_string(),
                status: status.to_string(),
            })
            .map_err(|message| AppError::Internal(message.to_string()))
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn submit(&self, _spec: &WorkflowSpec) -> Result<WorkflowResponse> {
        Self::reply("wf-1", Ok("Submitted"))
    }

    async fn query_status(&self, id: &str) -> Result<WorkflowResponse> {
        let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;

        let mut trigger = self.cancel_trigger.lock().unwrap();
        if trigger.as_ref().is_some_and(|(at, _)| *at == n) {
            if let Some((_, source)) = trigger.take() {
                source.cancel();
            }
        }
        drop(trigger);

        let next = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err("status script exhausted"));
        Self::reply(id, next)
    }

    async fn abort(&self, id: &str) -> Result<WorkflowResponse> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        Self::reply(id, self.abort_reply)
    }

    async fn metadata(&self, _id: &str) -> Result<WorkflowMetadata> {
        let messages = self
            .metadata_reply
            .clone()
            .map_err(|message| AppError::Internal(message.to_string()))?;
        Ok(WorkflowMetadata {
            status: "Failed".to_string(),
            failures: messages
                .into_iter()
                .map(|message| Failure {
                    message: message.to_string(),
                    caused_by: Vec::new(),
                })
                .collect(),
            calls: Default::default(),
        })
    }
}
