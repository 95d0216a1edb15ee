//! Durable process host.
//!
//! A process is an event-sourced state machine driven by one tokio task.
//! The task asks the process for its next step, runs side effects, and
//! records every result as events before moving on, so a restarted task
//! replays the stream and continues where the previous one stopped.
//!
//! ```text
//!            ┌──────────── next_step(state) ◄───────────────┐
//!            ▼                                              │
//!   Run(effect) ── effect result ──► record events ─────────┤
//!   Record(events) ─────────────────► record events ────────┤
//!   Await ──── mailbox message ──► on_message ──► record ───┘
//!   Finish(outcome) ──► publish outcome, task exits
//! ```
//!
//! Messages are also drained while an effect is in flight, so signals are
//! never held up by a slow side effect.

use std::sync::Arc;

use common::AggregateId;
use domain::{Aggregate, Failure, Journal, SnapshotCapable};
use event_store::EventStore;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::Instrument;

use crate::error::{Result, WorkflowError};

/// Events of a process's state.
pub type EventOf<P> = <<P as Process>::State as Aggregate>::Event;

/// How a process ended: its output, or the failure that stopped it.
pub type Outcome<P> = std::result::Result<<P as Process>::Output, Failure>;

/// A side effect whose result is a batch of events to record.
pub type Effect<P> = BoxFuture<'static, Result<Vec<EventOf<P>>>>;

/// What a process wants to do next, decided from its state alone.
pub enum Step<P: Process> {
    /// Run a side effect and record the events it returns.
    Run {
        activity: &'static str,
        effect: Effect<P>,
    },
    /// Record events without calling out.
    Record(Vec<EventOf<P>>),
    /// Wait for the next mailbox message.
    Await,
    /// Stop with this outcome.
    Finish(Outcome<P>),
}

impl<P: Process> Step<P> {
    pub fn run<F>(activity: &'static str, effect: F) -> Self
    where
        F: std::future::Future<Output = Result<Vec<EventOf<P>>>> + Send + 'static,
    {
        Step::Run {
            activity,
            effect: Box::pin(effect),
        }
    }
}

/// What a step can reach besides the state.
pub struct StepContext<P: Process> {
    pub id: AggregateId,
    pub services: Arc<P::Context>,
    /// The process's own mailbox, for handing to children and helpers.
    pub mailbox: mpsc::UnboundedSender<P::Message>,
}

/// A long-running state machine hosted by [`spawn`].
pub trait Process: Sized + Send + Sync + 'static {
    type State: SnapshotCapable + Clone + Send + Sync + 'static;
    type Message: Send + 'static;
    type Output: Clone + Send + Sync + 'static;
    type Context: Send + Sync + 'static;

    /// Decides the next step. Must be deterministic for a given state.
    fn next_step(state: &Self::State, ctx: &StepContext<Self>) -> Step<Self>;

    /// Turns a mailbox message into events. No events means ignored.
    fn on_message(state: &Self::State, message: Self::Message) -> Vec<EventOf<Self>>;

    /// Turns a failed side effect into the events that record it.
    fn on_failure(state: &Self::State, failure: Failure) -> Vec<EventOf<Self>>;

    /// Called once when the task starts, before the first step.
    fn resume(_state: &Self::State, _ctx: &StepContext<Self>) {}

    fn kind() -> &'static str {
        <Self::State as Aggregate>::aggregate_type()
    }
}

/// Handle to a hosted process.
///
/// Reading state never blocks or mutates the process: it returns the state
/// published after the last recorded transition.
pub struct ProcessHandle<P: Process> {
    id: AggregateId,
    mailbox: mpsc::UnboundedSender<P::Message>,
    state: watch::Receiver<P::State>,
    outcome: watch::Receiver<Option<Outcome<P>>>,
    task: AbortHandle,
}

impl<P: Process> Clone for ProcessHandle<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            mailbox: self.mailbox.clone(),
            state: self.state.clone(),
            outcome: self.outcome.clone(),
            task: self.task.clone(),
        }
    }
}

impl<P: Process> std::fmt::Debug for ProcessHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("kind", &P::kind())
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<P: Process> ProcessHandle<P> {
    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> P::State {
        self.state.borrow().clone()
    }

    /// The outcome, once the process has finished.
    pub fn outcome(&self) -> Option<Outcome<P>> {
        self.outcome.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Delivers a message. Messages to a finished process are dropped.
    pub fn signal(&self, message: P::Message) -> Result<()> {
        if self.is_finished() {
            tracing::debug!(kind = P::kind(), id = %self.id, "Process finished, message dropped");
            return Ok(());
        }
        self.mailbox.send(message).map_err(|_| self.stopped())
    }

    /// Waits for the process to finish.
    pub async fn wait(&self) -> Result<Outcome<P>> {
        let mut outcome = self.outcome.clone();
        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| self.stopped())?;
        (*finished).clone().ok_or_else(|| self.stopped())
    }

    /// Stops the task without recording anything.
    pub fn abort(&self) {
        self.task.abort();
    }

    fn stopped(&self) -> WorkflowError {
        WorkflowError::Stopped {
            kind: P::kind(),
            id: self.id.to_string(),
        }
    }
}

/// Starts a task hosting process `id` from `state`, which must be the state
/// last loaded from or recorded to `journal`.
pub fn spawn<P, S>(
    journal: Journal<S, P::State>,
    id: AggregateId,
    state: P::State,
    services: Arc<P::Context>,
) -> ProcessHandle<P>
where
    P: Process,
    S: EventStore + 'static,
{
    let (mailbox, inbox) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(state.clone());
    let (outcome_tx, outcome_rx) = watch::channel(None);

    let runner = Runner::<P, S> {
        journal,
        state,
        ctx: StepContext {
            id: id.clone(),
            services,
            mailbox: mailbox.clone(),
        },
        inbox,
        state_tx,
        outcome_tx,
        progressed: false,
    };

    let span = tracing::info_span!("process", kind = P::kind(), id = %id);
    let task = tokio::spawn(runner.run().instrument(span)).abort_handle();

    ProcessHandle {
        id,
        mailbox,
        state: state_rx,
        outcome: outcome_rx,
        task,
    }
}

struct Runner<P: Process, S: EventStore> {
    journal: Journal<S, P::State>,
    state: P::State,
    ctx: StepContext<P>,
    inbox: mpsc::UnboundedReceiver<P::Message>,
    state_tx: watch::Sender<P::State>,
    outcome_tx: watch::Sender<Option<Outcome<P>>>,
    /// Set once this task recorded something.
    progressed: bool,
}

impl<P: Process, S: EventStore> Runner<P, S> {
    async fn run(mut self) {
        P::resume(&self.state, &self.ctx);

        let outcome = self.drive().await;

        // A replayed, already finished instance is not counted again.
        if self.progressed {
            match &outcome {
                Ok(_) => {
                    metrics::counter!("workflow_completed_total", "kind" => P::kind()).increment(1);
                    tracing::info!("process completed");
                }
                Err(failure) => {
                    metrics::counter!("workflow_failed_total", "kind" => P::kind()).increment(1);
                    tracing::warn!(%failure, "process failed");
                }
            }
        }

        self.outcome_tx.send_replace(Some(outcome));
    }

    async fn drive(&mut self) -> Outcome<P> {
        loop {
            let progress = match P::next_step(&self.state, &self.ctx) {
                Step::Finish(outcome) => return outcome,
                // Nothing to record means nothing changed: wait for a message
                // rather than spin.
                Step::Await => self.receive().await,
                Step::Record(events) if events.is_empty() => self.receive().await,
                Step::Record(events) => self.record(events).await,
                Step::Run { activity, effect } => {
                    tracing::debug!(activity, "running step");
                    match self.run_effect(effect).await {
                        Ok(Ok(events)) if events.is_empty() => self.receive().await,
                        Ok(Ok(events)) => self.record(events).await,
                        Ok(Err(err)) => self.fail(activity, err).await,
                        Err(err) => Err(err),
                    }
                }
            };

            if let Err(err) = progress {
                tracing::error!(error = %err, "could not record progress");
                return Err(Failure::infrastructure(err.to_string()));
            }
        }
    }

    /// Polls `effect` to completion, handling messages meanwhile. The outer
    /// error is a recording failure; the inner one is the effect's.
    async fn run_effect(&mut self, mut effect: Effect<P>) -> Result<Result<Vec<EventOf<P>>>> {
        loop {
            tokio::select! {
                result = &mut effect => return Ok(result),
                Some(message) = self.inbox.recv() => self.handle(message).await?,
            }
        }
    }

    async fn receive(&mut self) -> Result<()> {
        match self.inbox.recv().await {
            Some(message) => self.handle(message).await,
            None => Err(WorkflowError::Stopped {
                kind: P::kind(),
                id: self.ctx.id.to_string(),
            }),
        }
    }

    async fn handle(&mut self, message: P::Message) -> Result<()> {
        let events = P::on_message(&self.state, message);
        if events.is_empty() {
            tracing::debug!("message ignored");
            return Ok(());
        }
        self.record(events).await
    }

    async fn fail(&mut self, activity: &'static str, err: WorkflowError) -> Result<()> {
        tracing::warn!(activity, error = %err, "step failed");
        let events = P::on_failure(&self.state, err.to_failure());
        if events.is_empty() {
            return Err(err);
        }
        self.record(events).await
    }

    async fn record(&mut self, events: Vec<EventOf<P>>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.journal
            .record(&self.ctx.id, &mut self.state, events)
            .await?;
        self.progressed = true;
        self.state_tx.send_replace(self.state.clone());
        Ok(())
    }
}
