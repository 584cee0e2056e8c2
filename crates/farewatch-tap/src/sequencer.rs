//! Single-flight execution of tap plans.
//!
//! At most one sequence runs at a time across the whole engine: the
//! in-flight flag lives in the shared [`EngineState`] and is claimed before a
//! sequence is spawned. A request made while a sequence runs is dropped, not
//! queued. The flag is released by a drop guard owned by the spawned task, so
//! it is cleared exactly once whether the sequence completes, is cancelled,
//! fails, or the task is aborted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use farewatch_core::events::EngineEvent;
use farewatch_core::state::EngineState;
use farewatch_core::types::DelayRange;

use crate::delay::{DelaySource, RandomDelays};
use crate::dispatch::{GestureDispatcher, IndicatorDisplay};
use crate::error::TapError;
use crate::plan::TapPlan;

/// How a sequence ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceStatus {
    Completed,
    Cancelled,
    /// A dispatch failed; remaining steps were skipped.
    Aborted(String),
}

/// Summary of a finished sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport {
    pub sequence_id: Uuid,
    pub taps_dispatched: usize,
    pub status: SequenceStatus,
}

impl SequenceReport {
    pub fn completed(&self) -> bool {
        self.status == SequenceStatus::Completed
    }
}

/// Handle to a spawned sequence.
#[derive(Debug)]
pub struct SequenceHandle {
    pub sequence_id: Uuid,
    join: JoinHandle<SequenceReport>,
}

impl SequenceHandle {
    /// Wait for the sequence to finish.
    pub async fn wait(self) -> Result<SequenceReport, TapError> {
        self.join
            .await
            .map_err(|e| TapError::TaskFailed(e.to_string()))
    }
}

/// Result of asking the sequencer to run a plan.
#[derive(Debug)]
pub enum RunOutcome {
    Started(SequenceHandle),
    /// Another sequence is in flight; the request was dropped.
    Busy,
}

/// Clears the in-flight flag when dropped.
struct InFlightGuard {
    state: EngineState,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.end_sequence();
    }
}

type SharedDelays = Arc<Mutex<Box<dyn DelaySource>>>;

/// Runs tap plans one at a time with jittered delays.
#[derive(Clone)]
pub struct TapSequencer {
    state: EngineState,
    dispatcher: Arc<dyn GestureDispatcher>,
    indicator: Option<Arc<dyn IndicatorDisplay>>,
    delays: SharedDelays,
    cancel: Arc<Notify>,
    cancel_epoch: Arc<AtomicU64>,
    events: Option<broadcast::Sender<EngineEvent>>,
}

impl TapSequencer {
    /// Create a sequencer sharing `state` with the rest of the engine.
    pub fn new(state: EngineState, dispatcher: Arc<dyn GestureDispatcher>) -> Self {
        Self {
            state,
            dispatcher,
            indicator: None,
            delays: Arc::new(Mutex::new(Box::new(RandomDelays))),
            cancel: Arc::new(Notify::new()),
            cancel_epoch: Arc::new(AtomicU64::new(0)),
            events: None,
        }
    }

    pub fn with_indicator(mut self, indicator: Arc<dyn IndicatorDisplay>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Replace the delay source, e.g. with a seeded one for reproducible runs.
    pub fn with_delays(mut self, delays: impl DelaySource + 'static) -> Self {
        self.delays = Arc::new(Mutex::new(Box::new(delays)));
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<EngineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Whether a sequence is currently running.
    pub fn is_running(&self) -> bool {
        self.state.sequence_in_flight()
    }

    /// Start executing `plan` in the background.
    ///
    /// The plan is validated before the in-flight flag is touched, so an
    /// invalid plan never blocks or releases another sequence. Must be called
    /// from within a tokio runtime.
    pub fn run(&self, plan: TapPlan) -> Result<RunOutcome, TapError> {
        plan.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TapError::NoRuntime)?;

        if !self.state.try_begin_sequence() {
            tracing::debug!("Tap sequence already in flight, dropping request");
            return Ok(RunOutcome::Busy);
        }
        let guard = InFlightGuard {
            state: self.state.clone(),
        };

        let sequence_id = Uuid::new_v4();
        let initial_delay_ms = draw(&self.delays, plan.initial_delay);

        tracing::info!(
            %sequence_id,
            steps = plan.steps.len(),
            initial_delay_ms,
            dispatcher = self.dispatcher.name(),
            "Tap sequence started"
        );
        emit(
            &self.events,
            EngineEvent::SequenceStarted {
                sequence_id,
                steps: plan.steps.len(),
                initial_delay_ms,
                timestamp: Utc::now(),
            },
        );

        let run = SequenceRun {
            sequence_id,
            plan,
            dispatcher: Arc::clone(&self.dispatcher),
            indicator: self.indicator.clone(),
            delays: Arc::clone(&self.delays),
            cancel: Arc::clone(&self.cancel),
            cancel_epoch: Arc::clone(&self.cancel_epoch),
            start_epoch: self.cancel_epoch.load(Ordering::SeqCst),
            events: self.events.clone(),
        };

        let join = runtime.spawn(async move {
            let _guard = guard;
            let report = run.execute(initial_delay_ms).await;
            emit(
                &run.events,
                EngineEvent::SequenceFinished {
                    sequence_id: report.sequence_id,
                    completed: report.completed(),
                    timestamp: Utc::now(),
                },
            );
            report
        });

        Ok(RunOutcome::Started(SequenceHandle { sequence_id, join }))
    }

    /// Cancel every sequence started before this call.
    ///
    /// Pending delays end immediately and no further taps are dispatched. A
    /// tap already handed to the dispatcher is allowed to finish.
    pub fn cancel(&self) {
        self.cancel_epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel.notify_waiters();
    }
}

fn draw(delays: &SharedDelays, range: DelayRange) -> u64 {
    delays
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .draw_ms(range)
}

fn emit(events: &Option<broadcast::Sender<EngineEvent>>, event: EngineEvent) {
    if let Some(tx) = events {
        // No subscribers is fine.
        let _ = tx.send(event);
    }
}

/// Everything the spawned task needs to execute one plan.
struct SequenceRun {
    sequence_id: Uuid,
    plan: TapPlan,
    dispatcher: Arc<dyn GestureDispatcher>,
    indicator: Option<Arc<dyn IndicatorDisplay>>,
    delays: SharedDelays,
    cancel: Arc<Notify>,
    cancel_epoch: Arc<AtomicU64>,
    start_epoch: u64,
    events: Option<broadcast::Sender<EngineEvent>>,
}

impl SequenceRun {
    fn is_cancelled(&self) -> bool {
        self.cancel_epoch.load(Ordering::SeqCst) != self.start_epoch
    }

    /// Sleep until `deadline`; returns false if cancelled first.
    async fn pause_until(&self, deadline: Instant) -> bool {
        // Register for wakeups before checking the epoch so a cancel between
        // the two cannot be missed.
        let notified = self.cancel.notified();
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => true,
            _ = notified => false,
        }
    }

    fn report(&self, taps_dispatched: usize, status: SequenceStatus) -> SequenceReport {
        match &status {
            SequenceStatus::Completed => {
                tracing::info!(sequence_id = %self.sequence_id, taps_dispatched, "Tap sequence completed")
            }
            SequenceStatus::Cancelled => {
                tracing::info!(sequence_id = %self.sequence_id, taps_dispatched, "Tap sequence cancelled")
            }
            SequenceStatus::Aborted(reason) => {
                tracing::warn!(sequence_id = %self.sequence_id, taps_dispatched, reason = %reason, "Tap sequence aborted")
            }
        }
        SequenceReport {
            sequence_id: self.sequence_id,
            taps_dispatched,
            status,
        }
    }

    async fn execute(&self, initial_delay_ms: u64) -> SequenceReport {
        let deadline = Instant::now() + Duration::from_millis(initial_delay_ms);
        if !self.pause_until(deadline).await {
            return self.report(0, SequenceStatus::Cancelled);
        }

        let total = self.plan.steps.len();
        let mut dispatched = 0;

        for (index, step) in self.plan.steps.iter().enumerate() {
            if self.is_cancelled() {
                return self.report(dispatched, SequenceStatus::Cancelled);
            }

            if self.plan.show_indicator {
                if let Some(indicator) = &self.indicator {
                    if let Err(e) = indicator.show(step.point, self.plan.indicator_size_px) {
                        tracing::warn!(step = index + 1, error = %e, "Tap indicator failed");
                    }
                }
            }

            // Gaps run from the start of each dispatch, so dispatcher latency
            // and the hold duration do not stretch them.
            let dispatch_started = Instant::now();
            if let Err(e) = self
                .dispatcher
                .dispatch_tap(step.point, step.duration_ms)
                .await
            {
                return self.report(dispatched, SequenceStatus::Aborted(e.to_string()));
            }
            dispatched += 1;

            tracing::debug!(
                sequence_id = %self.sequence_id,
                step = index + 1,
                x = step.point.x,
                y = step.point.y,
                "Tap dispatched"
            );
            emit(
                &self.events,
                EngineEvent::TapDispatched {
                    sequence_id: self.sequence_id,
                    step: index + 1,
                    point: step.point,
                    duration_ms: step.duration_ms,
                    timestamp: Utc::now(),
                },
            );

            if index + 1 < total {
                let gap = draw(&self.delays, self.plan.inter_step_delay);
                if !self.pause_until(dispatch_started + Duration::from_millis(gap)).await {
                    return self.report(dispatched, SequenceStatus::Cancelled);
                }
            }
        }

        self.report(dispatched, SequenceStatus::Completed)
    }
}
