//! The offer pipeline: parse, debounce, decide, and tap on accept.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use farewatch_core::events::EngineEvent;
use farewatch_core::state::EngineState;
use farewatch_core::store::SettingsStore;
use farewatch_core::types::{Decision, Offer, Stats};
use farewatch_offer::{evaluate_with, NoveltyFilter, OfferParser, Thresholds};
use farewatch_tap::{
    DelaySource, GestureDispatcher, IndicatorDisplay, RunOutcome, SequenceHandle, SequenceReport,
    TapError, TapPlan, TapSequencer,
};

use crate::outcome::{CycleOutcome, TapOutcome};

/// Capacity of the event channel; slow subscribers miss older events.
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
struct Session {
    id: Uuid,
    offers_seen: u64,
}

/// Runs each snapshot through parser, novelty filter, and policy, and starts
/// the accept sequence when an offer qualifies.
///
/// Processing is synchronous and never waits on a tap sequence or on disk;
/// sequences run on their own task and stats are saved on the blocking pool.
/// Snapshots are ignored unless a session is active.
pub struct EngineCoordinator {
    state: EngineState,
    parser: OfferParser,
    novelty: NoveltyFilter,
    store: Arc<dyn SettingsStore>,
    sequencer: TapSequencer,
    events: broadcast::Sender<EngineEvent>,
    session: Mutex<Option<Session>>,
    last_sequence: Mutex<Option<SequenceHandle>>,
}

impl EngineCoordinator {
    pub fn new(store: Arc<dyn SettingsStore>, dispatcher: Arc<dyn GestureDispatcher>) -> Self {
        let state = EngineState::new();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let sequencer = TapSequencer::new(state.clone(), dispatcher).with_events(events.clone());
        Self {
            novelty: NoveltyFilter::new(state.clone()),
            state,
            parser: OfferParser::new(),
            store,
            sequencer,
            events,
            session: Mutex::new(None),
            last_sequence: Mutex::new(None),
        }
    }

    pub fn with_indicator(mut self, indicator: Arc<dyn IndicatorDisplay>) -> Self {
        self.sequencer = self.sequencer.with_indicator(indicator);
        self
    }

    pub fn with_delays(mut self, delays: impl DelaySource + 'static) -> Self {
        self.sequencer = self.sequencer.with_delays(delays);
        self
    }

    /// Receive engine events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn stats(&self) -> Stats {
        self.store.stats()
    }

    pub fn is_active(&self) -> bool {
        self.session().is_some()
    }

    /// Start a session: forget the last seen offer and begin reacting to
    /// snapshots. Starting while a session runs replaces it.
    pub fn start_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.reset();
        *self.session() = Some(Session { id, offers_seen: 0 });

        tracing::info!(session_id = %id, "Session started");
        self.emit(EngineEvent::SessionStarted {
            session_id: id,
            timestamp: Utc::now(),
        });
        id
    }

    /// Stop reacting to snapshots and cancel any running tap sequence.
    ///
    /// Returns the id of the stopped session, or `None` if none was running.
    pub fn stop_session(&self) -> Option<Uuid> {
        // Taking the session waits for a cycle in progress, so any sequence
        // it started is covered by the cancel.
        let session = self.session().take();
        self.sequencer.cancel();
        let session = session?;

        tracing::info!(
            session_id = %session.id,
            offers_seen = session.offers_seen,
            "Session stopped"
        );
        self.emit(EngineEvent::SessionStopped {
            session_id: session.id,
            offers_seen: session.offers_seen,
            timestamp: Utc::now(),
        });
        Some(session.id)
    }

    /// Process one snapshot received at `now`.
    ///
    /// Must be called from within a tokio runtime for accepted offers to be
    /// tapped; outside one the outcome reports [`TapOutcome::Failed`].
    pub fn on_snapshot<S: AsRef<str>>(&self, fragments: &[S], now: DateTime<Utc>) -> CycleOutcome {
        // Held for the whole cycle so `stop_session` cannot interleave with it.
        let mut session = self.session();
        let Some(active) = session.as_mut() else {
            return CycleOutcome::Inactive;
        };

        let Some(offer) = self.parser.parse(fragments) else {
            return CycleOutcome::NoOffer;
        };

        if !self.novelty.is_novel(&offer, now) {
            return CycleOutcome::Duplicate;
        }

        active.offers_seen += 1;

        let config = self.store.config();
        let decision = evaluate_with(&offer, Thresholds::from(&config.policy));

        if decision.accept {
            tracing::info!(
                fare = offer.total_fare,
                rate = offer.rate_per_distance,
                pickup = offer.pickup_distance,
                trip = offer.trip_distance,
                "Offer accepted"
            );
        } else {
            tracing::info!(
                fare = offer.total_fare,
                rate = offer.rate_per_distance,
                pickup = offer.pickup_distance,
                trip = offer.trip_distance,
                "Offer rejected"
            );
        }

        self.emit(EngineEvent::OfferDecided {
            offer: offer.clone(),
            accepted: decision.accept,
            summary: decision.summary.clone(),
            timestamp: Utc::now(),
        });

        let taps = if !decision.accept {
            TapOutcome::NotAccepted
        } else if !config.policy.auto_accept {
            tracing::debug!("Auto-accept disabled, not tapping");
            TapOutcome::AutoAcceptDisabled
        } else {
            self.start_taps(&config.taps)
        };

        if let Err(e) = self.store.record_decision(&decision) {
            tracing::warn!(error = %e, "Failed to record decision");
        }
        self.save_stats();

        CycleOutcome::Decided {
            offer,
            decision,
            taps,
        }
    }

    fn start_taps(&self, taps: &farewatch_core::config::TapConfig) -> TapOutcome {
        let result = TapPlan::from_config(taps).and_then(|plan| self.sequencer.run(plan));
        match result {
            Ok(RunOutcome::Started(handle)) => {
                let sequence_id = handle.sequence_id;
                *self.last_sequence() = Some(handle);
                TapOutcome::Started { sequence_id }
            }
            Ok(RunOutcome::Busy) => TapOutcome::Busy,
            Err(TapError::Uncalibrated(missing)) => {
                tracing::warn!(
                    missing_targets = ?missing,
                    "Accept targets not calibrated, run `farewatch calibrate`"
                );
                self.emit(EngineEvent::CalibrationRequired {
                    missing_targets: missing.clone(),
                    timestamp: Utc::now(),
                });
                TapOutcome::Uncalibrated(missing)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tap sequence not started");
                TapOutcome::Failed(e.to_string())
            }
        }
    }

    /// Save stats on the blocking pool, or inline when there is no runtime.
    fn save_stats(&self) {
        let store = Arc::clone(&self.store);
        let save = move || {
            if let Err(e) = store.persist_stats() {
                tracing::warn!(error = %e, "Failed to save stats");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(save);
            }
            Err(_) => save(),
        }
    }

    /// Wait for the most recently started sequence, if it was not awaited yet.
    pub async fn wait_for_sequence(&self) -> Option<SequenceReport> {
        let handle = self.last_sequence().take()?;
        match handle.wait().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "Tap sequence task failed");
                None
            }
        }
    }

    /// Parse and evaluate without touching session, novelty, or stats.
    pub fn preview<S: AsRef<str>>(&self, fragments: &[S]) -> Option<(Offer, Decision)> {
        let offer = self.parser.parse(fragments)?;
        let config = self.store.config();
        let decision = evaluate_with(&offer, Thresholds::from(&config.policy));
        Some((offer, decision))
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn last_sequence(&self) -> MutexGuard<'_, Option<SequenceHandle>> {
        self.last_sequence.lock().unwrap_or_else(|e| e.into_inner())
    }
}
