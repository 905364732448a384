//! One tokio task per session, driving the engine's tick loop.
//!
//! The engine lives behind a `tokio::sync::Mutex`. The loop takes it for
//! each tick; operator calls take it through [`SessionHandle::engine`], so
//! an operation never interleaves with an in-flight tick.
//!
//! Cancellation is observed between ticks and during the inter-tick wait,
//! which is sliced so a stop or a speed change takes effect promptly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tokio_util::sync::CancellationToken;

use colloquy_types::event::SessionEvent;

use crate::event::EventBus;
use crate::scheduler::{DialogueEngine, TickOutcome};

/// Longest single wait between cancellation checks.
const WAIT_SLICE: Duration = Duration::from_millis(250);

/// Handle to a running session. Cheap to share behind an `Arc`.
pub struct SessionHandle {
    owner_id: String,
    engine: Arc<Mutex<DialogueEngine>>,
    bus: EventBus,
    cancel: CancellationToken,
    finished: CancellationToken,
    started_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("owner_id", &self.owner_id)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Start the tick loop for `engine`. Cancelling `parent` stops it too.
    pub fn spawn(engine: DialogueEngine, parent: &CancellationToken) -> Self {
        let owner_id = engine.owner_id().to_string();
        let bus = engine.bus().clone();
        let engine = Arc::new(Mutex::new(engine));
        let cancel = parent.child_token();
        let finished = CancellationToken::new();

        tokio::spawn(run(
            Arc::clone(&engine),
            cancel.clone(),
            finished.clone(),
            StdRng::from_entropy(),
        ));
        tracing::info!(owner = %owner_id, "session started");

        Self {
            owner_id,
            engine,
            bus,
            cancel,
            finished,
            started_at: Utc::now(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Lock the engine. Ticks wait while the guard is held.
    pub async fn engine(&self) -> MutexGuard<'_, DialogueEngine> {
        self.engine.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.finished.is_cancelled()
    }

    /// Ask the loop to stop and wait until the final save is done.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.finished.cancelled().await;
    }

    /// Wait for the loop to end on its own (tick limit or cancellation).
    pub async fn finished(&self) {
        self.finished.cancelled().await;
    }
}

async fn run(
    engine: Arc<Mutex<DialogueEngine>>,
    cancel: CancellationToken,
    finished: CancellationToken,
    mut rng: StdRng,
) {
    let (max_ticks, double_tick) = {
        let e = engine.lock().await;
        let scheduler = &e.config().scheduler;
        (scheduler.max_ticks, scheduler.double_tick_chance.clamp(0.0, 1.0))
    };

    while !cancel.is_cancelled() {
        let tick = run_tick(&engine).await;
        if max_ticks > 0 && tick >= max_ticks {
            tracing::info!(tick, "tick limit reached");
            break;
        }

        if rng.gen_bool(double_tick) && !cancel.is_cancelled() {
            let tick = run_tick(&engine).await;
            if max_ticks > 0 && tick >= max_ticks {
                tracing::info!(tick, "tick limit reached");
                break;
            }
        }

        if !wait_for_next_tick(&engine, &cancel).await {
            break;
        }
    }

    engine.lock().await.stop().await;
    finished.cancel();
}

async fn run_tick(engine: &Mutex<DialogueEngine>) -> u64 {
    let mut e = engine.lock().await;
    match e.tick().await {
        TickOutcome::Spoke(entry) => {
            tracing::debug!(tick = entry.tick, speaker = %entry.speaker_label, "turn taken");
        }
        TickOutcome::Skipped(reason) => {
            tracing::debug!(tick = e.current_tick(), reason = %reason, "turn skipped");
        }
    }
    e.current_tick()
}

/// Sleep for the engine's tick delay in slices. A delay of zero pauses
/// until it changes. Returns `false` when cancelled.
async fn wait_for_next_tick(engine: &Mutex<DialogueEngine>, cancel: &CancellationToken) -> bool {
    let mut waited = Duration::ZERO;
    loop {
        // An operator call holding the lock keeps the last known delay.
        let delay = match engine.try_lock() {
            Ok(e) => e.tick_delay(),
            Err(_) => f64::INFINITY,
        };
        let target = Duration::try_from_secs_f64(delay).unwrap_or(Duration::MAX);
        let paused = delay == 0.0;
        if !paused && waited >= target {
            return true;
        }

        let slice = if paused {
            WAIT_SLICE
        } else {
            WAIT_SLICE.min(target.saturating_sub(waited))
        };
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(slice) => {}
        }
        if !paused {
            waited += slice;
        }
    }
}
