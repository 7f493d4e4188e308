use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use marionette_core::error::{EngineError, Result};
use marionette_core::event::{EventBus, RunEvent};
use marionette_core::types::{LogBuffer, LogEntry, LogLevel, RunState, RunStatus};

/// Cooperative pause poll interval.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Terminal summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub state: RunState,
    pub steps_executed: u64,
    pub elapsed_ms: u64,
}

/// Run-lifecycle state shared between an executor and its outer layer.
///
/// Owns the state machine (idle → running → paused/stopped/completed/error),
/// the pause and stop flags, the rolling log, and status emission. Both
/// engines drive their runs through one of these; one run at a time per
/// instance.
pub struct RunControl {
    state: Mutex<RunState>,
    paused: AtomicBool,
    cancel: Mutex<CancellationToken>,
    log: Mutex<LogBuffer>,
    current: Mutex<Option<String>>,
    progress: Mutex<f32>,
    events: Arc<EventBus>,
}

impl RunControl {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            state: Mutex::new(RunState::Idle),
            paused: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            log: Mutex::new(LogBuffer::new()),
            current: Mutex::new(None),
            progress: Mutex::new(0.0),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    /// Claim the executor for a new run. Fails if a run is already active.
    ///
    /// Resets all run-scoped state: fresh stop token, cleared pause flag,
    /// empty log, zero progress.
    pub fn try_begin(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if matches!(*state, RunState::Running | RunState::Paused) {
            return Err(EngineError::AlreadyRunning);
        }
        *state = RunState::Running;
        drop(state);

        self.paused.store(false, Ordering::SeqCst);
        *self.cancel.lock().unwrap() = CancellationToken::new();
        *self.log.lock().unwrap() = LogBuffer::new();
        *self.current.lock().unwrap() = None;
        *self.progress.lock().unwrap() = 0.0;
        self.emit_status();
        Ok(())
    }

    /// Transition into a terminal state and emit the final snapshot.
    pub fn finish(&self, terminal: RunState) {
        debug_assert!(terminal.is_terminal());
        *self.state.lock().unwrap() = terminal;
        if terminal == RunState::Completed {
            *self.progress.lock().unwrap() = 100.0;
        }
        *self.current.lock().unwrap() = None;
        self.emit_status();
    }

    /// Request a pause. Non-blocking; observed at the next poll point.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Clear a pause request. Non-blocking.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Request a stop. Non-blocking; takes effect at the next safe point,
    /// never mid-action.
    pub fn stop(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().unwrap().is_cancelled()
    }

    /// Block cooperatively while paused, polling every [`PAUSE_POLL`].
    ///
    /// A stop request interrupts the pause. Returns `true` if the run may
    /// continue, `false` if it was stopped.
    pub async fn wait_if_paused(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if !self.paused.load(Ordering::SeqCst) {
            return true;
        }

        *self.state.lock().unwrap() = RunState::Paused;
        self.log(LogLevel::Info, "run paused");

        while self.paused.load(Ordering::SeqCst) {
            if self.is_cancelled() {
                return false;
            }
            tokio::time::sleep(PAUSE_POLL).await;
        }

        *self.state.lock().unwrap() = RunState::Running;
        self.log(LogLevel::Info, "run resumed");
        !self.is_cancelled()
    }

    pub fn set_current(&self, current: Option<String>) {
        *self.current.lock().unwrap() = current;
    }

    pub fn set_progress(&self, progress: f32) {
        *self.progress.lock().unwrap() = progress.clamp(0.0, 100.0);
    }

    /// Append to the rolling log and emit both the log line and a full
    /// status snapshot.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        match level {
            LogLevel::Info => info!("{}", entry.message),
            LogLevel::Warn => warn!("{}", entry.message),
            LogLevel::Error => error!("{}", entry.message),
        }
        self.log.lock().unwrap().push(entry.clone());
        self.events.publish(RunEvent::Log(entry));
        self.emit_status();
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            state: self.state(),
            current: self.current.lock().unwrap().clone(),
            progress: *self.progress.lock().unwrap(),
            log: self.log.lock().unwrap().to_vec(),
        }
    }

    fn emit_status(&self) {
        self.events.publish(RunEvent::Status(self.status()));
    }
}
