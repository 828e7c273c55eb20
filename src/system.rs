//! System-level run/pause state machine
//!
//! Coordinates session accounting across both switchers: start/stop/pause/
//! resume transitions and the active-duration bookkeeping that the 1 Hz tick
//! keeps current. Starting and stopping the individual schedulers is
//! orchestrated by the application context, not here.

use tracing::info;

/// Session-level runtime state
#[derive(Debug, Clone, Default)]
pub struct SystemState {
    pub is_running: bool,
    /// Paused implies running; ticks are still received but have no effect
    pub is_paused: bool,
    /// Epoch milliseconds when the current session started
    pub start_time: Option<u64>,
    /// Epoch milliseconds when the current pause began
    pub pause_start_time: Option<u64>,
    /// Seconds of unpaused runtime in the current session
    pub active_duration_secs: u64,
    /// Cumulative runtime across sessions, seconds
    pub total_runtime_secs: u64,
    pub session_count: u64,
    /// Total milliseconds spent paused in the current session
    pub total_paused_ms: u64,
}

/// Start/stop/pause/resume transitions over `SystemState`
#[derive(Debug, Default)]
pub struct SystemStateMachine {
    pub state: SystemState,
}

impl SystemStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new session at `now_ms`
    pub fn start(&mut self, now_ms: u64) {
        self.state.is_running = true;
        self.state.is_paused = false;
        self.state.start_time = Some(now_ms);
        self.state.pause_start_time = None;
        self.state.active_duration_secs = 0;
        self.state.total_paused_ms = 0;
        self.state.session_count += 1;

        info!("System started (session {})", self.state.session_count);
    }

    /// End the session, folding its elapsed time into the total runtime
    pub fn stop(&mut self, now_ms: u64) {
        self.state.is_running = false;
        self.state.is_paused = false;
        self.state.pause_start_time = None;

        if let Some(start) = self.state.start_time.take() {
            let session_secs = now_ms.saturating_sub(start) / 1000;
            self.state.total_runtime_secs += session_secs;
        }

        info!("System stopped");
    }

    /// Freeze countdown and duration accounting; valid only while running
    pub fn pause(&mut self, now_ms: u64) {
        if self.state.is_running && !self.state.is_paused {
            self.state.is_paused = true;
            self.state.pause_start_time = Some(now_ms);
            info!("System paused");
        }
    }

    /// Resume from pause, accumulating the paused span
    pub fn resume(&mut self, now_ms: u64) {
        if self.state.is_running && self.state.is_paused {
            if let Some(pause_start) = self.state.pause_start_time.take() {
                self.state.total_paused_ms += now_ms.saturating_sub(pause_start);
            }
            self.state.is_paused = false;
            info!("System resumed");
        }
    }

    /// 1 Hz tick: refresh the active duration while running and unpaused
    pub fn on_tick(&mut self, now_ms: u64) {
        if !self.state.is_running || self.state.is_paused {
            return;
        }
        if let Some(start) = self.state.start_time {
            let elapsed = now_ms.saturating_sub(start);
            self.state.active_duration_secs =
                elapsed.saturating_sub(self.state.total_paused_ms) / 1000;
        }
    }

    /// Zero the per-session clock (used after a full reset)
    pub fn reset(&mut self) {
        self.state.start_time = None;
        self.state.active_duration_secs = 0;
        self.state.total_paused_ms = 0;
        self.state.pause_start_time = None;
    }
}
