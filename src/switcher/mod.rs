//! Switch scheduling per target set
//!
//! One `SwitchScheduler` instance runs the camera rotation, another the
//! overlay rotation. Each owns its `SwitcherState` exclusively and is driven
//! by the 1 Hz system tick; fired triggers go out through the shared
//! `DispatchQueue`.

pub mod selection;
pub mod stats;

use std::collections::{HashSet, VecDeque};
use std::fmt;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::SwitcherConfig;
use crate::dispatch::DispatchQueue;
use crate::target::ButtonLocation;
use crate::time::now_ms;
use stats::HistoryEntry;

/// Which target set a scheduler drives (used for logging and CC routing)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitcherKind {
    Camera,
    Overlay,
}

impl fmt::Display for SwitcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitcherKind::Camera => write!(f, "camera"),
            SwitcherKind::Overlay => write!(f, "overlay"),
        }
    }
}

/// Countdown and rotation state for one target set
#[derive(Debug, Clone)]
pub struct SwitcherState {
    pub is_running: bool,
    /// Seconds until the next automatic trigger
    pub countdown: u32,
    /// Index of the target that will fire next; None while stopped
    pub next_index: Option<usize>,
    /// Identifier of the last fired target
    pub previous_target: Option<String>,
    pub trigger_count: u64,
    pub min_seconds: u32,
    pub max_seconds: u32,
    /// Target identifiers in configuration order
    pub targets: Vec<String>,
    /// Bounded FIFO of recent triggers
    pub history: VecDeque<HistoryEntry>,
    /// Targets temporarily excluded from random selection
    pub blacklist: HashSet<String>,
    /// Epoch milliseconds of the last trigger
    pub last_trigger_time: Option<u64>,
    /// EWMA of seconds between triggers
    pub average_interval_secs: f64,
    pub sequential_mode: bool,
    /// Round-robin cursor, meaningful only in sequential mode
    pub sequential_index: usize,
}

impl SwitcherState {
    pub fn new(min_seconds: u32, max_seconds: u32, targets: Vec<String>, sequential_mode: bool) -> Self {
        Self {
            is_running: false,
            countdown: 0,
            next_index: None,
            previous_target: None,
            trigger_count: 0,
            min_seconds,
            max_seconds,
            targets,
            history: VecDeque::new(),
            blacklist: HashSet::new(),
            last_trigger_time: None,
            average_interval_secs: 0.0,
            sequential_mode,
            sequential_index: 0,
        }
    }
}

/// Timer-driven state machine for one target set
pub struct SwitchScheduler {
    kind: SwitcherKind,
    pub state: SwitcherState,
    avoid_repeat: bool,
    history_size: usize,
    queue: DispatchQueue,
}

impl SwitchScheduler {
    pub fn from_config(kind: SwitcherKind, cfg: &SwitcherConfig, queue: DispatchQueue) -> Self {
        Self {
            kind,
            state: SwitcherState::new(
                cfg.min_seconds,
                cfg.max_seconds,
                cfg.targets.clone(),
                cfg.sequential_mode,
            ),
            avoid_repeat: cfg.avoid_repeat,
            history_size: cfg.history_size,
            queue,
        }
    }

    pub fn kind(&self) -> SwitcherKind {
        self.kind
    }

    /// Start the rotation: pick a next target and draw a countdown
    pub fn start(&mut self) {
        if self.state.targets.is_empty() {
            warn!("No {} targets configured", self.kind);
            return;
        }

        self.state.is_running = true;
        self.state.next_index = selection::select_next(&mut self.state, self.avoid_repeat).ok();
        self.state.countdown = self.draw_countdown();

        info!(
            "{} switcher started with {}s countdown",
            self.kind, self.state.countdown
        );
    }

    /// Stop the rotation and clear countdown state
    pub fn stop(&mut self) {
        self.state.is_running = false;
        self.state.countdown = 0;
        self.state.next_index = None;
        self.state.sequential_index = 0;

        info!("{} switcher stopped", self.kind);
    }

    /// 1 Hz tick: decrement the countdown and fire when it reaches zero
    ///
    /// The caller only ticks while the system is running and not paused.
    pub fn on_tick(&mut self) {
        if !self.state.is_running || self.state.countdown == 0 {
            return;
        }

        self.state.countdown -= 1;
        if self.state.countdown == 0 {
            self.fire();
        }
    }

    /// Fire the currently selected target, then rearm
    pub fn fire(&mut self) {
        let Some(index) = self.state.next_index else {
            return;
        };
        let Some(target) = self.state.targets.get(index).cloned() else {
            return;
        };

        match target.parse::<ButtonLocation>() {
            Ok(location) => {
                self.queue.press(location);

                self.state.previous_target = Some(target.clone());
                self.state.trigger_count += 1;
                stats::record_trigger(&mut self.state, &target, now_ms(), self.history_size);

                info!("{} triggered: {}", self.kind, target);
            }
            Err(e) => {
                // Configuration error, surfaced at dispatch time: skip the
                // trigger but keep rotating so one bad entry cannot wedge
                // the scheduler.
                warn!("Invalid {} target '{}': {}", self.kind, target, e);
            }
        }

        self.state.next_index = selection::select_next(&mut self.state, self.avoid_repeat).ok();
        if self.state.is_running {
            self.state.countdown = self.draw_countdown();
        }
    }

    /// Operator override: fire immediately, starting the rotation if needed
    pub fn manual_trigger(&mut self) {
        if self.state.targets.is_empty() {
            warn!("No {} targets configured", self.kind);
            return;
        }

        if !self.state.is_running {
            self.start();
        }
        self.fire();
    }

    /// Override the countdown on a running rotation (MIDI CC)
    pub fn set_countdown(&mut self, seconds: u32) {
        if self.state.is_running {
            self.state.countdown = seconds;
            debug!("{} countdown set to {}s", self.kind, seconds);
        }
    }

    pub fn set_min_seconds(&mut self, seconds: u32) {
        self.state.min_seconds = seconds;
        info!("{} min interval set to {}s", self.kind, seconds);
    }

    pub fn set_max_seconds(&mut self, seconds: u32) {
        self.state.max_seconds = seconds;
        info!("{} max interval set to {}s", self.kind, seconds);
    }

    /// Flip between sequential and random selection, restarting the cursor
    pub fn toggle_mode(&mut self) {
        self.state.sequential_mode = !self.state.sequential_mode;
        self.state.sequential_index = 0;
        info!(
            "{} mode toggled to {}",
            self.kind,
            if self.state.sequential_mode { "sequential" } else { "random" }
        );
    }

    /// Zero trigger bookkeeping (counts, history, averages)
    pub fn reset_stats(&mut self) {
        self.state.trigger_count = 0;
        self.state.previous_target = None;
        self.state.history.clear();
        self.state.average_interval_secs = 0.0;
        self.state.last_trigger_time = None;
    }

    /// First configured target, if any (used for the stop courtesy dispatch)
    pub fn first_target(&self) -> Option<&str> {
        self.state.targets.first().map(String::as_str)
    }

    fn draw_countdown(&self) -> u32 {
        let (min, max) = (self.state.min_seconds, self.state.max_seconds);
        if min >= max {
            min
        } else {
            rand::rng().random_range(min..=max)
        }
    }
}
