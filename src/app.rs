//! Application context
//!
//! `ShowSwitcher` owns both schedulers, the system state machine, the
//! dispatch queue handle, and the MIDI router. It is constructed once at
//! startup and driven from the main task: the 1 Hz tick, MIDI frames, and
//! operator commands all arrive here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::commands::{CcAction, Command};
use crate::config::AppConfig;
use crate::dispatch::{DispatchQueue, LocalFastPath};
use crate::midi::{mapping, MidiFrame, MidiInputRouter, RoutedEvent};
use crate::persistence::StatsSnapshot;
use crate::switcher::{SwitchScheduler, SwitcherKind};
use crate::system::SystemStateMachine;
use crate::target::ButtonLocation;
use crate::time::{format_duration, now_ms};

/// Central coordinator for the whole switcher
pub struct ShowSwitcher {
    pub config: AppConfig,
    pub camera: SwitchScheduler,
    pub overlay: SwitchScheduler,
    pub system: SystemStateMachine,
    pub queue: DispatchQueue,
    pub midi: Option<MidiInputRouter>,
}

impl ShowSwitcher {
    pub fn new(
        config: AppConfig,
        fast_path: Option<Arc<dyn LocalFastPath>>,
        midi: Option<MidiInputRouter>,
    ) -> Self {
        let queue = DispatchQueue::new(
            config.companion.host.clone(),
            config.companion.port,
            config.companion.enable_queue,
            fast_path,
        );

        let camera = SwitchScheduler::from_config(SwitcherKind::Camera, &config.camera, queue.clone());
        let overlay =
            SwitchScheduler::from_config(SwitcherKind::Overlay, &config.overlay, queue.clone());

        Self {
            config,
            camera,
            overlay,
            system: SystemStateMachine::new(),
            queue,
            midi,
        }
    }

    /// 1 Hz tick: advance countdowns (unless paused) and duration accounting
    pub fn on_tick(&mut self) {
        if !self.system.state.is_paused {
            self.camera.on_tick();
            self.overlay.on_tick();
        }
        self.system.on_tick(now_ms());
    }

    /// Start a new session and both rotations
    pub fn start_system(&mut self) {
        self.system.start(now_ms());
        self.camera.start();
        self.overlay.start();
    }

    /// Stop the session and return to the first camera target
    ///
    /// The courtesy return jumps any backlog of pending presses but still
    /// goes out on the drain tick, so a slow endpoint cannot stall command
    /// handling.
    pub async fn stop_system(&mut self) {
        let was_running = self.system.state.is_running;
        self.system.stop(now_ms());
        self.camera.stop();
        self.overlay.stop();

        if was_running {
            if let Some(target) = self.camera.first_target().map(str::to_string) {
                match target.parse::<ButtonLocation>() {
                    Ok(location) => {
                        info!("Returning to default camera: {}", target);
                        self.queue.press_priority(location);
                        self.camera.state.previous_target = Some(target);
                        self.camera.state.trigger_count += 1;
                    }
                    Err(e) => warn!("Invalid default camera target '{}': {}", target, e),
                }
            }

            if let Err(e) = self.save_stats().await {
                warn!("Failed to save statistics: {}", e);
            }
        }
    }

    pub fn pause_system(&mut self) {
        self.system.pause(now_ms());
    }

    pub fn resume_system(&mut self) {
        self.system.resume(now_ms());
    }

    /// Stop everything and zero all trigger bookkeeping and counters
    pub async fn reset_system(&mut self) {
        self.stop_system().await;
        self.camera.reset_stats();
        self.overlay.reset_stats();
        self.system.reset();
        self.queue.reset_counters();
        info!("System reset");
    }

    /// Apply a discrete operator command
    pub async fn apply_command(&mut self, command: Command) {
        match command {
            Command::SystemOn => self.start_system(),
            Command::SystemOff => self.stop_system().await,
            Command::SystemReset => self.reset_system().await,
            Command::SystemToggle => {
                if self.system.state.is_running {
                    self.stop_system().await;
                } else {
                    self.start_system();
                }
            }
            Command::SystemPause => self.pause_system(),
            Command::SystemResume => self.resume_system(),
            Command::CameraOn => self.camera.start(),
            Command::CameraOff => self.camera.stop(),
            Command::CameraManual => self.camera.manual_trigger(),
            Command::CameraToggle => {
                if self.camera.state.is_running {
                    self.camera.stop();
                } else {
                    self.camera.start();
                }
            }
            Command::CameraModeToggle => self.camera.toggle_mode(),
            Command::OverlayOn => self.overlay.start(),
            Command::OverlayOff => self.overlay.stop(),
            Command::OverlayManual => self.overlay.manual_trigger(),
            Command::OverlayToggle => {
                if self.overlay.state.is_running {
                    self.overlay.stop();
                } else {
                    self.overlay.start();
                }
            }
            Command::OverlayModeToggle => self.overlay.toggle_mode(),
        }
    }

    /// Apply a continuous (CC) adjustment
    pub fn apply_cc(&mut self, action: CcAction, value: u8) {
        match action {
            CcAction::CameraTimer => {
                let seconds = mapping::map_to_range(
                    value,
                    self.camera.state.min_seconds,
                    self.camera.state.max_seconds,
                );
                self.camera.set_countdown(seconds);
            }
            CcAction::OverlayTimer => {
                let seconds = mapping::map_to_range(
                    value,
                    self.overlay.state.min_seconds,
                    self.overlay.state.max_seconds,
                );
                self.overlay.set_countdown(seconds);
            }
            CcAction::CameraMinTimer
            | CcAction::CameraMaxTimer
            | CcAction::OverlayMinTimer
            | CcAction::OverlayMaxTimer => {
                let (min, max) = mapping::bound_adjust_range(action)
                    .expect("bound actions have fixed ranges");
                let seconds = mapping::map_to_range(value, min, max);
                match action {
                    CcAction::CameraMinTimer => self.camera.set_min_seconds(seconds),
                    CcAction::CameraMaxTimer => self.camera.set_max_seconds(seconds),
                    CcAction::OverlayMinTimer => self.overlay.set_min_seconds(seconds),
                    CcAction::OverlayMaxTimer => self.overlay.set_max_seconds(seconds),
                    _ => unreachable!(),
                }
            }
        }
    }

    /// Route one raw MIDI frame through the router and apply the result
    pub async fn handle_midi_frame(&mut self, frame: MidiFrame) {
        let event = match self.midi.as_mut() {
            Some(router) => router.handle_message(&frame, Instant::now()),
            None => None,
        };

        match event {
            Some(RoutedEvent::Command(command)) => self.apply_command(command).await,
            Some(RoutedEvent::Cc { action, value }) => self.apply_cc(action, value),
            None => {}
        }
    }

    /// Location of the statistics snapshot file
    pub fn stats_path(&self) -> PathBuf {
        self.config
            .statistics
            .file
            .clone()
            .unwrap_or_else(StatsSnapshot::default_path)
    }

    /// Persist cumulative statistics, if enabled
    pub async fn save_stats(&self) -> Result<()> {
        if !self.config.statistics.enabled {
            return Ok(());
        }
        self.stats_snapshot().save_to_file(self.stats_path()).await
    }

    /// Current cumulative statistics
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        let perf = self.queue.snapshot();
        StatsSnapshot {
            total_runtime_secs: self.system.state.total_runtime_secs,
            session_count: self.system.state.session_count,
            camera_trigger_count: self.camera.state.trigger_count,
            overlay_trigger_count: self.overlay.state.trigger_count,
            http_errors: perf.http_errors,
            http_successes: perf.http_successes,
            last_saved: Utc::now(),
        }
    }

    /// Seed cumulative totals from a persisted snapshot
    pub fn seed_from_snapshot(&mut self, snapshot: &StatsSnapshot) {
        self.system.state.total_runtime_secs = snapshot.total_runtime_secs;
        self.system.state.session_count = snapshot.session_count;
        self.camera.state.trigger_count = snapshot.camera_trigger_count;
        self.overlay.state.trigger_count = snapshot.overlay_trigger_count;
        self.queue.seed_counters(snapshot.http_successes, snapshot.http_errors);
        info!(
            "Loaded statistics: {} sessions, {} total runtime",
            snapshot.session_count,
            format_duration(snapshot.total_runtime_secs)
        );
    }

    /// Plain status snapshot for host adapters (UI variables, logging)
    pub fn status(&self) -> StatusSnapshot {
        let perf = self.queue.snapshot();
        StatusSnapshot {
            system_status: if self.system.state.is_paused {
                "Paused"
            } else if self.system.state.is_running {
                "Started"
            } else {
                "Stopped"
            },
            system_duration: format_duration(self.system.state.active_duration_secs),
            system_total_runtime: format_duration(self.system.state.total_runtime_secs),
            session_count: self.system.state.session_count,
            camera: switcher_status(&self.camera),
            overlay: switcher_status(&self.overlay),
            http_success_rate_percent: perf.success_rate_percent(),
            http_errors: perf.http_errors,
            queue_len: perf.queue_len,
            midi_status: match &self.midi {
                Some(router) if router.state.is_connected => "Connected",
                Some(_) => "Disconnected",
                None => "Not Available",
            },
            midi_port: self
                .midi
                .as_ref()
                .and_then(|r| r.state.connected_port_name.clone())
                .unwrap_or_else(|| "None".to_string()),
        }
    }
}

/// Point-in-time view of the whole system
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub system_status: &'static str,
    pub system_duration: String,
    pub system_total_runtime: String,
    pub session_count: u64,
    pub camera: SwitcherStatus,
    pub overlay: SwitcherStatus,
    pub http_success_rate_percent: u64,
    pub http_errors: u64,
    pub queue_len: usize,
    pub midi_status: &'static str,
    pub midi_port: String,
}

/// Point-in-time view of one switcher
#[derive(Debug, Clone)]
pub struct SwitcherStatus {
    pub status: &'static str,
    pub countdown: u32,
    pub next_target: String,
    pub previous_target: String,
    pub trigger_count: u64,
    pub average_interval_secs: u64,
    pub mode: &'static str,
}

fn switcher_status(scheduler: &SwitchScheduler) -> SwitcherStatus {
    let state = &scheduler.state;
    SwitcherStatus {
        status: if state.is_running { "Running" } else { "Stopped" },
        countdown: if state.is_running { state.countdown } else { 0 },
        next_target: state
            .next_index
            .and_then(|i| state.targets.get(i).cloned())
            .unwrap_or_else(|| "None".to_string()),
        previous_target: state
            .previous_target
            .clone()
            .unwrap_or_else(|| "None".to_string()),
        trigger_count: state.trigger_count,
        average_interval_secs: state.average_interval_secs.round() as u64,
        mode: if state.sequential_mode { "Sequential" } else { "Random" },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MidiConfig;
    use crate::midi::NullMidiEngine;
    use tokio::sync::mpsc;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.camera.min_seconds = 5;
        config.camera.max_seconds = 5;
        config.camera.targets = vec!["1/1/1".to_string(), "1/1/2".to_string()];
        config.overlay.min_seconds = 10;
        config.overlay.max_seconds = 10;
        config.overlay.targets = vec!["2/2/1".to_string()];
        // Tests must not write snapshot files
        config.statistics.enabled = false;
        config
    }

    fn app() -> ShowSwitcher {
        ShowSwitcher::new(test_config(), None, None)
    }

    fn app_with_midi() -> ShowSwitcher {
        let (tx, _rx) = mpsc::channel(8);
        let midi_config = MidiConfig {
            enabled: true,
            ..Default::default()
        };
        let router = MidiInputRouter::new(Box::new(NullMidiEngine), &midi_config, tx);
        ShowSwitcher::new(test_config(), None, Some(router))
    }

    #[test]
    fn test_start_system_starts_both_switchers() {
        let mut app = app();
        app.start_system();
        assert!(app.system.state.is_running);
        assert!(app.camera.state.is_running);
        assert!(app.overlay.state.is_running);
        assert_eq!(app.system.state.session_count, 1);
    }

    #[test]
    fn test_pause_freezes_countdowns() {
        let mut app = app();
        app.start_system();
        app.on_tick();
        assert_eq!(app.camera.state.countdown, 4);

        app.pause_system();
        for _ in 0..10 {
            app.on_tick();
        }
        assert_eq!(app.camera.state.countdown, 4);
        assert_eq!(app.overlay.state.countdown, 9);

        app.resume_system();
        app.on_tick();
        assert_eq!(app.camera.state.countdown, 3);
        assert_eq!(app.overlay.state.countdown, 8);
    }

    #[test]
    fn test_switcher_runs_without_system_session() {
        // The camera rotation can be driven standalone via camera_on
        let mut app = app();
        app.camera.start();
        app.on_tick();
        assert_eq!(app.camera.state.countdown, 4);
        assert!(!app.system.state.is_running);
    }

    #[test]
    fn test_cc_timer_maps_into_configured_range() {
        let mut app = app();
        app.camera.state.min_seconds = 15;
        app.camera.state.max_seconds = 30;
        app.camera.start();

        app.apply_cc(CcAction::CameraTimer, 127);
        assert_eq!(app.camera.state.countdown, 30);

        app.apply_cc(CcAction::CameraTimer, 0);
        assert_eq!(app.camera.state.countdown, 15);
    }

    #[test]
    fn test_cc_timer_ignored_while_stopped() {
        let mut app = app();
        app.apply_cc(CcAction::CameraTimer, 127);
        assert_eq!(app.camera.state.countdown, 0);
    }

    #[test]
    fn test_cc_bound_adjustments_use_fixed_ranges() {
        let mut app = app();
        app.apply_cc(CcAction::CameraMinTimer, 0);
        assert_eq!(app.camera.state.min_seconds, 1);

        app.apply_cc(CcAction::CameraMaxTimer, 127);
        assert_eq!(app.camera.state.max_seconds, 120);

        app.apply_cc(CcAction::OverlayMinTimer, 127);
        assert_eq!(app.overlay.state.min_seconds, 600);

        app.apply_cc(CcAction::OverlayMaxTimer, 0);
        assert_eq!(app.overlay.state.max_seconds, 120);
    }

    #[tokio::test]
    async fn test_camera_toggle_round_trip() {
        let mut app = app();
        app.apply_command(Command::CameraToggle).await;
        assert!(app.camera.state.is_running);
        app.apply_command(Command::CameraToggle).await;
        assert!(!app.camera.state.is_running);
    }

    #[tokio::test]
    async fn test_mode_toggle_command() {
        let mut app = app();
        assert!(!app.overlay.state.sequential_mode);
        app.apply_command(Command::OverlayModeToggle).await;
        assert!(app.overlay.state.sequential_mode);
    }

    #[tokio::test]
    async fn test_midi_note_starts_system_once_with_debounce() {
        let mut app = app_with_midi();

        // Two identical note-on frames back to back: the second is debounced
        app.handle_midi_frame([0x90, 36, 100]).await;
        app.handle_midi_frame([0x90, 36, 100]).await;

        assert!(app.system.state.is_running);
        assert_eq!(app.system.state.session_count, 1);
    }

    #[tokio::test]
    async fn test_midi_frames_ignored_without_router() {
        let mut app = app();
        app.handle_midi_frame([0x90, 36, 100]).await;
        assert!(!app.system.state.is_running);
    }

    #[tokio::test]
    async fn test_stop_system_returns_to_default_camera() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/location/1/1/1/press")
            .with_status(200)
            .create_async()
            .await;

        let mut config = test_config();
        let (host, port) = server.host_with_port().rsplit_once(':').map(|(h, p)| (h.to_string(), p.parse().unwrap())).unwrap();
        config.companion.host = host;
        config.companion.port = port;

        let mut app = ShowSwitcher::new(config, None, None);
        app.start_system();
        app.stop_system().await;
        app.queue.drain_one().await;

        mock.assert_async().await;
        assert!(!app.system.state.is_running);
        assert_eq!(app.camera.state.previous_target.as_deref(), Some("1/1/1"));
        assert_eq!(app.camera.state.trigger_count, 1);
        assert_eq!(app.queue.snapshot().http_successes, 1);
    }

    #[tokio::test]
    async fn test_stop_courtesy_press_goes_ahead_of_backlog() {
        let mut app = app();
        app.start_system();
        app.queue.enqueue(ButtonLocation::new(9, 9, 9));

        // stop returns immediately: the courtesy press is queued at the
        // front, not dispatched inline
        app.stop_system().await;

        let queued = app.queue.queued();
        assert_eq!(queued[0], ButtonLocation::new(1, 1, 1));
        assert_eq!(queued[1], ButtonLocation::new(9, 9, 9));
        assert_eq!(app.camera.state.previous_target.as_deref(), Some("1/1/1"));
        assert_eq!(app.camera.state.trigger_count, 1);
    }

    #[tokio::test]
    async fn test_reset_zeroes_counters_and_stats() {
        let mut app = app();
        app.start_system();
        app.camera.manual_trigger();
        assert!(app.camera.state.trigger_count > 0);

        app.reset_system().await;

        assert_eq!(app.camera.state.trigger_count, 0);
        assert_eq!(app.overlay.state.trigger_count, 0);
        assert_eq!(app.system.state.active_duration_secs, 0);
        let perf = app.queue.snapshot();
        assert_eq!(perf.http_errors, 0);
        assert_eq!(perf.http_successes, 0);
    }

    #[test]
    fn test_status_snapshot_reflects_state() {
        let mut app = app();
        let status = app.status();
        assert_eq!(status.system_status, "Stopped");
        assert_eq!(status.camera.status, "Stopped");
        assert_eq!(status.camera.next_target, "None");
        assert_eq!(status.midi_status, "Not Available");

        app.start_system();
        let status = app.status();
        assert_eq!(status.system_status, "Started");
        assert_eq!(status.camera.status, "Running");
        assert_ne!(status.camera.next_target, "None");
        assert_eq!(status.system_duration, "00:00:00");
    }

    #[test]
    fn test_seed_from_snapshot_restores_totals() {
        let mut app = app();
        let snapshot = StatsSnapshot {
            total_runtime_secs: 7200,
            session_count: 12,
            camera_trigger_count: 300,
            overlay_trigger_count: 40,
            http_errors: 3,
            http_successes: 340,
            last_saved: Utc::now(),
        };
        app.seed_from_snapshot(&snapshot);

        assert_eq!(app.system.state.total_runtime_secs, 7200);
        assert_eq!(app.system.state.session_count, 12);
        assert_eq!(app.camera.state.trigger_count, 300);
        assert_eq!(app.queue.snapshot().http_successes, 340);
        assert_eq!(app.status().system_total_runtime, "02:00:00");
    }
}
