//! Operator commands
//!
//! Every way of driving the switcher (MIDI notes, a host UI, scripting) maps
//! onto this one enum; application of a command happens in
//! [`crate::app::ShowSwitcher::apply_command`].

use std::fmt;

/// A discrete operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SystemOn,
    SystemOff,
    SystemReset,
    SystemToggle,
    SystemPause,
    SystemResume,
    CameraOn,
    CameraOff,
    CameraManual,
    CameraToggle,
    CameraModeToggle,
    OverlayOn,
    OverlayOff,
    OverlayManual,
    OverlayToggle,
    OverlayModeToggle,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::SystemOn => "system_on",
            Command::SystemOff => "system_off",
            Command::SystemReset => "system_reset",
            Command::SystemToggle => "system_toggle",
            Command::SystemPause => "system_pause",
            Command::SystemResume => "system_resume",
            Command::CameraOn => "camera_on",
            Command::CameraOff => "camera_off",
            Command::CameraManual => "camera_manual",
            Command::CameraToggle => "camera_toggle",
            Command::CameraModeToggle => "camera_mode_toggle",
            Command::OverlayOn => "overlay_on",
            Command::OverlayOff => "overlay_off",
            Command::OverlayManual => "overlay_manual",
            Command::OverlayToggle => "overlay_toggle",
            Command::OverlayModeToggle => "overlay_mode_toggle",
        };
        write!(f, "{}", name)
    }
}

/// A continuous (CC-driven) adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CcAction {
    /// Override the camera countdown, mapped into its min/max range
    CameraTimer,
    /// Override the overlay countdown, mapped into its min/max range
    OverlayTimer,
    CameraMinTimer,
    CameraMaxTimer,
    OverlayMinTimer,
    OverlayMaxTimer,
}

impl fmt::Display for CcAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CcAction::CameraTimer => "camera_timer",
            CcAction::OverlayTimer => "overlay_timer",
            CcAction::CameraMinTimer => "camera_min_timer",
            CcAction::CameraMaxTimer => "camera_max_timer",
            CcAction::OverlayMinTimer => "overlay_min_timer",
            CcAction::OverlayMaxTimer => "overlay_max_timer",
        };
        write!(f, "{}", name)
    }
}
