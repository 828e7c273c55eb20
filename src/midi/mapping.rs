//! Default note and CC assignments
//!
//! Notes 36-51 carry the discrete commands, CC 1-6 the continuous timer
//! adjustments. The maps are plain data so a host can swap in its own.

use std::collections::HashMap;

use crate::commands::{CcAction, Command};

/// Note number -> command, notes 36-51
pub fn default_note_map() -> HashMap<u8, Command> {
    HashMap::from([
        (36, Command::SystemOn),
        (37, Command::SystemOff),
        (38, Command::SystemReset),
        (39, Command::CameraOn),
        (40, Command::CameraOff),
        (41, Command::CameraManual),
        (42, Command::OverlayOn),
        (43, Command::OverlayOff),
        (44, Command::OverlayManual),
        (45, Command::SystemToggle),
        (46, Command::CameraToggle),
        (47, Command::OverlayToggle),
        (48, Command::SystemPause),
        (49, Command::SystemResume),
        (50, Command::CameraModeToggle),
        (51, Command::OverlayModeToggle),
    ])
}

/// Controller number -> continuous action, CC 1-6
pub fn default_cc_map() -> HashMap<u8, CcAction> {
    HashMap::from([
        (1, CcAction::CameraTimer),
        (2, CcAction::OverlayTimer),
        (3, CcAction::CameraMinTimer),
        (4, CcAction::CameraMaxTimer),
        (5, CcAction::OverlayMinTimer),
        (6, CcAction::OverlayMaxTimer),
    ])
}

/// Map a 7-bit CC value onto an inclusive seconds range
pub fn map_to_range(value: u8, min: u32, max: u32) -> u32 {
    let span = max.saturating_sub(min) as f64;
    min + ((value.min(127) as f64 / 127.0) * span).round() as u32
}

/// Fixed adjustment ranges for the min/max-bound CCs
pub fn bound_adjust_range(action: CcAction) -> Option<(u32, u32)> {
    match action {
        CcAction::CameraMinTimer => Some((1, 30)),
        CcAction::CameraMaxTimer => Some((2, 120)),
        CcAction::OverlayMinTimer => Some((60, 600)),
        CcAction::OverlayMaxTimer => Some((120, 1200)),
        CcAction::CameraTimer | CcAction::OverlayTimer => None,
    }
}
