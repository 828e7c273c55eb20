//! ShowSwitcher - automated switch scheduling and trigger dispatch
//!
//! Drives randomized or sequential rotations of Companion button presses on
//! independent camera and overlay timers, with MIDI note/CC input routing,
//! a serialized HTTP dispatch queue, and persisted usage statistics.

pub mod app;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod midi;
pub mod persistence;
pub mod switcher;
pub mod system;
pub mod target;
pub mod time;

pub use app::ShowSwitcher;
pub use commands::{CcAction, Command};
pub use config::AppConfig;
pub use dispatch::{DispatchQueue, LocalFastPath};
pub use midi::{MidiInputRouter, MidirEngine, NullMidiEngine};
pub use target::ButtonLocation;
