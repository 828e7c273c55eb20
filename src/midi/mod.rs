//! MIDI input routing
//!
//! Discovers input ports, owns the single open connection, and turns raw
//! 3-byte frames into operator commands: channel filtering, note/CC lookup,
//! and per-key debouncing all happen here. Hardware callbacks run on an OS
//! thread and cross into the async world through an mpsc channel; the router
//! itself is only ever driven from the main task.

pub mod mapping;
pub mod message;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use midir::MidiInput;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::commands::{CcAction, Command};
use crate::config::MidiConfig;
use message::ChannelMessage;

/// Suppression window for repeated note commands
pub const NOTE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Suppression window for repeated CC adjustments
pub const CC_DEBOUNCE: Duration = Duration::from_millis(50);

/// Client name registered with the MIDI backend
const CLIENT_NAME: &str = "ShowSwitcher";

/// Virtual loopback ports excluded from discovery
const VIRTUAL_THROUGH: &str = "Midi Through";

/// MIDI port and connection failures
///
/// All of these leave the router usable for a later retry.
#[derive(Debug, Error)]
pub enum MidiError {
    #[error("MIDI engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("invalid MIDI port index: {0}")]
    InvalidPortIndex(usize),

    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("failed to open MIDI port '{0}': {1}")]
    OpenFailed(String, String),
}

/// A raw 3-byte frame forwarded from the hardware callback
pub type MidiFrame = [u8; 3];

/// A discovered input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// Capability seam over the platform MIDI backend
///
/// The production implementation wraps midir; `NullMidiEngine` satisfies the
/// trait on platforms without MIDI support.
pub trait MidiEngine: Send {
    /// Names of all available input ports, in backend order
    fn input_ports(&self) -> Result<Vec<String>, MidiError>;

    /// Open the named input port, forwarding 3-byte frames to `tx`
    fn connect_input(
        &self,
        port_name: &str,
        tx: mpsc::Sender<MidiFrame>,
    ) -> Result<Box<dyn MidiConnection>, MidiError>;
}

/// An open input connection; dropping it closes the port
pub trait MidiConnection: Send {}

/// midir-backed engine
pub struct MidirEngine;

impl MidiEngine for MidirEngine {
    fn input_ports(&self) -> Result<Vec<String>, MidiError> {
        let midi_in = MidiInput::new(CLIENT_NAME)
            .map_err(|e| MidiError::EngineUnavailable(e.to_string()))?;

        let mut names = Vec::new();
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn connect_input(
        &self,
        port_name: &str,
        tx: mpsc::Sender<MidiFrame>,
    ) -> Result<Box<dyn MidiConnection>, MidiError> {
        let midi_in = MidiInput::new(CLIENT_NAME)
            .map_err(|e| MidiError::EngineUnavailable(e.to_string()))?;

        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).as_deref() == Ok(port_name))
            .ok_or_else(|| MidiError::PortNotFound(port_name.to_string()))?;

        let conn = midi_in
            .connect(
                &port,
                CLIENT_NAME,
                move |_stamp, data, _| {
                    // Only complete channel messages cross the boundary;
                    // try_send so the hardware callback never blocks.
                    if data.len() == 3 {
                        let _ = tx.try_send([data[0], data[1], data[2]]);
                    }
                },
                (),
            )
            .map_err(|e| MidiError::OpenFailed(port_name.to_string(), e.to_string()))?;

        Ok(Box::new(MidirConnection { _conn: conn }))
    }
}

struct MidirConnection {
    _conn: midir::MidiInputConnection<()>,
}

impl MidiConnection for MidirConnection {}

/// Stub engine for platforms without MIDI support
pub struct NullMidiEngine;

impl MidiEngine for NullMidiEngine {
    fn input_ports(&self) -> Result<Vec<String>, MidiError> {
        Ok(Vec::new())
    }

    fn connect_input(
        &self,
        port_name: &str,
        _tx: mpsc::Sender<MidiFrame>,
    ) -> Result<Box<dyn MidiConnection>, MidiError> {
        let _ = port_name;
        Err(MidiError::EngineUnavailable("no MIDI backend".to_string()))
    }
}

/// Connection status owned by the router
#[derive(Debug, Clone, Default)]
pub struct MidiState {
    pub available_ports: Vec<MidiPortInfo>,
    pub connected_port_name: Option<String>,
    pub is_connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DebounceKey {
    Note(u8),
    Cc(u8),
}

/// An input frame resolved into something the application can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutedEvent {
    Command(Command),
    Cc { action: CcAction, value: u8 },
}

/// Routes raw MIDI input to operator commands
pub struct MidiInputRouter {
    engine: Box<dyn MidiEngine>,
    pub state: MidiState,
    connection: Option<Box<dyn MidiConnection>>,
    note_map: HashMap<u8, Command>,
    cc_map: HashMap<u8, CcAction>,
    /// Only process messages on this channel (1-16); None = all
    channel_filter: Option<u8>,
    last_command_time: HashMap<DebounceKey, Instant>,
    frame_tx: mpsc::Sender<MidiFrame>,
}

impl MidiInputRouter {
    pub fn new(
        engine: Box<dyn MidiEngine>,
        config: &MidiConfig,
        frame_tx: mpsc::Sender<MidiFrame>,
    ) -> Self {
        Self {
            engine,
            state: MidiState::default(),
            connection: None,
            note_map: mapping::default_note_map(),
            cc_map: mapping::default_cc_map(),
            channel_filter: config.channel,
            last_command_time: HashMap::new(),
            frame_tx,
        }
    }

    /// Re-enumerate input ports, skipping virtual through ports
    pub fn refresh_ports(&mut self) -> Result<(), MidiError> {
        let names = self.engine.input_ports()?;

        self.state.available_ports = names
            .into_iter()
            .filter(|name| !name.contains(VIRTUAL_THROUGH))
            .enumerate()
            .map(|(index, name)| MidiPortInfo { index, name })
            .collect();

        for port in &self.state.available_ports {
            info!("Found MIDI port {}: {}", port.index, port.name);
        }
        info!(
            "Total MIDI input ports found: {}",
            self.state.available_ports.len()
        );
        Ok(())
    }

    /// Open a port by discovery index, closing any existing connection first
    pub fn open_port(&mut self, index: usize) -> Result<(), MidiError> {
        self.disconnect();

        let port = self
            .state
            .available_ports
            .get(index)
            .cloned()
            .ok_or(MidiError::InvalidPortIndex(index))?;

        match self.engine.connect_input(&port.name, self.frame_tx.clone()) {
            Ok(conn) => {
                self.connection = Some(conn);
                self.state.connected_port_name = Some(port.name.clone());
                self.state.is_connected = true;
                info!("Connected to MIDI port {}: {}", index, port.name);
                Ok(())
            }
            Err(e) => {
                self.state.is_connected = false;
                self.state.connected_port_name = None;
                Err(e)
            }
        }
    }

    /// Connect per configuration: name filter first, then explicit index,
    /// then the first available port when auto-connect is on
    pub fn auto_connect(&mut self, config: &MidiConfig) -> Result<(), MidiError> {
        if let Some(filter) = config.port_name.as_deref().filter(|s| !s.is_empty()) {
            let found = self
                .state
                .available_ports
                .iter()
                .find(|p| p.name.to_lowercase().contains(&filter.to_lowercase()))
                .map(|p| p.index);

            return match found {
                Some(index) => self.open_port(index),
                None => {
                    warn!("MIDI port matching '{}' not found", filter);
                    Err(MidiError::PortNotFound(filter.to_string()))
                }
            };
        }

        if let Some(index) = config.port_index {
            if index < self.state.available_ports.len() {
                return self.open_port(index);
            }
            return Err(MidiError::InvalidPortIndex(index));
        }

        if config.auto_connect && !self.state.available_ports.is_empty() {
            return self.open_port(0);
        }

        Ok(())
    }

    /// Close the open connection, if any
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            info!(
                "Disconnected from MIDI port {}",
                self.state.connected_port_name.as_deref().unwrap_or("?")
            );
        }
        self.state.is_connected = false;
        self.state.connected_port_name = None;
    }

    /// Tear down the connection and forget discovered ports
    pub fn destroy(&mut self) {
        self.disconnect();
        self.state.available_ports.clear();
    }

    /// Classify, filter, and debounce one raw frame
    ///
    /// Malformed or unmapped messages yield `None`; that is not an error.
    pub fn handle_message(&mut self, frame: &MidiFrame, now: Instant) -> Option<RoutedEvent> {
        let msg = ChannelMessage::parse(frame);

        if let (Some(filter), Some(channel)) = (self.channel_filter, msg.channel()) {
            if channel != filter {
                return None;
            }
        }

        match msg {
            ChannelMessage::NoteOn { note, velocity, channel } => {
                let command = *self.note_map.get(&note)?;
                if self.debounced(DebounceKey::Note(note), NOTE_DEBOUNCE, now) {
                    return None;
                }
                info!(
                    "MIDI note {} (velocity {}) on channel {} -> {}",
                    note, velocity, channel, command
                );
                Some(RoutedEvent::Command(command))
            }
            ChannelMessage::NoteOff { note, channel, .. } => {
                debug!("MIDI note off {} on channel {}", note, channel);
                None
            }
            ChannelMessage::ControlChange { controller, value, channel } => {
                let action = *self.cc_map.get(&controller)?;
                if self.debounced(DebounceKey::Cc(controller), CC_DEBOUNCE, now) {
                    return None;
                }
                info!(
                    "MIDI CC {} value {} on channel {} -> {}",
                    controller, value, channel, action
                );
                Some(RoutedEvent::Cc { action, value })
            }
            ChannelMessage::Unknown => None,
        }
    }

    /// True when the key fired within its window; records the accepted time
    fn debounced(&mut self, key: DebounceKey, window: Duration, now: Instant) -> bool {
        if let Some(last) = self.last_command_time.get(&key) {
            if now.duration_since(*last) < window {
                return true;
            }
        }
        self.last_command_time.insert(key, now);
        false
    }
}
