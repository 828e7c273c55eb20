//! Companion button locations
//!
//! A target is addressed by a `page/bank/button` triple, written as a single
//! string in the configuration (e.g. `"2/1/0"`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors when parsing a `page/bank/button` target specification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetParseError {
    #[error("expected page/bank/button, got '{0}'")]
    BadShape(String),

    #[error("invalid number '{part}' in target '{spec}'")]
    BadNumber { spec: String, part: String },
}

/// A Companion button location (`page/bank/button`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonLocation {
    pub page: u32,
    pub bank: u32,
    pub button: u32,
}

impl ButtonLocation {
    pub fn new(page: u32, bank: u32, button: u32) -> Self {
        Self { page, bank, button }
    }
}

impl FromStr for ButtonLocation {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(TargetParseError::BadShape(s.to_string()));
        }

        let parse = |part: &str| -> Result<u32, TargetParseError> {
            part.parse().map_err(|_| TargetParseError::BadNumber {
                spec: s.to_string(),
                part: part.to_string(),
            })
        };

        Ok(Self {
            page: parse(parts[0])?,
            bank: parse(parts[1])?,
            button: parse(parts[2])?,
        })
    }
}

impl fmt::Display for ButtonLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.page, self.bank, self.button)
    }
}
