//! Optional in-process press capability
//!
//! Some hosts can press a button without going over HTTP. The capability is
//! injected at construction; when absent or failing, the queue falls back to
//! the Companion HTTP API.

use anyhow::Result;
use async_trait::async_trait;

use crate::target::ButtonLocation;

/// Synchronous in-process press path, tried before HTTP
#[async_trait]
pub trait LocalFastPath: Send + Sync {
    /// Press the button; Ok counts as a successful dispatch
    async fn press(&self, location: ButtonLocation) -> Result<()>;
}
