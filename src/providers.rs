//! Shared provider traits for dependency injection.
//!
//! This module contains common traits used across the codebase to enable
//! testability through dependency injection. By abstracting external
//! dependencies behind traits, modules can be tested in isolation with
//! mock implementations.

use anyhow::Result;

/// Trait for providing timestamps.
///
/// This abstraction enables deterministic testing of time-dependent behavior
/// (cache TTL expiry, history timestamps) by allowing injection of mock time
/// providers.
///
/// # Example
///
/// ```
/// use quomodo::providers::{TimeProvider, SystemTimeProvider};
///
/// // Production code uses SystemTimeProvider
/// let provider = SystemTimeProvider;
/// let timestamp = provider.now();
/// assert!(timestamp > 0);
/// ```
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> u64;
}

/// Default time provider using system time.
///
/// This is the production implementation that returns the actual
/// current Unix timestamp.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Trait for clipboard access.
///
/// Used only during customization: pasting clipboard text into the active
/// parameter and copying a finished command out. Abstracted so the
/// interactive flow can be tested without a real clipboard.
pub trait Clipboard: Send + Sync {
    /// Reads the current clipboard text.
    fn read(&self) -> Result<String>;

    /// Writes text to the clipboard.
    fn write(&self, text: &str) -> Result<()>;
}

/// System clipboard backed by arboard.
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn read(&self) -> Result<String> {
        let mut clipboard = arboard::Clipboard::new()?;
        Ok(clipboard.get_text()?)
    }

    fn write(&self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_text(text.to_string())?;
        Ok(())
    }
}

/// In-memory clipboard for tests.
pub struct StaticClipboard {
    contents: std::sync::Mutex<String>,
}

impl StaticClipboard {
    pub fn new(contents: &str) -> Self {
        Self {
            contents: std::sync::Mutex::new(contents.to_string()),
        }
    }
}

impl Clipboard for StaticClipboard {
    fn read(&self) -> Result<String> {
        Ok(self.contents.lock().unwrap().clone())
    }

    fn write(&self, text: &str) -> Result<()> {
        *self.contents.lock().unwrap() = text.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_provider_returns_nonzero() {
        let provider = SystemTimeProvider;
        assert!(provider.now() > 0);
    }

    #[test]
    fn test_static_clipboard_roundtrip() {
        let clipboard = StaticClipboard::new("initial");
        assert_eq!(clipboard.read().unwrap(), "initial");

        clipboard.write("replaced").unwrap();
        assert_eq!(clipboard.read().unwrap(), "replaced");
    }
}
