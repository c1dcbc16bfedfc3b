//! DemoDriver - the browser capability the engine consumes.
//!
//! The engine never talks to a browser directly. Everything it needs
//! (navigation, element reads, clicks, URL waits, fixed waits, screenshots,
//! console output) goes through this trait, so the verification protocol
//! can run against `ChromiumDriver` in production and against
//! [`crate::ScriptedDriver`] in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use crate::locator::Selector;
use crate::result::HarnessResult;
use crate::url::UrlPattern;

/// Maximum console messages retained per session
pub const CONSOLE_BUFFER_CAPACITY: usize = 2000;

/// Abstract driver trait for browser automation
///
/// Element reads (`input_value`, `text_content`) return
/// [`crate::HarnessError::ElementNotFound`] when nothing matches; any other
/// error is an adapter failure.
#[async_trait]
pub trait DemoDriver: Send + Sync {
    /// Navigate to `url` and wait for network quiescence, bounded by `timeout`
    async fn goto_and_wait_idle(&mut self, url: &str, timeout: Duration) -> HarnessResult<()>;

    /// Count elements matching `selector`
    async fn count(&self, selector: &Selector) -> HarnessResult<usize>;

    /// Click the `index`-th element matching `selector`
    async fn click_nth(&mut self, selector: &Selector, index: usize) -> HarnessResult<()>;

    /// Read the `value` of the first input matching `selector`
    async fn input_value(&self, selector: &Selector) -> HarnessResult<String>;

    /// Read the text content of the first element matching `selector`
    async fn text_content(&self, selector: &Selector) -> HarnessResult<String>;

    /// Whether the first element matching `selector` is visible
    async fn is_visible(&self, selector: &Selector) -> HarnessResult<bool>;

    /// Current page URL
    async fn current_url(&self) -> HarnessResult<String>;

    /// Wait until the page URL matches `pattern`
    ///
    /// Returns [`crate::HarnessError::Timeout`] when `timeout` elapses first.
    async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> HarnessResult<()>;

    /// Wait a fixed duration
    async fn wait_for_timeout(&self, duration: Duration);

    /// Capture a PNG screenshot of the viewport
    async fn screenshot(&self) -> HarnessResult<Screenshot>;

    /// Console messages observed since the session started
    async fn console_messages(&self) -> Vec<ConsoleMessage>;

    /// Close the browser session
    async fn close(&mut self) -> HarnessResult<()>;
}

/// Screenshot data with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Capture time in milliseconds since session start
    pub taken_at_ms: u64,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>, taken_at_ms: u64) -> Self {
        Self { data, taken_at_ms }
    }

    /// Get the size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if the screenshot carries any data
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Console message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// console.debug
    Debug,
    /// console.log / console.info
    #[default]
    Log,
    /// console.warn
    Warning,
    /// console.error and uncaught exceptions
    Error,
}

impl ConsoleLevel {
    /// Map a CDP console type name to a level
    #[must_use]
    pub fn from_cdp(kind: &str) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "debug" | "verbose" | "trace" => Self::Debug,
            "warning" | "warn" => Self::Warning,
            "error" | "assert" => Self::Error,
            _ => Self::Log,
        }
    }
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Log => "log",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One message written to the page console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Severity
    pub level: ConsoleLevel,
    /// Message text
    pub text: String,
    /// Time in milliseconds since session start
    pub at_ms: u64,
}

impl ConsoleMessage {
    /// Create a console message
    #[must_use]
    pub fn new(level: ConsoleLevel, text: impl Into<String>, at_ms: u64) -> Self {
        Self {
            level,
            text: text.into(),
            at_ms,
        }
    }
}

/// Bounded console history; the oldest message is dropped when full
#[derive(Debug, Clone)]
pub struct ConsoleBuffer {
    messages: VecDeque<ConsoleMessage>,
    capacity: usize,
    dropped: usize,
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self::with_capacity(CONSOLE_BUFFER_CAPACITY)
    }
}

impl ConsoleBuffer {
    /// Create a buffer holding at most `capacity` messages
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Append a message
    pub fn push(&mut self, message: ConsoleMessage) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
            self.dropped += 1;
        }
        self.messages.push_back(message);
    }

    /// Snapshot of retained messages, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConsoleMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Number of retained messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages are retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages discarded because the buffer was full
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Count retained messages at `level`
    #[must_use]
    pub fn count_level(&self, level: ConsoleLevel) -> usize {
        self.messages.iter().filter(|m| m.level == level).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod screenshot_tests {
        use super::*;

        #[test]
        fn test_screenshot_size() {
            let shot = Screenshot::new(vec![0x89, 0x50, 0x4E, 0x47], 120);
            assert_eq!(shot.size_bytes(), 4);
            assert!(!shot.is_empty());
            assert_eq!(shot.taken_at_ms, 120);
        }
    }

    mod console_tests {
        use super::*;

        #[test]
        fn test_level_from_cdp() {
            assert_eq!(ConsoleLevel::from_cdp("Error"), ConsoleLevel::Error);
            assert_eq!(ConsoleLevel::from_cdp("warning"), ConsoleLevel::Warning);
            assert_eq!(ConsoleLevel::from_cdp("info"), ConsoleLevel::Log);
            assert_eq!(ConsoleLevel::from_cdp("debug"), ConsoleLevel::Debug);
            assert_eq!(ConsoleLevel::from_cdp("assert"), ConsoleLevel::Error);
        }

        #[test]
        fn test_buffer_drops_oldest() {
            let mut buf = ConsoleBuffer::with_capacity(2);
            buf.push(ConsoleMessage::new(ConsoleLevel::Log, "a", 0));
            buf.push(ConsoleMessage::new(ConsoleLevel::Log, "b", 1));
            buf.push(ConsoleMessage::new(ConsoleLevel::Error, "c", 2));
            let texts: Vec<_> = buf.snapshot().into_iter().map(|m| m.text).collect();
            assert_eq!(texts, vec!["b", "c"]);
            assert_eq!(buf.dropped(), 1);
            assert_eq!(buf.count_level(ConsoleLevel::Error), 1);
        }

        #[test]
        fn test_default_capacity() {
            let mut buf = ConsoleBuffer::default();
            for i in 0..(CONSOLE_BUFFER_CAPACITY + 5) {
                buf.push(ConsoleMessage::new(ConsoleLevel::Log, i.to_string(), i as u64));
            }
            assert_eq!(buf.len(), CONSOLE_BUFFER_CAPACITY);
            assert_eq!(buf.snapshot()[0].text, "5");
        }

        #[test]
        fn test_message_serializes_level_lowercase() {
            let msg = ConsoleMessage::new(ConsoleLevel::Warning, "slow", 10);
            let json = serde_json::to_string(&msg).unwrap();
            assert!(json.contains(r#""level":"warning""#));
        }
    }
}
