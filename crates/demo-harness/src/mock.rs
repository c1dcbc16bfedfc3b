//! Scripted in-process driver for deterministic tests.
//!
//! [`ScriptedDriver`] plays the role of a demo page whose behavior is fixed
//! up front: how long the entry page takes to settle, how many trigger
//! controls exist, where a click navigates, and when each field receives
//! its value. It shares a [`VirtualClock`] with the engine, so every wait
//! completes instantly while timestamps stay meaningful.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::{Clock, VirtualClock};
use crate::driver::{ConsoleLevel, ConsoleMessage, DemoDriver, Screenshot};
use crate::locator::Selector;
use crate::result::{HarnessError, HarnessResult};
use crate::url::UrlPattern;
use crate::wait::{poll_until, WaitOptions};

/// PNG signature used as fake screenshot content
const FAKE_PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Polling interval of the fake URL wait
const URL_POLL_INTERVAL_MS: u64 = 100;

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    /// Virtual time of the call in milliseconds
    pub at_ms: u64,
    /// Trait method name
    pub op: String,
    /// Argument summary (selector, URL, duration)
    pub detail: String,
}

#[derive(Debug, Clone)]
enum EntryBehavior {
    Loads(Duration),
    NeverIdle,
    Fails(String),
}

#[derive(Debug, Clone)]
enum FieldBehavior {
    /// Value appears this long after the click
    Appears { value: String, after: Duration },
    /// Element exists but is never filled
    Empty,
    /// Element exists but reading it fails
    Unreadable(String),
}

#[derive(Debug, Clone)]
struct ElementScript {
    count: usize,
    visible: bool,
    text: Option<String>,
    field: Option<FieldBehavior>,
}

impl Default for ElementScript {
    fn default() -> Self {
        Self {
            count: 1,
            visible: true,
            text: None,
            field: None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    url: String,
    clicked_at: Option<Duration>,
    navigation: Option<(String, Duration)>,
    calls: Vec<DriverCall>,
    closed: bool,
}

/// Deterministic fake demo page
#[derive(Debug)]
pub struct ScriptedDriver {
    clock: VirtualClock,
    entry: EntryBehavior,
    elements: HashMap<Selector, ElementScript>,
    click_navigates_to: Option<(String, Duration)>,
    console: Vec<ConsoleMessage>,
    crash_on: HashSet<String>,
    invalid: HashSet<Selector>,
    screenshots_fail: bool,
    state: Mutex<State>,
}

impl ScriptedDriver {
    /// A page that settles immediately and has no elements
    #[must_use]
    pub fn new(clock: VirtualClock) -> Self {
        Self {
            clock,
            entry: EntryBehavior::Loads(Duration::ZERO),
            elements: HashMap::new(),
            click_navigates_to: None,
            console: Vec::new(),
            crash_on: HashSet::new(),
            invalid: HashSet::new(),
            screenshots_fail: false,
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                ..State::default()
            }),
        }
    }

    /// Entry page reaches quiescence after `load`
    #[must_use]
    pub fn with_entry_load(mut self, load: Duration) -> Self {
        self.entry = EntryBehavior::Loads(load);
        self
    }

    /// Entry page keeps the network busy forever
    #[must_use]
    pub fn never_idle(mut self) -> Self {
        self.entry = EntryBehavior::NeverIdle;
        self
    }

    /// Entry page cannot be reached at all
    #[must_use]
    pub fn failing_navigation(mut self, message: impl Into<String>) -> Self {
        self.entry = EntryBehavior::Fails(message.into());
        self
    }

    /// `count` elements match `selector`
    #[must_use]
    pub fn with_elements(mut self, selector: Selector, count: usize) -> Self {
        self.elements.entry(selector).or_default().count = count;
        self
    }

    /// Element matching `selector` has this text content
    #[must_use]
    pub fn with_text(mut self, selector: Selector, text: impl Into<String>) -> Self {
        self.elements.entry(selector).or_default().text = Some(text.into());
        self
    }

    /// Element matching `selector` is present but hidden
    #[must_use]
    pub fn hidden(mut self, selector: Selector) -> Self {
        self.elements.entry(selector).or_default().visible = false;
        self
    }

    /// Clicking anything navigates to `url` after `delay`
    #[must_use]
    pub fn on_click_navigate(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.click_navigates_to = Some((url.into(), delay));
        self
    }

    /// Input matching `selector` receives `value` once `after` has elapsed since the click
    #[must_use]
    pub fn with_field(
        mut self,
        selector: Selector,
        value: impl Into<String>,
        after: Duration,
    ) -> Self {
        self.elements.entry(selector).or_default().field = Some(FieldBehavior::Appears {
            value: value.into(),
            after,
        });
        self
    }

    /// Input matching `selector` exists but is never filled
    #[must_use]
    pub fn with_empty_field(mut self, selector: Selector) -> Self {
        self.elements.entry(selector).or_default().field = Some(FieldBehavior::Empty);
        self
    }

    /// Input matching `selector` exists but reading it fails
    #[must_use]
    pub fn with_unreadable_field(
        mut self,
        selector: Selector,
        message: impl Into<String>,
    ) -> Self {
        self.elements.entry(selector).or_default().field =
            Some(FieldBehavior::Unreadable(message.into()));
        self
    }

    /// Console message emitted at `at_ms`
    #[must_use]
    pub fn with_console(
        mut self,
        level: ConsoleLevel,
        text: impl Into<String>,
        at_ms: u64,
    ) -> Self {
        self.console.push(ConsoleMessage::new(level, text, at_ms));
        self
    }

    /// The page rejects `selector` as a syntax error whenever it is queried
    #[must_use]
    pub fn with_invalid_selector(mut self, selector: Selector) -> Self {
        self.invalid.insert(selector);
        self
    }

    /// Every call to `op` fails as if the browser crashed
    #[must_use]
    pub fn crash_on(mut self, op: impl Into<String>) -> Self {
        self.crash_on.insert(op.into());
        self
    }

    /// Screenshots fail
    #[must_use]
    pub fn fail_screenshots(mut self) -> Self {
        self.screenshots_fail = true;
        self
    }

    /// Shared clock
    #[must_use]
    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Every call made so far, in order
    #[must_use]
    pub fn call_log(&self) -> Vec<DriverCall> {
        self.state().calls.clone()
    }

    /// Calls to one method
    #[must_use]
    pub fn calls_to(&self, op: &str) -> Vec<DriverCall> {
        self.state().calls.iter().filter(|c| c.op == op).cloned().collect()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, op: &str) -> bool {
        self.state().calls.iter().any(|c| c.op == op)
    }

    /// Virtual time of the trigger click, if any
    #[must_use]
    pub fn clicked_at(&self) -> Option<Duration> {
        self.state().clicked_at
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: &str, detail: impl Into<String>) -> HarnessResult<()> {
        let at_ms = self.clock.now().as_millis() as u64;
        self.state().calls.push(DriverCall {
            at_ms,
            op: op.to_string(),
            detail: detail.into(),
        });
        if self.crash_on.contains(op) {
            return Err(HarnessError::driver(op, "browser process exited"));
        }
        Ok(())
    }

    fn url_now(&self) -> String {
        let mut state = self.state();
        if let Some((target, at)) = state.navigation.clone() {
            if self.clock.now() >= at {
                state.url = target;
                state.navigation = None;
            }
        }
        state.url.clone()
    }

    fn check_syntax(&self, selector: &Selector) -> HarnessResult<()> {
        if self.invalid.contains(selector) {
            return Err(HarnessError::ElementRead {
                selector: selector.to_string(),
                message: format!("SyntaxError: '{selector}' is not a valid selector"),
            });
        }
        Ok(())
    }

    fn element(&self, selector: &Selector) -> HarnessResult<&ElementScript> {
        self.check_syntax(selector)?;
        self.elements
            .get(selector)
            .filter(|e| e.count > 0)
            .ok_or_else(|| HarnessError::ElementNotFound {
                selector: selector.to_string(),
            })
    }
}

#[async_trait]
impl DemoDriver for ScriptedDriver {
    async fn goto_and_wait_idle(&mut self, url: &str, timeout: Duration) -> HarnessResult<()> {
        self.record("goto_and_wait_idle", url)?;
        match self.entry.clone() {
            EntryBehavior::Fails(message) => Err(HarnessError::Navigation {
                url: url.to_string(),
                message,
            }),
            EntryBehavior::NeverIdle => {
                self.clock.sleep(timeout).await;
                self.state().url = url.to_string();
                Err(HarnessError::Timeout {
                    ms: timeout.as_millis() as u64,
                })
            }
            EntryBehavior::Loads(load) if load > timeout => {
                self.clock.sleep(timeout).await;
                Err(HarnessError::Timeout {
                    ms: timeout.as_millis() as u64,
                })
            }
            EntryBehavior::Loads(load) => {
                self.clock.sleep(load).await;
                self.state().url = url.to_string();
                Ok(())
            }
        }
    }

    async fn count(&self, selector: &Selector) -> HarnessResult<usize> {
        self.record("count", selector.to_string())?;
        self.check_syntax(selector)?;
        Ok(self.elements.get(selector).map_or(0, |e| e.count))
    }

    async fn click_nth(&mut self, selector: &Selector, index: usize) -> HarnessResult<()> {
        self.record("click_nth", format!("{selector} #{index}"))?;
        let matched = self.elements.get(selector).map_or(0, |e| e.count);
        if index >= matched {
            return Err(HarnessError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        let now = self.clock.now();
        let mut state = self.state();
        state.clicked_at = Some(now);
        if let Some((url, delay)) = &self.click_navigates_to {
            state.navigation = Some((url.clone(), now + *delay));
        }
        Ok(())
    }

    async fn input_value(&self, selector: &Selector) -> HarnessResult<String> {
        self.record("input_value", selector.to_string())?;
        let element = self.element(selector)?;
        let clicked_at = self.state().clicked_at;
        match &element.field {
            Some(FieldBehavior::Appears { value, after }) => {
                let filled = clicked_at.is_some_and(|at| self.clock.now() >= at + *after);
                Ok(if filled { value.clone() } else { String::new() })
            }
            Some(FieldBehavior::Unreadable(message)) => Err(HarnessError::ElementRead {
                selector: selector.to_string(),
                message: message.clone(),
            }),
            Some(FieldBehavior::Empty) | None => Ok(String::new()),
        }
    }

    async fn text_content(&self, selector: &Selector) -> HarnessResult<String> {
        self.record("text_content", selector.to_string())?;
        Ok(self.element(selector)?.text.clone().unwrap_or_default())
    }

    async fn is_visible(&self, selector: &Selector) -> HarnessResult<bool> {
        self.record("is_visible", selector.to_string())?;
        self.check_syntax(selector)?;
        Ok(self
            .elements
            .get(selector)
            .is_some_and(|e| e.count > 0 && e.visible))
    }

    async fn current_url(&self) -> HarnessResult<String> {
        self.record("current_url", "")?;
        Ok(self.url_now())
    }

    async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> HarnessResult<()> {
        self.record("wait_for_url", pattern.to_string())?;
        let options = WaitOptions::new()
            .with_timeout(timeout.as_millis() as u64)
            .with_poll_interval(URL_POLL_INTERVAL_MS);
        poll_until(&self.clock, &options, || {
            let matched = pattern.matches(&self.url_now());
            async move { Ok(matched) }
        })
        .await
        .map(|_| ())
    }

    async fn wait_for_timeout(&self, duration: Duration) {
        let _ = self.record("wait_for_timeout", format!("{}ms", duration.as_millis()));
        self.clock.sleep(duration).await;
    }

    async fn screenshot(&self) -> HarnessResult<Screenshot> {
        self.record("screenshot", "")?;
        if self.screenshots_fail {
            return Err(HarnessError::driver("screenshot", "capture failed"));
        }
        Ok(Screenshot::new(FAKE_PNG.to_vec(), self.clock.now_ms()))
    }

    async fn console_messages(&self) -> Vec<ConsoleMessage> {
        let now = self.clock.now_ms();
        self.console
            .iter()
            .filter(|m| m.at_ms <= now)
            .cloned()
            .collect()
    }

    async fn close(&mut self) -> HarnessResult<()> {
        self.record("close", "")?;
        self.state().closed = true;
        Ok(())
    }
}
