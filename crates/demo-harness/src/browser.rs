//! Chromium driver over the Chrome DevTools Protocol.
//!
//! [`BrowserConfig`] is always available so callers can build and validate
//! launch options. The driver itself requires the `browser` feature.

use std::fmt::Display;

use crate::locator::Selector;
use crate::result::HarnessError;

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            user_agent: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Map a failed script evaluation to a harness error
///
/// A script that threw while querying `selector` (usually a selector the
/// page's `querySelector` rejects) is a field-level read failure. Every
/// other failure means the session itself is broken.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn eval_error(
    op: &str,
    selector: Option<&Selector>,
    script_threw: bool,
    message: impl Display,
) -> HarnessError {
    match selector {
        Some(selector) if script_threw => HarnessError::ElementRead {
            selector: selector.to_string(),
            message: message.to_string(),
        },
        _ => HarnessError::driver(op, message),
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;

#[cfg(feature = "browser")]
mod cdp {
    use super::{eval_error, BrowserConfig};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::network::{
        EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
        EventRequestWillBeSent,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::{
        EnableParams as RuntimeEnableParams, EvaluateParams, EventConsoleApiCalled,
    };
    use chromiumoxide::error::CdpError;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;
    use tokio::task::JoinHandle;

    use crate::clock::{Clock, SystemClock};
    use crate::driver::{ConsoleBuffer, ConsoleLevel, ConsoleMessage, DemoDriver, Screenshot};
    use crate::locator::Selector;
    use crate::result::{HarnessError, HarnessResult};
    use crate::url::UrlPattern;
    use crate::wait::{poll_until, NetworkIdleTracker, WaitOptions, DEFAULT_POLL_INTERVAL_MS};

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn millis(d: Duration) -> u64 {
        d.as_millis() as u64
    }

    /// Real browser session
    #[derive(Debug)]
    pub struct ChromiumDriver {
        browser: Arc<AsyncMutex<CdpBrowser>>,
        page: CdpPage,
        clock: SystemClock,
        network: Arc<Mutex<NetworkIdleTracker>>,
        console: Arc<Mutex<ConsoleBuffer>>,
        tasks: Vec<JoinHandle<()>>,
    }

    impl ChromiumDriver {
        /// Launch chromium, open a blank page and start listening to it
        pub async fn launch(config: &BrowserConfig) -> HarnessResult<Self> {
            let mut builder =
                CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
            if !config.headless {
                builder = builder.with_head();
            }
            if !config.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }
            if let Some(ref ua) = config.user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }
            let cdp_config = builder
                .build()
                .map_err(|e| HarnessError::driver("launch", e))?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| HarnessError::driver("launch", e))?;

            let mut tasks = vec![tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            })];

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| HarnessError::driver("new_page", e))?;

            let clock = SystemClock::new();
            let network = Arc::new(Mutex::new(NetworkIdleTracker::new()));
            let console = Arc::new(Mutex::new(ConsoleBuffer::default()));
            tasks.extend(Self::listen(&page, clock, &network, &console).await?);
            tracing::info!(headless = config.headless, "chromium launched");

            Ok(Self {
                browser: Arc::new(AsyncMutex::new(browser)),
                page,
                clock,
                network,
                console,
                tasks,
            })
        }

        async fn listen(
            page: &CdpPage,
            clock: SystemClock,
            network: &Arc<Mutex<NetworkIdleTracker>>,
            console: &Arc<Mutex<ConsoleBuffer>>,
        ) -> HarnessResult<Vec<JoinHandle<()>>> {
            let listen_err = |e: CdpError| HarnessError::driver("listen", e);
            page.execute(NetworkEnableParams::default())
                .await
                .map_err(listen_err)?;
            page.execute(RuntimeEnableParams::default())
                .await
                .map_err(listen_err)?;

            let mut sent = page
                .event_listener::<EventRequestWillBeSent>()
                .await
                .map_err(listen_err)?;
            let mut finished = page
                .event_listener::<EventLoadingFinished>()
                .await
                .map_err(listen_err)?;
            let mut failed = page
                .event_listener::<EventLoadingFailed>()
                .await
                .map_err(listen_err)?;
            let mut console_events = page
                .event_listener::<EventConsoleApiCalled>()
                .await
                .map_err(listen_err)?;

            let tracker = Arc::clone(network);
            let on_sent = tokio::spawn(async move {
                while let Some(event) = sent.next().await {
                    lock(&tracker).request_started(event.request_id.inner().clone(), clock.now());
                }
            });
            let tracker = Arc::clone(network);
            let on_finished = tokio::spawn(async move {
                while let Some(event) = finished.next().await {
                    lock(&tracker).request_finished(event.request_id.inner(), clock.now());
                }
            });
            let tracker = Arc::clone(network);
            let on_failed = tokio::spawn(async move {
                while let Some(event) = failed.next().await {
                    lock(&tracker).request_finished(event.request_id.inner(), clock.now());
                }
            });
            let buffer = Arc::clone(console);
            let on_console = tokio::spawn(async move {
                while let Some(event) = console_events.next().await {
                    let text = event
                        .args
                        .iter()
                        .map(|arg| match &arg.value {
                            Some(serde_json::Value::String(s)) => s.clone(),
                            Some(other) => other.to_string(),
                            None => arg.description.clone().unwrap_or_default(),
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    let level = ConsoleLevel::from_cdp(&format!("{:?}", event.r#type));
                    lock(&buffer).push(ConsoleMessage::new(level, text, millis(clock.now())));
                }
            });

            Ok(vec![on_sent, on_finished, on_failed, on_console])
        }

        async fn eval(
            &self,
            op: &str,
            selector: Option<&Selector>,
            expression: String,
        ) -> HarnessResult<serde_json::Value> {
            let params = EvaluateParams::builder()
                .expression(expression)
                .return_by_value(true)
                .build()
                .map_err(|e| HarnessError::driver(op, e))?;
            let result = self
                .page
                .evaluate_expression(params)
                .await
                .map_err(|e| {
                    let threw = matches!(e, CdpError::JavascriptException(_));
                    eval_error(op, selector, threw, e)
                })?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        }

        async fn read_string(
            &self,
            op: &str,
            selector: &Selector,
            getter: &str,
        ) -> HarnessResult<String> {
            let expr = format!(
                "(() => {{ const el = {}; if (!el) return null; return {getter}; }})()",
                selector.to_nth_query(0)
            );
            match self.eval(op, Some(selector), expr).await? {
                serde_json::Value::Null => Err(HarnessError::ElementNotFound {
                    selector: selector.to_string(),
                }),
                serde_json::Value::String(s) => Ok(s),
                other => Err(HarnessError::ElementRead {
                    selector: selector.to_string(),
                    message: format!("unexpected value {other}"),
                }),
            }
        }
    }

    #[async_trait]
    impl DemoDriver for ChromiumDriver {
        async fn goto_and_wait_idle(&mut self, url: &str, timeout: Duration) -> HarnessResult<()> {
            let started = self.clock.now();
            lock(&self.network).reset(started);
            match tokio::time::timeout(timeout, self.page.goto(url)).await {
                Err(_) => {
                    return Err(HarnessError::Timeout {
                        ms: millis(timeout),
                    })
                }
                Ok(Err(e)) => {
                    return Err(HarnessError::Navigation {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                }
                Ok(Ok(_)) => {}
            }

            let remaining = timeout.saturating_sub(self.clock.now().saturating_sub(started));
            let options = WaitOptions::new()
                .with_timeout(millis(remaining))
                .with_poll_interval(DEFAULT_POLL_INTERVAL_MS);
            let network = Arc::clone(&self.network);
            let clock = self.clock;
            let waited = poll_until(&self.clock, &options, || {
                let idle = lock(&network).is_idle(clock.now());
                async move { Ok(idle) }
            })
            .await
            .map_err(|_| HarnessError::Timeout {
                ms: millis(timeout),
            })?;
            tracing::debug!(
                url,
                idle_after_ms = millis(self.clock.now().saturating_sub(started)),
                polls = waited.polls,
                "network idle"
            );
            Ok(())
        }

        async fn count(&self, selector: &Selector) -> HarnessResult<usize> {
            let expr = format!("{}.length", selector.to_all_query());
            let value = self.eval("count", Some(selector), expr).await?;
            Ok(value.as_u64().unwrap_or(0) as usize)
        }

        async fn click_nth(&mut self, selector: &Selector, index: usize) -> HarnessResult<()> {
            let expr = format!(
                "(() => {{ const el = {}; if (!el) return false; el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
                selector.to_nth_query(index)
            );
            if self.eval("click", None, expr).await?.as_bool() == Some(true) {
                Ok(())
            } else {
                Err(HarnessError::ElementNotFound {
                    selector: selector.to_string(),
                })
            }
        }

        async fn input_value(&self, selector: &Selector) -> HarnessResult<String> {
            self.read_string(
                "input_value",
                selector,
                "('value' in el) ? String(el.value ?? '') : (el.textContent || '')",
            )
            .await
        }

        async fn text_content(&self, selector: &Selector) -> HarnessResult<String> {
            self.read_string("text_content", selector, "el.textContent || ''")
                .await
        }

        async fn is_visible(&self, selector: &Selector) -> HarnessResult<bool> {
            let expr = format!(
                "(() => {{ const el = {}; if (!el) return false; const r = el.getBoundingClientRect(); const s = getComputedStyle(el); return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }})()",
                selector.to_nth_query(0)
            );
            let visible = self.eval("is_visible", Some(selector), expr).await?;
            Ok(visible.as_bool().unwrap_or(false))
        }

        async fn current_url(&self) -> HarnessResult<String> {
            let url = self
                .page
                .url()
                .await
                .map_err(|e| HarnessError::driver("url", e))?;
            Ok(url.unwrap_or_else(|| "about:blank".to_string()))
        }

        async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> HarnessResult<()> {
            let options = WaitOptions::new()
                .with_timeout(millis(timeout))
                .with_poll_interval(DEFAULT_POLL_INTERVAL_MS);
            poll_until(&self.clock, &options, || {
                let page = self.page.clone();
                async move {
                    let url = page
                        .url()
                        .await
                        .map_err(|e| HarnessError::driver("url", e))?;
                    Ok(url.is_some_and(|u| pattern.matches(&u)))
                }
            })
            .await
            .map(|_| ())
        }

        async fn wait_for_timeout(&self, duration: Duration) {
            self.clock.sleep(duration).await;
        }

        async fn screenshot(&self) -> HarnessResult<Screenshot> {
            use base64::Engine;

            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let shot = self
                .page
                .execute(params)
                .await
                .map_err(|e| HarnessError::driver("screenshot", e))?;
            let data = base64::engine::general_purpose::STANDARD
                .decode(&shot.data)
                .map_err(|e| HarnessError::driver("screenshot", e))?;
            Ok(Screenshot::new(data, millis(self.clock.now())))
        }

        async fn console_messages(&self) -> Vec<ConsoleMessage> {
            lock(&self.console).snapshot()
        }

        async fn close(&mut self) -> HarnessResult<()> {
            for task in self.tasks.drain(..) {
                task.abort();
            }
            {
                let console = lock(&self.console);
                tracing::debug!(
                    retained = console.len(),
                    errors = console.count_level(ConsoleLevel::Error),
                    dropped = console.dropped(),
                    "console summary"
                );
            }
            self.browser
                .lock()
                .await
                .close()
                .await
                .map_err(|e| HarnessError::driver("close", e))?;
            tracing::debug!("chromium closed");
            Ok(())
        }
    }
}
