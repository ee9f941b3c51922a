//! Bot-verification challenge handling.
//!
//! Review pages sit behind a checkbox-style verification widget rendered
//! inside an embedded frame. Resolving it is a small state machine:
//!
//! ```text
//! AwaitingFrame ──frame attach──▶ PollingForControl ──found──▶ Activating ──▶ Resolved
//!       │                               │
//!       └──frame-wait timeout──▶ TimedOut ◀──60 s poll budget──┘
//! ```
//!
//! The frame relationship is a capability, not an ownership relation: the
//! handler only needs "query a selector within this scope" and "activate the
//! control", expressed by [`DomScope`] / [`FrameHost`]. The live browser
//! implements them at the bottom of this module; tests script them directly.
//! All waiting goes through the tokio time driver, so the 2-second poll
//! interval, the 60-second budget, and the 10-second settle delay are
//! exercised under a paused clock without real-time waits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Selector for the element hosting the verification frame.
pub const FRAME_SELECTOR: &str = "iframe";
/// Selector for the checkbox control inside the frame's document.
pub const CHECKBOX_SELECTOR: &str = r#"input[type="checkbox"]"#;

/// Interval between frame-attach probes.
const FRAME_PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Timing knobs for one challenge resolution.
#[derive(Debug, Clone)]
pub struct ChallengePolicy {
    /// How long to wait for the frame-hosting element to attach at all.
    /// Expiry here is a distinct failure from the poll budget below.
    pub frame_timeout: Duration,
    /// Pause between checkbox polls. Never incurred before the first check.
    pub poll_interval: Duration,
    /// Wall-clock budget for the whole polling phase.
    pub poll_budget: Duration,
    /// Fixed pause after activation so the challenge clears and the page
    /// behind it finishes loading.
    pub settle_delay: Duration,
}

impl Default for ChallengePolicy {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            poll_budget: Duration::from_secs(60),
            settle_delay: Duration::from_secs(10),
        }
    }
}

/// Phases of one challenge resolution. `Resolved` and `TimedOut` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    AwaitingFrame,
    PollingForControl,
    Activating,
    Resolved,
    TimedOut,
}

/// Terminal result of a challenge resolution that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// Checkbox found and activated; the settle delay has already elapsed.
    Resolved { attempts: u32 },
    /// The poll budget ran out before the checkbox appeared.
    TimedOut { attempts: u32 },
}

impl ChallengeOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Resolved { attempts } | Self::TimedOut { attempts } => *attempts,
        }
    }

    pub fn state(&self) -> ChallengeState {
        match self {
            Self::Resolved { .. } => ChallengeState::Resolved,
            Self::TimedOut { .. } => ChallengeState::TimedOut,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    /// The frame-hosting element never attached. Separate from the poll
    /// budget: the polling phase never began.
    #[error("verification frame did not attach within {0:?}")]
    FrameNeverAttached(Duration),

    #[error("frame query failed: {0}")]
    Query(String),

    #[error("checkbox activation failed: {0}")]
    Activation(String),
}

/// A queryable sub-document: the embedded frame's document in production,
/// a scripted fake in tests.
#[async_trait]
pub trait DomScope: Send + Sync {
    /// True when an element matching `selector` exists in this scope.
    async fn element_exists(&self, selector: &str) -> Result<bool, ChallengeError>;

    /// Check/activate the first element matching `selector`.
    async fn activate(&self, selector: &str) -> Result<(), ChallengeError>;
}

/// Something that can produce the embedded frame's scope once the
/// frame-hosting element attaches.
#[async_trait]
pub trait FrameHost: Send + Sync {
    type Frame: DomScope;

    /// Wait for the frame-hosting element, bounded by `timeout`, and yield
    /// the frame's scope.
    async fn await_frame(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Self::Frame, ChallengeError>;
}

/// Resolve the verification challenge on the current page.
///
/// Polls the frame's document for the checkbox control every
/// `poll_interval`, attempt counter starting at 1. A control present at the
/// very first check is activated immediately; no poll delay is ever
/// incurred for it. Once the cumulative elapsed time exceeds `poll_budget`
/// the handler gives up and reports the attempt count; the caller must skip
/// the URL.
pub async fn resolve_challenge<H: FrameHost>(
    host: &H,
    policy: &ChallengePolicy,
) -> Result<ChallengeOutcome, ChallengeError> {
    debug!(
        state = ?ChallengeState::AwaitingFrame,
        selector = FRAME_SELECTOR,
        "waiting for the verification frame"
    );
    let frame = host.await_frame(FRAME_SELECTOR, policy.frame_timeout).await?;

    debug!(
        state = ?ChallengeState::PollingForControl,
        "frame attached, polling for the checkbox control"
    );
    let started = Instant::now();
    let mut attempts: u32 = 1;

    loop {
        if frame.element_exists(CHECKBOX_SELECTOR).await? {
            debug!(state = ?ChallengeState::Activating, attempts, "checkbox detected");
            frame.activate(CHECKBOX_SELECTOR).await?;
            tokio::time::sleep(policy.settle_delay).await;
            info!(attempts, "verification challenge resolved");
            return Ok(ChallengeOutcome::Resolved { attempts });
        }

        if started.elapsed() >= policy.poll_budget {
            warn!(
                attempts,
                waited_secs = policy.poll_budget.as_secs(),
                "checkbox never appeared, giving up on this page"
            );
            return Ok(ChallengeOutcome::TimedOut { attempts });
        }

        attempts += 1;
        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Deadline-checked attach loop: run `probe` until it reports true or
/// `timeout` elapses. The first probe runs immediately.
pub(crate) async fn wait_for_attach<F, Fut>(
    mut probe: F,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ChallengeError>
where
    F: FnMut() -> Fut + Send,
    Fut: std::future::Future<Output = bool> + Send,
{
    let deadline = Instant::now() + timeout;
    loop {
        if probe().await {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ChallengeError::FrameNeverAttached(timeout));
        }
        tokio::time::sleep(interval).await;
    }
}

// ── Live browser implementations ─────────────────────────────────────────────

/// [`FrameHost`] over the live page: probes for the frame-hosting element
/// until it attaches, then hands out a scope over the frame's document.
pub struct LiveFrameHost {
    page: Arc<Page>,
}

impl LiveFrameHost {
    pub fn new(page: Arc<Page>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl FrameHost for LiveFrameHost {
    type Frame = LiveFrameScope;

    async fn await_frame(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Self::Frame, ChallengeError> {
        let page = Arc::clone(&self.page);
        wait_for_attach(
            || {
                let page = Arc::clone(&page);
                let selector = selector.to_string();
                async move { page.find_element(selector).await.is_ok() }
            },
            timeout,
            FRAME_PROBE_INTERVAL,
        )
        .await?;

        Ok(LiveFrameScope {
            page: Arc::clone(&self.page),
            frame_selector: selector.to_string(),
        })
    }
}

/// [`DomScope`] over the embedded frame's document, reached through the
/// hosting element's `contentDocument` from page JS. A cross-origin frame
/// document reads as "no control yet" and resolves through the poll budget.
pub struct LiveFrameScope {
    page: Arc<Page>,
    frame_selector: String,
}

impl LiveFrameScope {
    async fn eval_bool(&self, script: String) -> Result<bool, ChallengeError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ChallengeError::Query(e.to_string()))?;

        Ok(result
            .into_value::<serde_json::Value>()
            .ok()
            .and_then(|j| j.as_bool())
            .unwrap_or(false))
    }

    fn js_literal(s: &str) -> String {
        serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
    }
}

#[async_trait]
impl DomScope for LiveFrameScope {
    async fn element_exists(&self, selector: &str) -> Result<bool, ChallengeError> {
        let host = Self::js_literal(&self.frame_selector);
        let sel = Self::js_literal(selector);
        let script = format!(
            r#"(() => {{
                const host = document.querySelector({host});
                if (!host) return false;
                const doc = host.contentDocument;
                if (!doc) return false;
                return doc.querySelector({sel}) !== null;
            }})()"#
        );
        self.eval_bool(script).await
    }

    async fn activate(&self, selector: &str) -> Result<(), ChallengeError> {
        let host = Self::js_literal(&self.frame_selector);
        let sel = Self::js_literal(selector);
        let script = format!(
            r#"(() => {{
                const host = document.querySelector({host});
                if (!host || !host.contentDocument) return false;
                const el = host.contentDocument.querySelector({sel});
                if (!el) return false;
                el.click();
                if ('checked' in el) el.checked = true;
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#
        );

        if self.eval_bool(script).await? {
            Ok(())
        } else {
            Err(ChallengeError::Activation(format!(
                "control matching {selector} vanished before activation"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Clone)]
    struct ScriptedFrame {
        /// 1-based query number at which the checkbox starts existing;
        /// `None` means it never appears.
        appear_on_query: Option<u32>,
        queries: Arc<AtomicU32>,
        activations: Arc<AtomicU32>,
        fail_activation: bool,
    }

    impl ScriptedFrame {
        fn appearing_on(query: u32) -> Self {
            Self {
                appear_on_query: Some(query),
                queries: Arc::new(AtomicU32::new(0)),
                activations: Arc::new(AtomicU32::new(0)),
                fail_activation: false,
            }
        }

        fn never_appearing() -> Self {
            Self {
                appear_on_query: None,
                ..Self::appearing_on(1)
            }
        }
    }

    #[async_trait]
    impl DomScope for ScriptedFrame {
        async fn element_exists(&self, _selector: &str) -> Result<bool, ChallengeError> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(self.appear_on_query.is_some_and(|at| n >= at))
        }

        async fn activate(&self, _selector: &str) -> Result<(), ChallengeError> {
            if self.fail_activation {
                return Err(ChallengeError::Activation("scripted failure".to_string()));
            }
            self.activations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ImmediateHost(ScriptedFrame);

    #[async_trait]
    impl FrameHost for ImmediateHost {
        type Frame = ScriptedFrame;

        async fn await_frame(
            &self,
            _selector: &str,
            _timeout: Duration,
        ) -> Result<Self::Frame, ChallengeError> {
            Ok(self.0.clone())
        }
    }

    struct DetachedHost;

    #[async_trait]
    impl FrameHost for DetachedHost {
        type Frame = ScriptedFrame;

        async fn await_frame(
            &self,
            _selector: &str,
            timeout: Duration,
        ) -> Result<Self::Frame, ChallengeError> {
            tokio::time::sleep(timeout).await;
            Err(ChallengeError::FrameNeverAttached(timeout))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_checkbox_skips_the_poll_delay() {
        let frame = ScriptedFrame::appearing_on(1);
        let host = ImmediateHost(frame.clone());
        let policy = ChallengePolicy::default();

        let started = Instant::now();
        let outcome = resolve_challenge(&host, &policy).await.unwrap();

        assert_eq!(outcome, ChallengeOutcome::Resolved { attempts: 1 });
        assert!(outcome.passed());
        // Only the settle delay elapses, never a poll-interval sleep.
        assert_eq!(started.elapsed(), policy.settle_delay);
        assert_eq!(frame.queries.load(Ordering::SeqCst), 1);
        assert_eq!(frame.activations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn checkbox_on_third_poll_counts_attempts() {
        let frame = ScriptedFrame::appearing_on(3);
        let host = ImmediateHost(frame.clone());
        let policy = ChallengePolicy::default();

        let started = Instant::now();
        let outcome = resolve_challenge(&host, &policy).await.unwrap();

        assert_eq!(outcome, ChallengeOutcome::Resolved { attempts: 3 });
        // Two poll intervals before the third check, then the settle delay.
        assert_eq!(
            started.elapsed(),
            policy.poll_interval * 2 + policy.settle_delay
        );
    }

    #[tokio::test(start_paused = true)]
    async fn budget_expiry_reports_attempt_count() {
        let frame = ScriptedFrame::never_appearing();
        let host = ImmediateHost(frame.clone());
        let policy = ChallengePolicy::default();

        let started = Instant::now();
        let outcome = resolve_challenge(&host, &policy).await.unwrap();

        // 2-second polls against a 60-second budget: checks at t = 0, 2, …, 60.
        assert_eq!(outcome, ChallengeOutcome::TimedOut { attempts: 31 });
        assert!(!outcome.passed());
        assert_eq!(outcome.state(), ChallengeState::TimedOut);
        assert_eq!(started.elapsed(), policy.poll_budget);
        assert_eq!(frame.activations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn frame_attach_failure_is_distinct_from_the_poll_budget() {
        let policy = ChallengePolicy::default();

        let started = Instant::now();
        let result = resolve_challenge(&DetachedHost, &policy).await;

        assert!(matches!(
            result,
            Err(ChallengeError::FrameNeverAttached(t)) if t == policy.frame_timeout
        ));
        // Failed during the frame wait, before any polling happened.
        assert_eq!(started.elapsed(), policy.frame_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn activation_errors_propagate() {
        let mut frame = ScriptedFrame::appearing_on(1);
        frame.fail_activation = true;
        let host = ImmediateHost(frame);

        let result = resolve_challenge(&host, &ChallengePolicy::default()).await;
        assert!(matches!(result, Err(ChallengeError::Activation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_attach_succeeds_without_sleeping_when_present() {
        let started = Instant::now();
        let result = wait_for_attach(
            || async { true },
            Duration::from_secs(30),
            FRAME_PROBE_INTERVAL,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_attach_gives_up_at_the_deadline() {
        let timeout = Duration::from_secs(5);
        let started = Instant::now();
        let result = wait_for_attach(|| async { false }, timeout, FRAME_PROBE_INTERVAL).await;

        assert!(matches!(
            result,
            Err(ChallengeError::FrameNeverAttached(t)) if t == timeout
        ));
        assert_eq!(started.elapsed(), timeout);
    }
}
