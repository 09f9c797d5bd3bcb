//! Render session coordinator.
//!
//! A [`Materializer`] owns everything that lives for one page view: the document, the cached
//! renderer, the session state machine and the display-mode observer. Passes never overlap;
//! triggers arriving during a pass collapse into a single follow-up pass.

use crate::config::MaterializerConfig;
use crate::page::Page;
use crate::render::{DiagramRenderer, Preloaded, RendererCache, RendererLoader};
use crate::session::{self, PassContext, PassReport, PassStatus};
use crate::theme::DisplayMode;
use crate::trigger::{Trigger, next_settled};
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    /// A pass is running and at least one trigger arrived meanwhile; the latest one is kept.
    RerunPending(Trigger),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Passes run by this call: the triggered one followed by any coalesced follow-ups.
    Ran(Vec<PassReport>),
    /// A pass was already running; it will run once more when it completes.
    Coalesced,
}

impl TriggerOutcome {
    pub fn reports(&self) -> &[PassReport] {
        match self {
            Self::Ran(reports) => reports,
            Self::Coalesced => &[],
        }
    }

    pub fn last(&self) -> Option<&PassReport> {
        self.reports().last()
    }
}

struct Inner {
    config: MaterializerConfig,
    renderers: RendererCache,
    page: Mutex<Page>,
    state: Mutex<SessionState>,
    passes: AtomicU64,
    display: watch::Sender<DisplayMode>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.observer).take() {
            handle.abort();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns the session to `Idle` if a pass is abandoned midway (the trigger future dropped).
struct RunningGuard<'a> {
    state: &'a Mutex<SessionState>,
    armed: bool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *lock(self.state) = SessionState::Idle;
        }
    }
}

/// Cheap handle; clones share the same page view.
#[derive(Clone)]
pub struct Materializer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("state", &self.session_state())
            .field("renderer_loaded", &self.inner.renderers.is_loaded())
            .finish_non_exhaustive()
    }
}

impl Materializer {
    pub fn new(
        config: MaterializerConfig,
        loader: impl RendererLoader + 'static,
        html: impl Into<String>,
    ) -> Self {
        let (display, _) = watch::channel(config.default_display_mode);
        Self {
            inner: Arc::new(Inner {
                renderers: RendererCache::new(loader),
                page: Mutex::new(Page::new(html)),
                state: Mutex::new(SessionState::Idle),
                passes: AtomicU64::new(0),
                display,
                observer: Mutex::new(None),
                config,
            }),
        }
    }

    pub fn with_renderer(
        config: MaterializerConfig,
        renderer: Arc<dyn DiagramRenderer>,
        html: impl Into<String>,
    ) -> Self {
        Self::new(config, Preloaded(renderer), html)
    }

    pub fn config(&self) -> &MaterializerConfig {
        &self.inner.config
    }

    pub fn html(&self) -> String {
        lock(&self.inner.page).html().to_string()
    }

    pub fn session_state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    pub fn renderer_loaded(&self) -> bool {
        self.inner.renderers.is_loaded()
    }

    /// Loads the renderer ahead of the first pass.
    pub async fn preload(&self) -> Result<()> {
        self.inner.renderers.get().await.map(|_| ())
    }

    /// Document ready.
    pub async fn ready(&self) -> TriggerOutcome {
        self.trigger(Trigger::Ready).await
    }

    /// Client-side navigation: replaces the document, then renders it.
    pub async fn navigate(&self, html: impl Into<String>) -> TriggerOutcome {
        lock(&self.inner.page).replace(html);
        self.trigger(Trigger::Navigated).await
    }

    /// Re-runs the full pipeline on demand.
    pub async fn rerender(&self) -> TriggerOutcome {
        self.trigger(Trigger::Manual).await
    }

    /// Changes the root display-mode attribute and notifies the observer, if one is running.
    /// Setting the mode the current document already had set is not a change. A pass in
    /// progress is superseded, so a follow-up pass is queued for it.
    pub fn set_display_mode(&self, mode: DisplayMode) -> Result<()> {
        {
            let mut page = lock(&self.inner.page);
            if page.display_mode() == Some(mode) {
                return Ok(());
            }
            page.set_display_mode(mode)?;
        }
        {
            let mut state = lock(&self.inner.state);
            if *state != SessionState::Idle {
                debug!(display_mode = %mode, "display mode changed during a pass; queueing rerun");
                *state = SessionState::RerunPending(Trigger::DisplayModeChanged);
            }
        }
        self.inner.display.send_modify(|current| *current = mode);
        Ok(())
    }

    /// Starts watching display-mode changes. Bursts of changes within the configured debounce
    /// window cause a single [`Trigger::DisplayModeChanged`] pass. Calling this again replaces
    /// the previous observer. Must be called from within a tokio runtime.
    pub fn observe_display_mode(&self) {
        let mut rx = self.inner.display.subscribe();
        let window = self.inner.config.debounce();
        let target: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(mode) = next_settled(&mut rx, window).await {
                let Some(inner) = target.upgrade() else {
                    return;
                };
                debug!(display_mode = %mode, "display mode settled");
                Materializer { inner }
                    .trigger(Trigger::DisplayModeChanged)
                    .await;
            }
        });
        if let Some(previous) = lock(&self.inner.observer).replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_observing(&self) {
        if let Some(handle) = lock(&self.inner.observer).take() {
            handle.abort();
        }
    }

    /// Single entry point for every trigger source.
    pub async fn trigger(&self, trigger: Trigger) -> TriggerOutcome {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                SessionState::Idle => *state = SessionState::Running,
                SessionState::Running | SessionState::RerunPending(_) => {
                    debug!(trigger = %trigger, "pass in progress; coalescing trigger");
                    *state = SessionState::RerunPending(trigger);
                    return TriggerOutcome::Coalesced;
                }
            }
        }

        let mut guard = RunningGuard {
            state: &self.inner.state,
            armed: true,
        };
        let mut reports = Vec::new();
        let mut current = trigger;
        loop {
            reports.push(self.run_once(current).await);

            let mut state = lock(&self.inner.state);
            match *state {
                SessionState::RerunPending(next) => {
                    *state = SessionState::Running;
                    current = next;
                }
                _ => {
                    *state = SessionState::Idle;
                    guard.armed = false;
                    break;
                }
            }
        }
        TriggerOutcome::Ran(reports)
    }

    async fn run_once(&self, trigger: Trigger) -> PassReport {
        let inner = &self.inner;
        let pass = inner.passes.fetch_add(1, Ordering::Relaxed) + 1;

        let renderer = match inner.renderers.get().await {
            Ok(renderer) => renderer,
            Err(err) => {
                error!(pass, trigger = %trigger, error = %err, "renderer unavailable; page left untouched");
                return PassReport::aborted(pass, trigger, &err);
            }
        };

        let (html, generation, fallback_mode) = {
            let page = lock(&inner.page);
            (
                page.html().to_string(),
                page.generation(),
                page.display_mode()
                    .unwrap_or(inner.config.default_display_mode),
            )
        };
        let ctx = PassContext {
            pass,
            stamp: u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default(),
            fallback_mode,
        };

        let output = match session::run_pass(&html, renderer.as_ref(), &inner.config, ctx).await {
            Ok(output) => output,
            Err(err) => {
                error!(pass, trigger = %trigger, error = %err, "render pass aborted");
                return PassReport::aborted(pass, trigger, &err);
            }
        };

        let status = {
            let mut page = lock(&inner.page);
            if page.generation() == generation {
                page.commit(output.html);
                PassStatus::Applied
            } else {
                info!(pass, trigger = %trigger, "page changed during pass; result discarded");
                PassStatus::Stale
            }
        };

        PassReport {
            pass,
            trigger,
            display_mode: Some(output.display_mode),
            blocks: output.blocks,
            status,
        }
    }
}
