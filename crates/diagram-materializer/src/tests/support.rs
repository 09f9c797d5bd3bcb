use crate::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// Renderer double: records every call and fails sources containing `INVALID`.
#[derive(Default)]
pub struct FakeRenderer {
    configs: Mutex<Vec<RenderConfig>>,
    calls: Mutex<Vec<(String, String)>>,
    gate: Option<Gate>,
}

struct Gate {
    entered: Notify,
    release: Semaphore,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `render` call parks until [`FakeRenderer::release`] grants it a permit.
    pub fn gated() -> Self {
        Self {
            gate: Some(Gate {
                entered: Notify::new(),
                release: Semaphore::new(0),
            }),
            ..Self::default()
        }
    }

    /// Resolves once a `render` call is parked on the gate.
    pub async fn entered(&self) {
        self.gate.as_ref().unwrap().entered.notified().await;
    }

    pub fn release(&self, renders: usize) {
        self.gate.as_ref().unwrap().release.add_permits(renders);
    }

    pub fn configs(&self) -> Vec<RenderConfig> {
        self.configs.lock().unwrap().clone()
    }

    /// `(id, source)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sources(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, source)| source).collect()
    }
}

#[async_trait]
impl DiagramRenderer for FakeRenderer {
    async fn initialize(&self, config: &RenderConfig) -> Result<()> {
        self.configs.lock().unwrap().push(config.clone());
        Ok(())
    }

    async fn render(
        &self,
        id: &str,
        source: &str,
    ) -> std::result::Result<RenderedDiagram, RenderFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((id.to_string(), source.to_string()));
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.acquire().await.unwrap().forget();
        }
        if source.contains("INVALID") {
            return Err(RenderFailure::new("Parse error on line 2"));
        }
        Ok(RenderedDiagram::new(format!(
            "<svg id=\"{id}\"><text>{}</text></svg>",
            htmlize::escape_text(source)
        )))
    }
}

/// Loader that fails its first `failures` loads and counts every attempt.
pub struct CountingLoader {
    renderer: Arc<FakeRenderer>,
    failures: usize,
    delay: Duration,
    pub loads: Arc<AtomicUsize>,
}

impl CountingLoader {
    pub fn new(renderer: Arc<FakeRenderer>) -> Self {
        Self {
            renderer,
            failures: 0,
            delay: Duration::ZERO,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl RendererLoader for CountingLoader {
    async fn load(&self) -> Result<Arc<dyn DiagramRenderer>> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if attempt < self.failures {
            return Err(Error::RendererLoad {
                message: "script blocked".to_string(),
            });
        }
        Ok(Arc::clone(&self.renderer) as Arc<dyn DiagramRenderer>)
    }
}

/// A diagram block as Expressive Code emits it: highlight wrapper, per-line markup and a copy
/// button carrying the raw code.
pub fn ec_block(source: &str) -> String {
    let lines: String = source
        .lines()
        .map(|line| {
            format!(
                "<div class=\"ec-line\"><div class=\"code\">{}</div></div>",
                htmlize::escape_text(line)
            )
        })
        .collect();
    let raw = source.lines().collect::<Vec<_>>().join("\u{7f}");
    format!(
        "<div class=\"expressive-code\"><figure class=\"frame\"><pre data-language=\"mermaid\"><code>{lines}</code></pre><div class=\"copy\"><button data-code=\"{}\"></button></div></figure></div>",
        htmlize::escape_attribute(raw)
    )
}

/// A full page with the given body inside the content container.
pub fn page(theme: &str, body: &str) -> String {
    format!(
        "<html data-theme=\"{theme}\"><head></head><body><main class=\"sl-markdown-content\">{body}</main></body></html>"
    )
}

pub fn page_of(sources: &[&str]) -> String {
    let body: String = sources.iter().map(|s| ec_block(s)).collect();
    page("light", &body)
}

pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

pub fn graphics(html: &str) -> usize {
    count(html, "data-diagram-output=\"graphic\"")
}

pub fn annotations(html: &str) -> usize {
    count(html, "data-diagram-output=\"error\"")
}
