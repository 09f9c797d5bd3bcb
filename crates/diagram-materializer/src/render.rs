//! Render contract between the materializer and the external diagram renderer.

use crate::config::MaterializerConfig;
use crate::rewrite::OUTPUT_ATTR;
use crate::theme::DisplayMode;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Per-pass renderer configuration. Serializes to the renderer's own config shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    pub theme: String,
    pub security_level: String,
    pub suppress_error_rendering: bool,
    pub start_on_load: bool,
}

impl RenderConfig {
    pub fn for_mode(config: &MaterializerConfig, mode: DisplayMode) -> Self {
        Self {
            theme: config.theme_name(mode).to_string(),
            security_level: config.security_level.clone(),
            suppress_error_rendering: config.suppress_error_rendering,
            start_on_load: false,
        }
    }
}

/// Post-render hook run against the container holding the graphic.
pub type Binding = Box<dyn FnOnce(&mut DiagramContainer) + Send>;

pub struct RenderedDiagram {
    pub svg: String,
    pub bind: Option<Binding>,
}

impl RenderedDiagram {
    pub fn new(svg: impl Into<String>) -> Self {
        Self {
            svg: svg.into(),
            bind: None,
        }
    }

    pub fn with_binding(
        mut self,
        bind: impl FnOnce(&mut DiagramContainer) + Send + 'static,
    ) -> Self {
        self.bind = Some(Box::new(bind));
        self
    }
}

impl std::fmt::Debug for RenderedDiagram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedDiagram")
            .field("svg", &self.svg)
            .field("bind", &self.bind.is_some())
            .finish()
    }
}

/// Error reported by a renderer for one diagram.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RenderFailure {
    pub message: String,
}

impl RenderFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    /// Applies the configuration used by every subsequent `render` call.
    async fn initialize(&self, config: &RenderConfig) -> Result<()>;

    async fn render(
        &self,
        id: &str,
        source: &str,
    ) -> std::result::Result<RenderedDiagram, RenderFailure>;
}

#[async_trait]
pub trait RendererLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn DiagramRenderer>>;
}

/// Loader for a renderer that is already available.
pub struct Preloaded(pub Arc<dyn DiagramRenderer>);

#[async_trait]
impl RendererLoader for Preloaded {
    async fn load(&self) -> Result<Arc<dyn DiagramRenderer>> {
        Ok(Arc::clone(&self.0))
    }
}

/// Caches the first successfully loaded renderer.
///
/// Callers arriving while a load is in flight wait on that load instead of starting another one.
/// A failed load leaves the cache empty so the next caller retries.
pub struct RendererCache {
    loader: Box<dyn RendererLoader>,
    cell: OnceCell<Arc<dyn DiagramRenderer>>,
}

impl RendererCache {
    pub fn new(loader: impl RendererLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn DiagramRenderer>> {
        self.cell
            .get_or_try_init(|| self.loader.load())
            .await
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

/// Container inserted next to a source block, holding its rendered graphic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramContainer {
    pub id: String,
    pub index: usize,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub inner_html: String,
}

impl DiagramContainer {
    pub fn new(id: impl Into<String>, index: usize, svg: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index,
            classes: vec!["diagram-rendered".to_string()],
            attributes: Vec::new(),
            inner_html: svg.into(),
        }
    }

    /// Sets an extra attribute on the container. Returns `false`, leaving the container
    /// unchanged, for names that are not valid HTML attribute names or that the container
    /// writes itself.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if !is_settable_attribute(&name) {
            return false;
        }
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
        true
    }

    pub fn to_html(&self) -> String {
        let mut out = format!(
            "<div id=\"{}\" class=\"{}\" {OUTPUT_ATTR}=\"graphic\" data-diagram-index=\"{}\"",
            htmlize::escape_attribute(&self.id),
            htmlize::escape_attribute(self.classes.join(" ")),
            self.index
        );
        for (name, value) in self.attributes.iter().filter(|(n, _)| is_settable_attribute(n)) {
            out.push_str(&format!(" {name}=\"{}\"", htmlize::escape_attribute(value)));
        }
        out.push('>');
        out.push_str(&self.inner_html);
        out.push_str("</div>");
        out
    }
}

fn is_settable_attribute(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '<' | '>' | '/' | '=')
        })
        && !["id", "class", OUTPUT_ATTR, "data-diagram-index"]
            .iter()
            .any(|reserved| name.eq_ignore_ascii_case(reserved))
}
