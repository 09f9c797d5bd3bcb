#![forbid(unsafe_code)]

//! Headless diagram materializer for rendered documentation pages.
//!
//! Finds diagram source blocks (`data-language="mermaid"` and friends) in highlighted HTML,
//! recovers and repairs their source text, hands it to a diagram renderer and splices the
//! resulting graphics back into the page. Every pass starts by undoing the previous one, so
//! re-running on the same page converges to the same output.
//!
//! Design goals:
//! - per-block failure isolation: a broken diagram never hides its source
//! - at most one pass in flight; triggers arriving meanwhile coalesce into one follow-up
//! - the renderer is an async collaborator behind [`DiagramRenderer`]

pub mod cleanup;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod page;
pub mod render;
mod rewrite;
pub mod scan;
pub mod session;
pub mod splice;
pub mod theme;
pub mod trigger;

pub use cleanup::cleanup;
pub use command::{CommandLoader, CommandRenderer};
pub use config::{CommandConfig, MaterializerConfig, ThemeNames};
pub use coordinator::{Materializer, SessionState, TriggerOutcome};
pub use error::{Error, Result};
pub use extract::{ExtractionSource, Extracted, LINE_SENTINEL, extract};
pub use normalize::{AUTO_SUBGRAPH_PREFIX, Normalizer, clean_text};
pub use page::Page;
pub use render::{
    Binding, DiagramContainer, DiagramRenderer, Preloaded, RenderConfig, RenderFailure,
    RenderedDiagram, RendererCache, RendererLoader,
};
pub use rewrite::{OUTPUT_ATTR, STATE_ATTR, STATE_ERROR, STATE_HIDDEN, STATE_HIDDEN_KEPT};
pub use scan::{ScannedBlock, ScannedPage, scan};
pub use session::{BlockOutcome, BlockReport, InspectedBlock, PassReport, PassStatus, inspect};
pub use theme::DisplayMode;
pub use trigger::Trigger;

#[cfg(test)]
mod tests;
