//! One render pass: cleanup, scan, extract, normalize, render, splice.

use crate::cleanup::cleanup;
use crate::config::MaterializerConfig;
use crate::extract::{ExtractionSource, extract};
use crate::normalize::Normalizer;
use crate::render::{DiagramContainer, DiagramRenderer, RenderConfig};
use crate::scan::scan;
use crate::splice::{Splice, SpliceAction, error_annotation, splice};
use crate::theme::DisplayMode;
use crate::trigger::Trigger;
use crate::{Error, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BlockOutcome {
    Rendered { id: String },
    Failed { message: String },
    Skipped,
}

impl BlockOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

fn tally(blocks: &[BlockReport], pred: impl Fn(&BlockOutcome) -> bool) -> usize {
    blocks.iter().filter(|b| pred(&b.outcome)).count()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReport {
    pub index: usize,
    pub source: Option<ExtractionSource>,
    #[serde(flatten)]
    pub outcome: BlockOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PassStatus {
    /// The pass result replaced the page.
    Applied,
    /// The page changed while the pass was suspended; the result was dropped.
    Stale,
    /// The pass stopped before touching the page.
    Aborted { reason: String },
}

/// Aggregate of one render pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub pass: u64,
    pub trigger: Trigger,
    pub display_mode: Option<DisplayMode>,
    pub blocks: Vec<BlockReport>,
    pub status: PassStatus,
}

impl PassReport {
    pub(crate) fn aborted(pass: u64, trigger: Trigger, err: &Error) -> Self {
        Self {
            pass,
            trigger,
            display_mode: None,
            blocks: Vec::new(),
            status: PassStatus::Aborted {
                reason: err.to_string(),
            },
        }
    }

    pub fn attempted(&self) -> usize {
        tally(&self.blocks, |o| !matches!(o, BlockOutcome::Skipped))
    }

    pub fn succeeded(&self) -> usize {
        tally(&self.blocks, BlockOutcome::is_rendered)
    }

    pub fn failed(&self) -> usize {
        tally(&self.blocks, BlockOutcome::is_failed)
    }

    pub fn skipped(&self) -> usize {
        self.blocks.len() - self.attempted()
    }

    pub fn is_applied(&self) -> bool {
        self.status == PassStatus::Applied
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PassContext {
    pub pass: u64,
    pub stamp: u64,
    pub fallback_mode: DisplayMode,
}

#[derive(Debug)]
pub(crate) struct PassOutput {
    pub html: String,
    pub display_mode: DisplayMode,
    pub blocks: Vec<BlockReport>,
}

pub(crate) fn diagram_id(prefix: &str, ctx: &PassContext, index: usize) -> String {
    format!("{prefix}-{:x}-{}-{index}", ctx.stamp, ctx.pass)
}

/// Runs one pass over `html` and returns the augmented document.
pub(crate) async fn run_pass(
    html: &str,
    renderer: &dyn DiagramRenderer,
    config: &MaterializerConfig,
    ctx: PassContext,
) -> Result<PassOutput> {
    let cleaned = cleanup(html)?;
    let page = scan(&cleaned, config)?;
    let display_mode = page.display_mode.unwrap_or(ctx.fallback_mode);

    renderer
        .initialize(&RenderConfig::for_mode(config, display_mode))
        .await?;

    let mut normalizer = Normalizer::new();
    let mut splices = Vec::new();
    let mut blocks = Vec::with_capacity(page.blocks.len());

    for block in &page.blocks {
        let extracted = extract(block);
        let source = extracted.as_ref().map(|e| e.source);
        let text = extracted
            .map(|e| normalizer.normalize(&e.text))
            .unwrap_or_default();

        if text.is_empty() {
            debug!(pass = ctx.pass, index = block.index, "skipping empty diagram block");
            blocks.push(BlockReport {
                index: block.index,
                source,
                outcome: BlockOutcome::Skipped,
            });
            continue;
        }

        let id = diagram_id(&config.id_prefix, &ctx, block.index);
        debug!(
            pass = ctx.pass,
            index = block.index,
            strategy = source.map(ExtractionSource::as_str),
            id = %id,
            "rendering diagram"
        );

        let outcome = match renderer.render(&id, &text).await {
            Ok(rendered) => {
                let mut container = DiagramContainer::new(&id, block.index, rendered.svg);
                if let Some(bind) = rendered.bind {
                    bind(&mut container);
                }
                splices.push(Splice::new(block, SpliceAction::Graphic(container.to_html())));
                BlockOutcome::Rendered { id }
            }
            Err(failure) => {
                let message = failure.message;
                let err = Error::Render {
                    index: block.index,
                    message: message.clone(),
                };
                warn!(pass = ctx.pass, error = %err, "diagram render failed");
                splices.push(Splice::new(
                    block,
                    SpliceAction::Error(error_annotation(block.index, &message, &text)),
                ));
                BlockOutcome::Failed { message }
            }
        };
        blocks.push(BlockReport {
            index: block.index,
            source,
            outcome,
        });
    }

    let html = splice(&cleaned, config, &splices)?;

    info!(
        pass = ctx.pass,
        blocks = blocks.len(),
        rendered = tally(&blocks, BlockOutcome::is_rendered),
        failed = tally(&blocks, BlockOutcome::is_failed),
        display_mode = %display_mode,
        "render pass finished"
    );

    Ok(PassOutput {
        html,
        display_mode,
        blocks,
    })
}

/// A scanned block as the renderer would receive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectedBlock {
    pub index: usize,
    pub source: Option<ExtractionSource>,
    pub text: String,
}

/// Scans `html` without rendering: extraction and normalization only.
pub fn inspect(html: &str, config: &MaterializerConfig) -> Result<Vec<InspectedBlock>> {
    let cleaned = cleanup(html)?;
    let page = scan(&cleaned, config)?;
    let mut normalizer = Normalizer::new();
    Ok(page
        .blocks
        .iter()
        .map(|block| {
            let extracted = extract(block);
            InspectedBlock {
                index: block.index,
                source: extracted.as_ref().map(|e| e.source),
                text: extracted
                    .map(|e| normalizer.normalize(&e.text))
                    .unwrap_or_default(),
            }
        })
        .collect())
}
