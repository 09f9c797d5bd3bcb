//! Splices render results back into the page.
//!
//! Results are placed after the block's visual unit: the highlight wrapper when the block has
//! one, the `<pre>` otherwise. Must run on exactly the HTML the blocks were scanned from.

use crate::config::MaterializerConfig;
use crate::rewrite::{
    self, Handler, OUTPUT_ATTR, STATE_ATTR, STATE_ERROR, STATE_HIDDEN, STATE_HIDDEN_KEPT,
};
use crate::scan::ScannedBlock;
use crate::Result;
use lol_html::html_content::{ContentType, Element};
use lol_html::HandlerResult;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceAction {
    /// Hide the source and insert the graphic container markup.
    Graphic(String),
    /// Keep the source visible and insert the error annotation markup.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub host: usize,
    pub wrapper: Option<usize>,
    pub action: SpliceAction,
}

impl Splice {
    pub fn new(block: &ScannedBlock, action: SpliceAction) -> Self {
        Self {
            host: block.host,
            wrapper: block.wrapper,
            action,
        }
    }

    fn fragment(&self) -> &str {
        match &self.action {
            SpliceAction::Graphic(html) | SpliceAction::Error(html) => html,
        }
    }
}

/// Error annotation shown in place of a diagram that failed to render.
pub fn error_annotation(index: usize, message: &str, source: &str) -> String {
    format!(
        "<div class=\"diagram-error\" role=\"note\" {OUTPUT_ATTR}=\"error\" data-diagram-index=\"{index}\">\
<p class=\"diagram-error-message\">Diagram {} could not be rendered: {}</p>\
<pre class=\"diagram-error-source\" style=\"overflow:auto;max-height:24rem\"><code>{}</code></pre>\
</div>",
        index + 1,
        htmlize::escape_text(message),
        htmlize::escape_text(source)
    )
}

fn mark(el: &mut Element<'_, '_>, state: &str) -> HandlerResult {
    let state = match state {
        STATE_HIDDEN if el.has_attribute("hidden") => STATE_HIDDEN_KEPT,
        STATE_HIDDEN => {
            el.set_attribute("hidden", "")?;
            STATE_HIDDEN
        }
        other => other,
    };
    el.set_attribute(STATE_ATTR, state)?;
    Ok(())
}

fn insert_after_close(el: &mut Element<'_, '_>, fragment: String) -> HandlerResult {
    if !rewrite::when_closed(el, move |end| {
        end.after(&fragment, ContentType::Html);
        Ok(())
    }) {
        return Err(format!("<{}> cannot hold diagram output", el.tag_name()).into());
    }
    Ok(())
}

pub fn splice(html: &str, config: &MaterializerConfig, splices: &[Splice]) -> Result<String> {
    if splices.is_empty() {
        return Ok(html.to_string());
    }

    let mut by_host: HashMap<usize, Splice> = HashMap::new();
    let mut by_wrapper: HashMap<usize, Vec<Splice>> = HashMap::new();
    for s in splices {
        by_host.insert(s.host, s.clone());
        if let Some(w) = s.wrapper {
            by_wrapper.entry(w).or_default().push(s.clone());
        }
    }
    // A wrapper is hidden only when every block inside it rendered; otherwise its rendered
    // `<pre>` elements are hidden one by one and failed ones stay visible.
    let whole: HashSet<usize> = by_wrapper
        .iter()
        .filter(|(_, group)| {
            group
                .iter()
                .all(|s| matches!(s.action, SpliceAction::Graphic(_)))
        })
        .map(|(w, _)| *w)
        .collect();

    let mut handlers: Vec<Handler<'_>> = Vec::new();

    if !config.wrapper_selector.trim().is_empty() {
        let seen = Rc::new(Cell::new(0usize));
        let whole = whole.clone();
        handlers.push(rewrite::on_element(&config.wrapper_selector, move |el| {
            let ordinal = seen.get();
            seen.set(ordinal + 1);
            let Some(group) = by_wrapper.remove(&ordinal) else {
                return Ok(());
            };
            if whole.contains(&ordinal) {
                mark(el, STATE_HIDDEN)?;
            }
            let fragment: String = group.iter().map(Splice::fragment).collect();
            insert_after_close(el, fragment)
        })?);
    }

    {
        let seen = Rc::new(Cell::new(0usize));
        handlers.push(rewrite::on_element("pre", move |el| {
            let ordinal = seen.get();
            seen.set(ordinal + 1);
            let Some(s) = by_host.remove(&ordinal) else {
                return Ok(());
            };
            match (&s.action, s.wrapper) {
                (SpliceAction::Graphic(_), Some(w)) if whole.contains(&w) => {}
                (SpliceAction::Graphic(_), _) => mark(el, STATE_HIDDEN)?,
                (SpliceAction::Error(_), _) => mark(el, STATE_ERROR)?,
            }
            if s.wrapper.is_none() {
                insert_after_close(el, s.fragment().to_string())?;
            }
            Ok(())
        })?);
    }

    rewrite::run(html, handlers)
}
