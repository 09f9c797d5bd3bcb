//! Block scanner: finds diagram source blocks in document order and collects the raw text
//! sources the extractor chooses from.
//!
//! Blocks are identified by their host `<pre>`: its ordinal among all `<pre>` elements of the
//! document. The splice pass counts `<pre>` elements the same way, so ordinals taken from one
//! scan address the same elements as long as the HTML is unchanged.

use crate::config::MaterializerConfig;
use crate::rewrite::{self, Handler};
use crate::theme::DisplayMode;
use crate::Result;
use lol_html::html_content::Element;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedBlock {
    /// Position among the page's diagram blocks.
    pub index: usize,
    /// Ordinal of the hosting `<pre>` among every `<pre>` of the document.
    pub host: usize,
    /// Ordinal of the enclosing highlight wrapper, if any.
    pub wrapper: Option<usize>,
    /// Undecoded raw-code attribute value.
    pub raw_code: Option<String>,
    /// Undecoded text of each line wrapper.
    pub lines: Vec<String>,
    /// Undecoded text content of the host `<pre>` (its `<code>` child, when there is one).
    pub code_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedPage {
    /// Value of the root element's `data-theme`, when present.
    pub display_mode: Option<DisplayMode>,
    pub blocks: Vec<ScannedBlock>,
}

struct LanguageTag {
    language: String,
    class: String,
}

impl LanguageTag {
    fn new(language: &str) -> Self {
        let language = language.trim().to_string();
        Self {
            class: format!("language-{language}"),
            language,
        }
    }

    fn matches(&self, el: &Element<'_, '_>) -> bool {
        el.get_attribute("data-language")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(&self.language))
            || el
                .get_attribute("class")
                .is_some_and(|c| c.split_whitespace().any(|t| t == self.class))
    }
}

#[derive(Default)]
struct ScanState {
    content_depth: usize,
    pres: usize,
    pre_stack: Vec<usize>,
    wrappers: usize,
    wrapper_stack: Vec<usize>,
    by_host: HashMap<usize, usize>,
    page: ScannedPage,
}

impl ScanState {
    /// Claims the innermost open `<pre>` as a block host. A host is claimed once even when
    /// several rules (its own language tag, its `<code>` child) match it.
    fn claim(&mut self) {
        let Some(&host) = self.pre_stack.last() else {
            return;
        };
        if self.by_host.contains_key(&host) {
            return;
        }
        let index = self.page.blocks.len();
        self.by_host.insert(host, index);
        self.page.blocks.push(ScannedBlock {
            index,
            host,
            wrapper: self.wrapper_stack.last().copied(),
            ..Default::default()
        });
    }

    fn current_block(&mut self) -> Option<&mut ScannedBlock> {
        let host = *self.pre_stack.last()?;
        let index = *self.by_host.get(&host)?;
        self.page.blocks.get_mut(index)
    }

    fn wrapper_block(&mut self) -> Option<&mut ScannedBlock> {
        let wrapper = *self.wrapper_stack.last()?;
        self.page
            .blocks
            .iter_mut()
            .rev()
            .find(|b| b.wrapper == Some(wrapper))
    }
}

/// Scans `html` for diagram source blocks.
pub fn scan(html: &str, config: &MaterializerConfig) -> Result<ScannedPage> {
    let state = Rc::new(RefCell::new(ScanState::default()));
    let tag = Rc::new(LanguageTag::new(&config.language));
    let scoped = !config.content_selector.trim().is_empty();
    let mut handlers: Vec<Handler<'_>> = Vec::new();

    {
        let state = Rc::clone(&state);
        handlers.push(rewrite::on_element("html", move |el| {
            if let Some(value) = el.get_attribute("data-theme") {
                state.borrow_mut().page.display_mode = Some(DisplayMode::from_attribute(&value));
            }
            Ok(())
        })?);
    }

    if scoped {
        let state = Rc::clone(&state);
        handlers.push(rewrite::on_element(&config.content_selector, move |el| {
            let closing = Rc::clone(&state);
            if rewrite::when_closed(el, move |_| {
                let mut s = closing.borrow_mut();
                s.content_depth = s.content_depth.saturating_sub(1);
                Ok(())
            }) {
                state.borrow_mut().content_depth += 1;
            }
            Ok(())
        })?);
    }

    if !config.wrapper_selector.trim().is_empty() {
        let state = Rc::clone(&state);
        handlers.push(rewrite::on_element(&config.wrapper_selector, move |el| {
            let ordinal = {
                let mut s = state.borrow_mut();
                s.wrappers += 1;
                s.wrappers - 1
            };
            let closing = Rc::clone(&state);
            if rewrite::when_closed(el, move |_| {
                closing.borrow_mut().wrapper_stack.pop();
                Ok(())
            }) {
                state.borrow_mut().wrapper_stack.push(ordinal);
            }
            Ok(())
        })?);
    }

    {
        let state = Rc::clone(&state);
        let tag = Rc::clone(&tag);
        handlers.push(rewrite::on_element("pre", move |el| {
            let ordinal = {
                let mut s = state.borrow_mut();
                s.pres += 1;
                s.pres - 1
            };
            let closing = Rc::clone(&state);
            rewrite::when_closed(el, move |_| {
                closing.borrow_mut().pre_stack.pop();
                Ok(())
            });
            let mut s = state.borrow_mut();
            s.pre_stack.push(ordinal);
            if (!scoped || s.content_depth > 0) && tag.matches(el) {
                s.claim();
            }
            Ok(())
        })?);
    }

    {
        let state = Rc::clone(&state);
        let tag = Rc::clone(&tag);
        handlers.push(rewrite::on_element("pre code", move |el| {
            let mut s = state.borrow_mut();
            if (!scoped || s.content_depth > 0) && tag.matches(el) {
                s.claim();
            }
            Ok(())
        })?);
    }

    {
        let state = Rc::clone(&state);
        let attr = config.raw_code_attribute.clone();
        handlers.push(rewrite::on_element(&format!("[{attr}]"), move |el| {
            let Some(value) = el.get_attribute(&attr) else {
                return Ok(());
            };
            let mut s = state.borrow_mut();
            let target = if s.current_block().is_some() {
                s.current_block()
            } else {
                s.wrapper_block()
            };
            if let Some(block) = target {
                block.raw_code.get_or_insert(value);
            }
            Ok(())
        })?);
    }

    {
        let state = Rc::clone(&state);
        handlers.push(rewrite::on_element(
            &format!("pre {}", config.line_selector),
            move |_| {
                if let Some(block) = state.borrow_mut().current_block() {
                    block.lines.push(String::new());
                }
                Ok(())
            },
        )?);
    }

    {
        let state = Rc::clone(&state);
        let token_text = if config.token_selector.trim().is_empty() {
            format!("pre {}", config.line_selector)
        } else {
            format!("pre {} {}", config.line_selector, config.token_selector)
        };
        handlers.push(rewrite::on_text(&token_text, move |chunk| {
            if let Some(line) = state
                .borrow_mut()
                .current_block()
                .and_then(|b| b.lines.last_mut())
            {
                line.push_str(chunk.as_str());
            }
            Ok(())
        })?);
    }

    {
        let state = Rc::clone(&state);
        handlers.push(rewrite::on_text("pre", move |chunk| {
            if let Some(block) = state.borrow_mut().current_block() {
                block.code_text.push_str(chunk.as_str());
            }
            Ok(())
        })?);
    }

    rewrite::run(html, handlers)?;

    let page = std::mem::take(&mut state.borrow_mut().page);
    Ok(page)
}
