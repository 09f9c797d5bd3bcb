//! Thin helpers over `lol_html` shared by the cleanup, scan and splice passes.

use crate::{Error, Result};
use lol_html::html_content::{Element, EndTag, TextChunk};
use lol_html::{ElementContentHandlers, HandlerResult, RewriteStrSettings, Selector, rewrite_str};
use std::borrow::Cow;

pub(crate) type Handler<'h> = (Cow<'static, Selector>, ElementContentHandlers<'h>);

/// Marker attribute carried by every element this crate inserts.
pub const OUTPUT_ATTR: &str = "data-diagram-output";
/// Marker attribute recording a state change applied to an existing element.
pub const STATE_ATTR: &str = "data-diagram-state";
pub const STATE_HIDDEN: &str = "hidden";
/// The element was already `hidden` before the pass, so cleanup keeps the attribute.
pub const STATE_HIDDEN_KEPT: &str = "hidden-kept";
pub const STATE_ERROR: &str = "error";

pub(crate) fn selector(raw: &str) -> Result<Cow<'static, Selector>> {
    raw.parse::<Selector>()
        .map(Cow::Owned)
        .map_err(|err| Error::Config {
            message: format!("invalid selector `{raw}`: {err}"),
        })
}

pub(crate) fn on_element<'h>(
    raw: &str,
    handler: impl FnMut(&mut Element<'_, '_>) -> HandlerResult + 'h,
) -> Result<Handler<'h>> {
    Ok((
        selector(raw)?,
        ElementContentHandlers::default().element(handler),
    ))
}

pub(crate) fn on_text<'h>(
    raw: &str,
    handler: impl FnMut(&mut TextChunk<'_>) -> HandlerResult + 'h,
) -> Result<Handler<'h>> {
    Ok((selector(raw)?, ElementContentHandlers::default().text(handler)))
}

/// Registers `handler` for the element's end tag. Elements that cannot have content (void
/// elements) never report an end tag; `false` is returned for them.
pub(crate) fn when_closed(
    el: &mut Element<'_, '_>,
    handler: impl FnOnce(&mut EndTag<'_>) -> HandlerResult + 'static,
) -> bool {
    let Some(handlers) = el.end_tag_handlers() else {
        return false;
    };
    handlers.push(Box::new(handler));
    true
}

pub(crate) fn run(html: &str, handlers: Vec<Handler<'_>>) -> Result<String> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::new()
        },
    )
    .map_err(Error::rewrite)
}

/// Decodes the character references `lol_html` leaves in text chunks and attribute values.
pub(crate) fn decode(raw: &str) -> String {
    htmlize::unescape(raw).into_owned()
}
