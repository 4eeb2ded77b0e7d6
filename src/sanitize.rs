//! Allow-list sanitizer for rendered SVG.
//!
//! Everything a render backend returns goes through [`sanitize_svg`] before it
//! is handed to a client. Elements outside [`SVG_TAGS`] are dropped (script,
//! style and embedding elements together with their content), attributes outside
//! [`SVG_ATTRIBUTES`] are dropped, which removes every `on*` handler and `data-*`
//! attribute, and comments are stripped.

use ammonia::Builder;
use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::error::SanitizeError;

pub const SVG_TAGS: &[&str] = &[
    "svg",
    "g",
    "path",
    "circle",
    "rect",
    "line",
    "polyline",
    "polygon",
    "ellipse",
    "text",
    "tspan",
    "defs",
    "linearGradient",
    "radialGradient",
    "stop",
    "clipPath",
    "marker",
    "pattern",
    "image",
    "use",
    "desc",
    "title",
    "metadata",
];

pub const SVG_ATTRIBUTES: &[&str] = &[
    "id",
    "class",
    "style",
    "x",
    "y",
    "x1",
    "y1",
    "x2",
    "y2",
    "cx",
    "cy",
    "r",
    "rx",
    "ry",
    "width",
    "height",
    "d",
    "fill",
    "stroke",
    "stroke-width",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-dasharray",
    "opacity",
    "fill-opacity",
    "stroke-opacity",
    "transform",
    "viewBox",
    "preserveAspectRatio",
    "xmlns",
    "version",
    "points",
    "text-anchor",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "dominant-baseline",
    "alignment-baseline",
    "offset",
    "stop-color",
    "stop-opacity",
    "gradientUnits",
    "gradientTransform",
    "spreadMethod",
    "href",
    "clip-path",
    "marker-start",
    "marker-mid",
    "marker-end",
    "markerWidth",
    "markerHeight",
    "markerUnits",
    "orient",
    "refX",
    "refY",
    "patternUnits",
    "patternContentUnits",
    "patternTransform",
];

// Removed along with everything inside them
const STRIPPED_WITH_CONTENT: &[&str] = &["script", "style", "iframe", "object", "embed", "noscript"];

lazy_static! {
    static ref SANITIZER: Builder<'static> = {
        let mut builder = Builder::empty();
        builder
            .add_tags(SVG_TAGS)
            .add_generic_attributes(SVG_ATTRIBUTES)
            .clean_content_tags(STRIPPED_WITH_CONTENT.iter().copied().collect::<HashSet<_>>())
            .url_schemes(["http", "https"].into_iter().collect::<HashSet<_>>())
            .link_rel(None)
            .strip_comments(true);
        builder
    };
}

/// Strip everything outside the SVG allow-list.
///
/// Fails on empty input, and when nothing survives sanitization.
pub fn sanitize_svg(svg: &str) -> Result<String, SanitizeError> {
    if svg.is_empty() {
        return Err(SanitizeError::EmptyInput);
    }

    let clean = SANITIZER.clean(svg).to_string();
    if clean.trim().is_empty() {
        return Err(SanitizeError::Rejected);
    }
    Ok(clean)
}
