//! Darkness heuristic — does a page already render dark on its own?
//!
//! DESIGN
//! ======
//! Operates on style values the page has already resolved, supplied by a
//! [`crate::agent::StyleReader`]. First match wins:
//! 1. the page declares a dark-only color scheme,
//! 2. the root element resolves to a dark-only color scheme,
//! 3. the root or body has an opaque-enough background with relative
//!    luminance below [`DARK_LUMINANCE_THRESHOLD`].
//!
//! ERROR HANDLING
//! ==============
//! An unparseable color is a skipped signal, never a failure. Fully
//! transparent backgrounds are skipped too; they say nothing about the
//! page's own color.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Luminance strictly below this is dark.
pub const DARK_LUMINANCE_THRESHOLD: f64 = 0.3;

// =============================================================================
// SIGNALS
// =============================================================================

/// Resolved style values for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementSignals {
    /// Computed `color-scheme` value, e.g. `"normal"`, `"light dark"`.
    pub color_scheme: Option<String>,
    /// Computed background color, e.g. `"rgba(0, 0, 0, 0)"`.
    pub background: Option<String>,
}

/// Everything the heuristic looks at for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSignals {
    /// Page-level declaration, e.g. `<meta name="color-scheme" content="dark">`.
    pub declared_scheme: Option<String>,
    pub root: ElementSignals,
    pub body: ElementSignals,
}

/// Decide whether the page already looks dark.
#[must_use]
pub fn looks_dark(signals: &PageSignals) -> bool {
    if scheme_is_dark_only(signals.declared_scheme.as_deref()) {
        debug!(scheme = ?signals.declared_scheme, "page declares dark color scheme");
        return true;
    }
    if scheme_is_dark_only(signals.root.color_scheme.as_deref()) {
        debug!(scheme = ?signals.root.color_scheme, "root resolves to dark color scheme");
        return true;
    }

    for (element, raw) in [("root", &signals.root.background), ("body", &signals.body.background)] {
        let Some(raw) = raw.as_deref() else {
            continue;
        };
        let color = match parse_color(raw) {
            Ok(color) => color,
            Err(e) => {
                debug!(element, error = %e, "skipping unparseable background");
                continue;
            }
        };
        if color.is_transparent() {
            continue;
        }
        let luminance = relative_luminance(color);
        if is_dark_luminance(luminance) {
            debug!(element, luminance, "background is dark");
            return true;
        }
    }
    false
}

/// A scheme hint reports dark when it names `dark` and not `light`.
fn scheme_is_dark_only(hint: Option<&str>) -> bool {
    let Some(hint) = hint else {
        return false;
    };
    let mut dark = false;
    let mut light = false;
    for token in hint.split_whitespace() {
        if token.eq_ignore_ascii_case("dark") {
            dark = true;
        } else if token.eq_ignore_ascii_case("light") {
            light = true;
        }
    }
    dark && !light
}

// =============================================================================
// LUMINANCE
// =============================================================================

#[must_use]
pub fn is_dark_luminance(luminance: f64) -> bool {
    luminance < DARK_LUMINANCE_THRESHOLD
}

/// WCAG relative luminance of an sRGB color, in `[0, 1]`.
#[must_use]
pub fn relative_luminance(color: Rgba) -> f64 {
    let r = linearize(color.r / 255.0);
    let g = linearize(color.g / 255.0);
    let b = linearize(color.b / 255.0);
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

fn linearize(c: f64) -> f64 {
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

// =============================================================================
// COLOR PARSING
// =============================================================================

/// Color with channels in `[0, 255]` and alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    #[must_use]
    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r: f64::from(r), g: f64::from(g), b: f64::from(b), a: 1.0 }
    }

    #[must_use]
    pub fn is_transparent(self) -> bool {
        self.a <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("unrecognized color syntax: {0:?}")]
    Syntax(String),
    #[error("invalid color component {component:?} in {value:?}")]
    Component { value: String, component: String },
}

/// Parse a resolved CSS color: `transparent`, `rgb()`/`rgba()`, or hex.
///
/// # Errors
///
/// Returns [`ColorError`] for any other syntax or an unreadable component.
pub fn parse_color(raw: &str) -> Result<Rgba, ColorError> {
    let value = raw.trim().to_ascii_lowercase();
    if value == "transparent" {
        return Ok(Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 });
    }
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| ColorError::Syntax(raw.trim().to_owned()));
    }

    let inner = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| ColorError::Syntax(raw.trim().to_owned()))?;

    let (channels, alpha): (Vec<&str>, Option<&str>) = if inner.contains(',') {
        let mut parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        let alpha = if parts.len() == 4 { parts.pop() } else { None };
        (parts, alpha)
    } else {
        let (left, alpha) = match inner.split_once('/') {
            Some((left, alpha)) => (left, Some(alpha.trim())),
            None => (inner, None),
        };
        (left.split_whitespace().collect(), alpha)
    };

    if channels.len() != 3 {
        return Err(ColorError::Syntax(raw.trim().to_owned()));
    }

    let component_error = |component: &str| ColorError::Component {
        value: raw.trim().to_owned(),
        component: component.to_owned(),
    };
    let r = parse_channel(channels[0]).ok_or_else(|| component_error(channels[0]))?;
    let g = parse_channel(channels[1]).ok_or_else(|| component_error(channels[1]))?;
    let b = parse_channel(channels[2]).ok_or_else(|| component_error(channels[2]))?;
    let a = match alpha {
        Some(alpha) => parse_alpha(alpha).ok_or_else(|| component_error(alpha))?,
        None => 1.0,
    };
    Ok(Rgba { r, g, b, a })
}

fn parse_number(raw: &str) -> Option<f64> {
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

fn parse_channel(raw: &str) -> Option<f64> {
    let value = match raw.strip_suffix('%') {
        Some(pct) => parse_number(pct)? * 2.55,
        None => parse_number(raw)?,
    };
    Some(value.clamp(0.0, 255.0))
}

fn parse_alpha(raw: &str) -> Option<f64> {
    let value = match raw.strip_suffix('%') {
        Some(pct) => parse_number(pct)? / 100.0,
        None => parse_number(raw)?,
    };
    Some(value.clamp(0.0, 1.0))
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let digit = |s: &str| match u8::from_str_radix(s, 16) {
        Ok(v) => Some(v),
        Err(_) => None,
    };
    let doubled = |i: usize| digit(&hex[i..=i].repeat(2));
    let pair = |i: usize| digit(&hex[i..i + 2]);

    // `from_str_radix` would accept a leading sign.
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let (r, g, b, a) = match hex.len() {
        3 => (doubled(0)?, doubled(1)?, doubled(2)?, 255),
        4 => (doubled(0)?, doubled(1)?, doubled(2)?, doubled(3)?),
        6 => (pair(0)?, pair(2)?, pair(4)?, 255),
        8 => (pair(0)?, pair(2)?, pair(4)?, pair(6)?),
        _ => return None,
    };
    Some(Rgba { r: f64::from(r), g: f64::from(g), b: f64::from(b), a: f64::from(a) / 255.0 })
}

#[cfg(test)]
#[path = "heuristic_test.rs"]
mod tests;
