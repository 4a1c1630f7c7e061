//! Presentation attributes, inline styles and colors

use crate::document::Element;

/// Parse a number, tolerating a trailing unit such as `px` or `%`
pub fn parse_number(text: &str) -> Option<f32> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            !(c.is_ascii_digit()
                || c == '.'
                || ((c == '-' || c == '+') && (i == 0 || text[..i].ends_with(['e', 'E'])))
                || ((c == 'e' || c == 'E') && i > 0))
        })
        .map_or(text.len(), |(i, _)| i);
    let candidate = &text[..end];
    candidate
        .parse::<f32>()
        .ok()
        .or_else(|| {
            // "1.5em" stops after the exponent marker
            candidate
                .trim_end_matches(['e', 'E', '+', '-'])
                .parse::<f32>()
                .ok()
        })
        .filter(|v| v.is_finite())
}

/// Parse a number or percentage into a fraction-style value: `"50%"` → 0.5,
/// `"0.5"` → 0.5.
pub fn parse_fraction(text: &str) -> Option<f32> {
    let text = text.trim();
    match text.strip_suffix('%') {
        Some(pct) => parse_number(pct).map(|v| v / 100.0),
        None => parse_number(text),
    }
}

/// Parse a whitespace/comma separated list of numbers
pub fn parse_number_list(text: &str) -> Vec<f32> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(parse_number)
        .collect()
}

/// Extract `id` from `url(#id)`
pub fn parse_url_ref(value: &str) -> Option<&str> {
    let inner = value.trim().strip_prefix("url(")?;
    let inner = &inner[..inner.find(')')?];
    let id = inner.trim().trim_matches(['"', '\'']).strip_prefix('#')?;
    (!id.is_empty()).then_some(id)
}

/// Look up a property in the inline `style` attribute, then in the
/// presentation attribute of the same name
pub fn property<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element
        .attr("style")
        .and_then(|style| style_property(style, name))
        .or_else(|| element.attr(name))
        .map(str::trim)
}

/// Find `name` inside a `key: value; key: value` declaration list
pub fn style_property<'a>(style: &'a str, name: &str) -> Option<&'a str> {
    style.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// A resolved fill
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    None,
    Color([f32; 3]),
    /// `url(#id)` reference to a paint server
    Reference(String),
    /// Something we could not interpret (`currentColor`, unknown keyword)
    Unresolved,
}

impl Paint {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == "none" || value == "transparent" {
            return Self::None;
        }
        if let Some(id) = parse_url_ref(value) {
            return Self::Reference(id.to_string());
        }
        parse_color(value).map_or(Self::Unresolved, Self::Color)
    }
}

/// Parse a CSS color into sRGB components in `[0, 1]`
pub fn parse_color(text: &str) -> Option<[f32; 3]> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = text.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
    {
        let args = args.strip_suffix(')')?;
        let parts: Vec<&str> = args
            .split(|c: char| c == ',' || c.is_whitespace() || c == '/')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() < 3 {
            return None;
        }
        let channel = |s: &str| -> Option<f32> {
            match s.strip_suffix('%') {
                Some(pct) => parse_number(pct).map(|v| v / 100.0),
                None => parse_number(s).map(|v| v / 255.0),
            }
        };
        return Some([
            channel(parts[0])?.clamp(0.0, 1.0),
            channel(parts[1])?.clamp(0.0, 1.0),
            channel(parts[2])?.clamp(0.0, 1.0),
        ]);
    }
    named_color(&lower).map(|[r, g, b]| [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
}

fn parse_hex(hex: &str) -> Option<[f32; 3]> {
    let digit = |i: usize| u8::from_str_radix(hex.get(i..=i)?, 16).ok();
    let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    let [r, g, b] = match hex.len() {
        3 | 4 => [digit(0)? * 17, digit(1)? * 17, digit(2)? * 17],
        6 | 8 => [pair(0)?, pair(2)?, pair(4)?],
        _ => return None,
    };
    Some([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
}

fn named_color(name: &str) -> Option<[u8; 3]> {
    Some(match name {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "lime" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" | "aqua" => [0, 255, 255],
        "magenta" | "fuchsia" => [255, 0, 255],
        "gray" | "grey" => [128, 128, 128],
        "silver" => [192, 192, 192],
        "maroon" => [128, 0, 0],
        "olive" => [128, 128, 0],
        "purple" => [128, 0, 128],
        "teal" => [0, 128, 128],
        "navy" => [0, 0, 128],
        "orange" => [255, 165, 0],
        "pink" => [255, 192, 203],
        "brown" => [165, 42, 42],
        "gold" => [255, 215, 0],
        "indigo" => [75, 0, 130],
        "violet" => [238, 130, 238],
        "darkgray" | "darkgrey" => [169, 169, 169],
        "lightgray" | "lightgrey" => [211, 211, 211],
        _ => return None,
    })
}

/// HSL → RGB, all components in `[0, 1]`
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s <= 0.0 {
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f32| {
        t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    [hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0)]
}
