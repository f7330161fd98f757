//! Color derivation for the mandala grid
//!
//! Each of the eight sub-goal slots owns a base color; everything else on
//! the board is derived from it by blending toward white or black.

/// Base color per sub-goal position, indexed by position - 1.
pub const PALETTE: [&str; 8] = [
    "#e57373", "#ffb74d", "#fff176", "#aed581", "#4fc3f7", "#7986cb", "#ba68c8", "#f06292",
];

/// Fill for grid slots with nothing in them.
pub const EMPTY_CELL: &str = "#eceff1";

/// Fill for the primary goal at the center of the board.
pub const PRIMARY_CENTER: &str = "#37474f";

/// Base color for a sub-goal position (1-8). Out-of-range positions wrap
/// rather than panic.
pub fn base_color(position: u8) -> &'static str {
    PALETTE[(position.saturating_sub(1) as usize) % PALETTE.len()]
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

fn to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

fn blend(channel: u8, toward: f64, factor: f64) -> u8 {
    let factor = factor.clamp(0.0, 1.0);
    (channel as f64 + (toward - channel as f64) * factor).round() as u8
}

/// Blend linearly toward white. A string that is not `#rrggbb` comes back
/// unchanged.
pub fn lighten(hex: &str, factor: f64) -> String {
    match parse_hex(hex) {
        Some((r, g, b)) => to_hex(
            blend(r, 255.0, factor),
            blend(g, 255.0, factor),
            blend(b, 255.0, factor),
        ),
        None => hex.to_string(),
    }
}

/// Blend linearly toward black. A string that is not `#rrggbb` comes back
/// unchanged.
pub fn darken(hex: &str, factor: f64) -> String {
    match parse_hex(hex) {
        Some((r, g, b)) => to_hex(
            blend(r, 0.0, factor),
            blend(g, 0.0, factor),
            blend(b, 0.0, factor),
        ),
        None => hex.to_string(),
    }
}

/// Black or white, whichever reads better on the given fill.
pub fn text_color_for(hex: &str) -> &'static str {
    match parse_hex(hex) {
        Some((r, g, b)) => {
            let luminance =
                (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0;
            if luminance > 0.55 {
                "#000000"
            } else {
                "#ffffff"
            }
        }
        None => "#000000",
    }
}
