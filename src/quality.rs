//! Quality classification: normalizes raw height and dynamic-range hints.
//!
//! Raw provider strings never travel past this module; everything downstream
//! works with [`DynamicRange`] and `Option<u32>` heights.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DynamicRange {
    Sdr,
    Hdr,
    DolbyVision,
    Unknown,
}

impl DynamicRange {
    pub fn is_sdr(self) -> bool {
        self == Self::Sdr
    }

    /// HDR10, HLG, Dolby Vision, or any unrecognized non-empty hint.
    pub fn is_hdr_like(self) -> bool {
        matches!(self, Self::Hdr | Self::DolbyVision)
    }
}

/// Map a raw dynamic-range hint to its class.
///
/// Case and whitespace are ignored. `SDR` is checked first, so a hint such as
/// `"SDR (HDR tonemapped)"` stays SDR. The `dv`/`dovi` abbreviations only
/// count as whole words, so `"HDR Advanced"` is not Dolby Vision.
/// Unrecognized non-empty hints are treated as HDR: only provably SDR content
/// escapes enforcement.
pub fn classify_dynamic_range(raw: &str) -> DynamicRange {
    let lower = raw.to_ascii_lowercase();
    let joined: String = lower.chars().filter(|c| !c.is_whitespace()).collect();

    if joined.is_empty() || joined == "none" {
        return DynamicRange::Unknown;
    }
    if joined.contains("sdr") {
        return DynamicRange::Sdr;
    }
    let abbreviated = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == "dv" || word == "dovi");
    if abbreviated || joined.contains("dolby") || joined.contains("vision") {
        return DynamicRange::DolbyVision;
    }
    DynamicRange::Hdr
}

/// Classify an optional hint; absence is [`DynamicRange::Unknown`].
pub fn classify_optional(raw: Option<&str>) -> DynamicRange {
    raw.map_or(DynamicRange::Unknown, classify_dynamic_range)
}

/// Parse a resolution hint (`"2160p"`, `"4k"`, `"1080"`, `"sd"`) into a pixel
/// height. Returns `None` for anything that does not yield a positive height.
pub fn parse_height(raw: &str) -> Option<u32> {
    let lower = raw.trim().to_ascii_lowercase();
    match lower.as_str() {
        "" => return None,
        "4k" | "uhd" => return Some(2160),
        "8k" => return Some(4320),
        "2k" => return Some(1440),
        "sd" => return Some(480),
        "hd" => return Some(720),
        "fhd" => return Some(1080),
        _ => {}
    }
    if lower.contains("4k") {
        return Some(2160);
    }
    let digits: String = lower
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<u32>().ok().filter(|h| *h > 0)
}

/// The sole enforcement gate: tall enough, or not provably SDR-or-unknown.
///
/// An unknown height never counts as reaching the threshold.
pub fn is_high_quality(height: Option<u32>, dynamic_range: DynamicRange, threshold: u32) -> bool {
    height.is_some_and(|h| h >= threshold)
        || !matches!(dynamic_range, DynamicRange::Sdr | DynamicRange::Unknown)
}
