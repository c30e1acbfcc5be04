//! Channel colours
//!
//! New channels get the hue furthest away from every hue already in use.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of degrees on the hue circle
const HUE_CIRCLE: u16 = 360;

/// HSL colour; channels use full saturation and half lightness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsl {
    /// Hue in degrees, `0..360`
    pub hue: u16,
    /// Saturation in percent
    pub saturation: u8,
    /// Lightness in percent
    pub lightness: u8,
}

impl Hsl {
    /// Fully saturated colour for a hue
    pub fn from_hue(hue: u16) -> Self {
        Self {
            hue: hue % HUE_CIRCLE,
            saturation: 100,
            lightness: 50,
        }
    }
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({}, {}%, {}%)",
            self.hue, self.saturation, self.lightness
        )
    }
}

/// Pick a hue maximally distant from `existing`
///
/// With no existing hues a random one is chosen. Otherwise the hues are
/// sorted and the largest angular gap, including the gap that wraps past
/// 360°, is bisected.
pub fn pick_hue<R: Rng + ?Sized>(existing: &[u16], rng: &mut R) -> u16 {
    if existing.is_empty() {
        return rng.gen_range(0..HUE_CIRCLE);
    }

    let mut hues: Vec<u16> = existing.iter().map(|h| h % HUE_CIRCLE).collect();
    hues.sort_unstable();

    let first = hues[0];
    let last = hues[hues.len() - 1];

    // Gap that wraps around from the last hue back to the first
    let mut biggest_gap = first + HUE_CIRCLE - last;
    let mut best_hue = (last + biggest_gap / 2) % HUE_CIRCLE;

    for pair in hues.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > biggest_gap {
            biggest_gap = gap;
            best_hue = pair[0] + gap / 2;
        }
    }

    best_hue
}
