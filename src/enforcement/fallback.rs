//! Fallback selection: pick the rendition to downshift to.

use crate::config::FallbackMode;
use crate::media_server::{CatalogItem, MediaVersion};
use crate::quality::DynamicRange;
use std::cmp::Reverse;

/// The rendition currently playing, as read from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentRendition<'a> {
    pub media_id: Option<&'a str>,
    pub height: Option<u32>,
    pub dynamic_range: DynamicRange,
}

pub struct FallbackSelector<'a> {
    threshold: u32,
    preferred_heights: &'a [u32],
    mode: FallbackMode,
}

impl<'a> FallbackSelector<'a> {
    pub fn new(threshold: u32, preferred_heights: &'a [u32], mode: FallbackMode) -> Self {
        Self {
            threshold,
            preferred_heights,
            mode,
        }
    }

    /// Per-pass "SDR required" flags, in the order they are tried.
    fn passes(&self) -> &'static [bool] {
        match self.mode {
            FallbackMode::SdrOnly => &[true],
            FallbackMode::SdrPreferred => &[true, false],
            FallbackMode::HdrAllowed => &[false],
        }
    }

    /// Index of the best fallback rendition, or `None` when no pass finds a
    /// safe one.
    pub fn select(&self, item: &CatalogItem, current: CurrentRendition<'_>) -> Option<usize> {
        for (pass, &sdr_required) in self.passes().iter().enumerate() {
            let chosen = item
                .versions
                .iter()
                .filter(|v| self.is_eligible(v, current, sdr_required))
                .min_by_key(|v| self.rank(v));
            match chosen {
                Some(version) => {
                    tracing::info!(
                        pass = pass + 1,
                        sdr_required,
                        chosen = %version,
                        "Fallback rendition selected"
                    );
                    return Some(version.index);
                }
                None => tracing::debug!(pass = pass + 1, sdr_required, "Fallback pass found nothing"),
            }
        }
        None
    }

    fn is_eligible(
        &self,
        version: &MediaVersion,
        current: CurrentRendition<'_>,
        sdr_required: bool,
    ) -> bool {
        if current
            .media_id
            .is_some_and(|id| version.id.as_deref() == Some(id))
        {
            return false;
        }
        let Some(height) = version.height.filter(|h| *h < self.threshold) else {
            return false;
        };
        if sdr_required && !version.dynamic_range.is_sdr() {
            return false;
        }

        // An unknown current height sits at the threshold: every candidate is
        // already below it.
        let current_height = current.height.unwrap_or(self.threshold);
        height < current_height
            || (height == current_height
                && !current.dynamic_range.is_sdr()
                && version.dynamic_range.is_sdr())
    }

    /// Listed heights rank by ladder position; unlisted ones after all of
    /// them. Within a rank, taller first; then catalog order.
    fn rank(&self, version: &MediaVersion) -> (usize, Reverse<u32>, usize) {
        let height = version.height.unwrap_or(0);
        let position = self
            .preferred_heights
            .iter()
            .position(|h| *h == height)
            .unwrap_or(self.preferred_heights.len());
        (position, Reverse(height), version.index)
    }
}
