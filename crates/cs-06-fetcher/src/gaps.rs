//! # Gap Ranges
//!
//! Inclusive ranges of missing block heights, grouped from a presence scan.

use serde::{Deserialize, Serialize};

/// An inclusive `[start, end]` range of missing heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRange {
    /// First missing height.
    pub start: u64,
    /// Last missing height.
    pub end: u64,
}

impl GapRange {
    /// Number of heights in the gap.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// True when `height` falls inside the gap.
    #[must_use]
    pub fn contains(&self, height: u64) -> bool {
        self.start <= height && height <= self.end
    }
}

/// Group consecutive missing heights into ranges.
///
/// `present` is evaluated for each height in `[start, end]`; runs of
/// `false` become one [`GapRange`] each.
pub fn group_gaps<E>(
    start: u64,
    end: u64,
    mut present: impl FnMut(u64) -> Result<bool, E>,
) -> Result<Vec<GapRange>, E> {
    let mut gaps = Vec::new();
    let mut open: Option<u64> = None;

    for height in start..=end {
        if present(height)? {
            if let Some(gap_start) = open.take() {
                gaps.push(GapRange {
                    start: gap_start,
                    end: height - 1,
                });
            }
        } else if open.is_none() {
            open = Some(height);
        }
    }

    if let Some(gap_start) = open {
        gaps.push(GapRange {
            start: gap_start,
            end,
        });
    }

    Ok(gaps)
}
