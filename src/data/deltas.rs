//! Delta transformation.
//!
//! Converts a raw daily OHLC sequence into the stationary delta
//! representation the models are trained on. The first bar has no
//! predecessor and therefore no delta bar.

use super::types::{DeltaBar, OhlcBar};
use crate::error::{DeltacastError, Result};
use tracing::warn;

/// Compute the delta series for an OHLC series sorted ascending by date.
///
/// Returns one delta bar per input bar after the first, preserving order.
pub fn compute_deltas(bars: &[OhlcBar]) -> Result<Vec<DeltaBar>> {
    if bars.len() < 2 {
        return Err(DeltacastError::InsufficientHistory {
            needed: 2,
            got: bars.len(),
        });
    }
    for pair in bars.windows(2) {
        if pair[1].date <= pair[0].date {
            warn!(date = %pair[1].date, "OHLC series not strictly ascending");
            return Err(DeltacastError::InsufficientHistory {
                needed: 2,
                got: bars.len(),
            });
        }
    }

    Ok(bars
        .windows(2)
        .map(|pair| delta_from_pair(&pair[0], &pair[1]))
        .collect())
}

/// Delta bar for `next` given its realized predecessor. Used by the online
/// path to extend an existing delta series by one day.
pub fn delta_from_pair(prev: &OhlcBar, next: &OhlcBar) -> DeltaBar {
    DeltaBar {
        date: next.date,
        opend: next.open - prev.close,
        highd: next.high - next.open,
        lowd: next.low - next.open,
        closed: next.close - next.open,
    }
}
