//! Lagged feature construction.
//!
//! Each supervised row pairs a delta bar (the labels) with the previous
//! day's delta bar (the lag features). The dataset CSV keeps all four label
//! columns; a target channel picks one at training time.

use crate::config::LagPolicy;
use crate::data::store::Dated;
use crate::data::{date_ordinal_ms, Channel, DeltaBar};
use crate::error::{DeltacastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One supervised row of the lagged dataset. CSV column order matches the
/// original dataset file: labels first, then lag features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub opend: f64,
    pub highd: f64,
    pub lowd: f64,
    pub closed: f64,
    pub prev_opend: f64,
    pub prev_closed: f64,
    pub prev_highd: f64,
    pub prev_lowd: f64,
}

impl Dated for FeatureRow {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl FeatureRow {
    /// Feature vector in the fixed serving order: optional date ordinal
    /// first, then the four lag deltas.
    pub fn features(&self, include_timestamp: bool) -> Vec<f64> {
        let lags = [
            self.prev_opend,
            self.prev_closed,
            self.prev_highd,
            self.prev_lowd,
        ];
        if include_timestamp {
            let mut out = Vec::with_capacity(5);
            out.push(date_ordinal_ms(self.date) as f64);
            out.extend_from_slice(&lags);
            out
        } else {
            lags.to_vec()
        }
    }

    /// Label value for one target channel.
    pub fn label(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Opend => self.opend,
            Channel::Highd => self.highd,
            Channel::Lowd => self.lowd,
            Channel::Closed => self.closed,
        }
    }

    fn from_pair(lag: Option<&DeltaBar>, current: &DeltaBar) -> Self {
        Self {
            date: current.date,
            opend: current.opend,
            highd: current.highd,
            lowd: current.lowd,
            closed: current.closed,
            prev_opend: lag.map_or(0.0, |d| d.opend),
            prev_closed: lag.map_or(0.0, |d| d.closed),
            prev_highd: lag.map_or(0.0, |d| d.highd),
            prev_lowd: lag.map_or(0.0, |d| d.lowd),
        }
    }
}

/// Build supervised rows from a delta series sorted ascending by date.
///
/// Under `DropFirst` the first delta bar contributes no row (n bars yield
/// n-1 rows); under `ZeroFill` it contributes a row with zeroed lags.
pub fn build_rows(deltas: &[DeltaBar], policy: LagPolicy) -> Result<Vec<FeatureRow>> {
    let needed = match policy {
        LagPolicy::DropFirst => 2,
        LagPolicy::ZeroFill => 1,
    };
    if deltas.len() < needed {
        return Err(DeltacastError::EmptySeries {
            needed,
            got: deltas.len(),
        });
    }

    let mut rows = Vec::with_capacity(deltas.len());
    if policy == LagPolicy::ZeroFill {
        rows.push(FeatureRow::from_pair(None, &deltas[0]));
    }
    for i in 1..deltas.len() {
        rows.push(FeatureRow::from_pair(Some(&deltas[i - 1]), &deltas[i]));
    }
    Ok(rows)
}

/// The row serving a forecast for the day after `last`: its lag features
/// are `last`'s realized deltas.
pub fn next_day_features(last: &DeltaBar, target_date: NaiveDate, include_timestamp: bool) -> Vec<f64> {
    let lags = [last.opend, last.closed, last.highd, last.lowd];
    if include_timestamp {
        let mut out = Vec::with_capacity(5);
        out.push(date_ordinal_ms(target_date) as f64);
        out.extend_from_slice(&lags);
        out
    } else {
        lags.to_vec()
    }
}
