//! The prediction query surface.
//!
//! Answers "forecast for this calendar date" requests against the cached
//! store views: locate (or synthesize) the feature row, run the four
//! champions, reconstruct absolute levels from the last realized bar.

use super::predictor::Predictor;
use super::reconstruct::{reconstruct, Forecast};
use crate::config::Config;
use crate::data::{DeltaStore, OhlcBar, OhlcStore, TableStore};
use crate::error::{DeltacastError, Result};
use crate::features::{next_day_features, FeatureRow};
use crate::registry::ModelRegistry;
use chrono::NaiveDate;
use tracing::debug;

pub struct PredictionService<'a> {
    config: &'a Config,
    ohlc_store: OhlcStore,
    delta_store: DeltaStore,
    dataset_store: TableStore<FeatureRow>,
    registry: &'a ModelRegistry,
}

impl<'a> PredictionService<'a> {
    pub fn new(config: &'a Config, registry: &'a ModelRegistry) -> Self {
        let symbol = &config.primary_symbol;
        Self {
            config,
            ohlc_store: OhlcStore::new(config.ohlc_path(symbol)),
            delta_store: DeltaStore::new(config.delta_path(symbol)),
            dataset_store: TableStore::new(config.dataset_path()),
            registry,
        }
    }

    /// Forecast the bar for `date`.
    ///
    /// A date inside recorded history must have a matching feature row,
    /// otherwise the request fails with `DateNotFound`. A date after the
    /// last recorded delta bar gets a synthesized row whose lag features
    /// are the last realized deltas.
    pub fn query(&mut self, date: NaiveDate) -> Result<Forecast> {
        let features = self.locate_features(date)?;
        let deltas = Predictor::new(self.registry).predict(&features)?;
        let prior = self.prior_bar(date)?;
        Ok(reconstruct(date, &prior, &deltas))
    }

    fn locate_features(&mut self, date: NaiveDate) -> Result<Vec<f64>> {
        let include_timestamp = self.config.include_timestamp;
        if let Some(row) = self
            .dataset_store
            .rows()?
            .iter()
            .find(|row| row.date == date)
        {
            debug!(%date, "serving from recorded feature row");
            return Ok(row.features(include_timestamp));
        }

        // Beyond recorded history the row does not exist yet; synthesize it
        // from the last realized delta bar.
        if let Some(last) = self.delta_store.rows()?.last() {
            if date > last.date {
                debug!(%date, last = %last.date, "synthesizing feature row past history");
                return Ok(next_day_features(last, date, include_timestamp));
            }
        }

        Err(DeltacastError::DateNotFound(date))
    }

    /// Most recent realized bar strictly before the forecast date.
    fn prior_bar(&mut self, date: NaiveDate) -> Result<OhlcBar> {
        self.ohlc_store
            .rows()?
            .iter()
            .rev()
            .find(|bar| bar.date < date)
            .copied()
            .ok_or(DeltacastError::DateNotFound(date))
    }
}
