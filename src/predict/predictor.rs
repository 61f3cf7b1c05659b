//! Delta prediction across the four champion models.

use crate::data::{Channel, ChannelDeltas};
use crate::error::Result;
use crate::registry::ModelRegistry;

/// Serves delta predictions from the registry's champions.
pub struct Predictor<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> Predictor<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    /// Predict all four channel deltas for one feature vector.
    ///
    /// Arity is validated against every champion before any model is
    /// invoked, so a shape mismatch surfaces as a structured error rather
    /// than a numeric failure partway through.
    pub fn predict(&self, features: &[f64]) -> Result<ChannelDeltas> {
        let champions = self.registry.load_all()?;

        for channel in Channel::ALL {
            let champion = &champions[&channel];
            if champion.n_features != features.len() {
                return Err(crate::error::DeltacastError::FeatureShapeMismatch {
                    channel,
                    expected: champion.n_features,
                    got: features.len(),
                });
            }
        }

        Ok(ChannelDeltas {
            opend: champions[&Channel::Opend].predict(features)?,
            highd: champions[&Channel::Highd].predict(features)?,
            lowd: champions[&Channel::Lowd].predict(features)?,
            closed: champions[&Channel::Closed].predict(features)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LagPolicy};
    use crate::data::DeltaBar;
    use crate::error::DeltacastError;
    use crate::features::{build_rows, Dataset};
    use crate::train::train_best;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn train_all(registry: &ModelRegistry) {
        let deltas: Vec<DeltaBar> = (0..40)
            .map(|i| DeltaBar {
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                opend: (i as f64 * 0.4).sin(),
                highd: 1.0 + (i as f64 * 0.2).cos().abs(),
                lowd: -1.0,
                closed: (i as f64 * 0.4).cos() * 0.5,
            })
            .collect();
        let rows = build_rows(&deltas, LagPolicy::DropFirst).unwrap();
        let config = Config::default();
        for channel in Channel::ALL {
            let dataset = Dataset::from_rows(&rows, channel, false);
            let champion = train_best(&dataset, channel, &config).unwrap();
            registry.save(&champion).unwrap();
        }
    }

    #[test]
    fn test_predicts_all_channels() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        train_all(&registry);

        let predictor = Predictor::new(&registry);
        let deltas = predictor.predict(&[0.3, 0.2, 1.5, -1.0]).unwrap();
        assert!(deltas.opend.is_finite());
        assert!(deltas.highd.is_finite());
        assert!(deltas.lowd.is_finite());
        assert!(deltas.closed.is_finite());
    }

    #[test]
    fn test_missing_champion_propagates() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        let predictor = Predictor::new(&registry);
        assert!(matches!(
            predictor.predict(&[0.0; 4]),
            Err(DeltacastError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_shape_mismatch_detected_before_invocation() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        train_all(&registry);

        let predictor = Predictor::new(&registry);
        assert!(matches!(
            predictor.predict(&[0.0; 7]),
            Err(DeltacastError::FeatureShapeMismatch { expected: 4, got: 7, .. })
        ));
    }
}
