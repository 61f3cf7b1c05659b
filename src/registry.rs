//! Champion model persistence.
//!
//! One bincode artifact per channel under the configured model directory,
//! fronted by an in-memory cache behind a `RwLock`: prediction readers
//! share the lock, the online-update writer excludes them. File access
//! retries at most once before surfacing `PersistenceFailure`.

use crate::data::Channel;
use crate::error::{DeltacastError, Result};
use crate::train::ChampionModel;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct ModelRegistry {
    dir: PathBuf,
    cache: RwLock<HashMap<Channel, ChampionModel>>,
}

impl ModelRegistry {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Deterministic artifact key for a channel.
    pub fn artifact_path(&self, channel: Channel) -> PathBuf {
        self.dir.join(format!("champion_{channel}.bin"))
    }

    /// Persist a channel's champion, replacing any prior artifact.
    pub fn save(&self, model: &ChampionModel) -> Result<()> {
        let channel = model.channel;
        let path = self.artifact_path(channel);
        let bytes = bincode::serialize(model).map_err(|err| DeltacastError::CorruptArtifact {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        self.write_with_retry(&path, &bytes)?;
        cache.insert(channel, model.clone());
        debug!(%channel, path = %path.display(), "champion persisted");
        Ok(())
    }

    /// Load a channel's champion, from cache when warm.
    pub fn load(&self, channel: Channel) -> Result<ChampionModel> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(model) = cache.get(&channel) {
                return Ok(model.clone());
            }
        }

        let path = self.artifact_path(channel);
        let bytes = self.read_with_retry(&path, channel)?;
        let model: ChampionModel =
            bincode::deserialize(&bytes).map_err(|err| DeltacastError::CorruptArtifact {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(channel, model.clone());
        Ok(model)
    }

    /// Load champions for all four channels, failing on the first miss.
    pub fn load_all(&self) -> Result<HashMap<Channel, ChampionModel>> {
        let mut all = HashMap::new();
        for channel in Channel::ALL {
            all.insert(channel, self.load(channel)?);
        }
        Ok(all)
    }

    /// Drop the in-memory cache, forcing the next load back to disk.
    pub fn invalidate(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn write_with_retry(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(path, err))?;
            }
        }
        match fs::write(path, bytes) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(path = %path.display(), %err, "artifact write failed, retrying once");
                fs::write(path, bytes).map_err(|err| self.io_error(path, err))
            }
        }
    }

    fn read_with_retry(&self, path: &Path, channel: Channel) -> Result<Vec<u8>> {
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(DeltacastError::ModelNotFound(channel))
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "artifact read failed, retrying once");
                match fs::read(path) {
                    Ok(bytes) => Ok(bytes),
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        Err(DeltacastError::ModelNotFound(channel))
                    }
                    Err(err) => Err(self.io_error(path, err)),
                }
            }
        }
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> DeltacastError {
        DeltacastError::PersistenceFailure {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::features::{build_rows, Dataset};
    use crate::models::Regressor;
    use crate::config::LagPolicy;
    use crate::data::DeltaBar;
    use crate::train::train_best;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn fitted_champion() -> ChampionModel {
        let deltas: Vec<DeltaBar> = (0..40)
            .map(|i| DeltaBar {
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                opend: (i as f64 * 0.3).sin(),
                highd: 0.5,
                lowd: -0.5,
                closed: (i as f64 * 0.3).cos(),
            })
            .collect();
        let rows = build_rows(&deltas, LagPolicy::DropFirst).unwrap();
        let dataset = Dataset::from_rows(&rows, Channel::Opend, false);
        train_best(&dataset, Channel::Opend, &Config::default()).unwrap()
    }

    #[test]
    fn test_missing_artifact_is_model_not_found() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        assert!(matches!(
            registry.load(Channel::Highd),
            Err(DeltacastError::ModelNotFound(Channel::Highd))
        ));
    }

    #[test]
    fn test_save_load_round_trip_preserves_predictions() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        let champion = fitted_champion();

        let probe = [0.4, -0.1, 0.5, -0.5];
        let before = champion.predict(&probe).unwrap();

        registry.save(&champion).unwrap();
        registry.invalidate();
        let loaded = registry.load(Channel::Opend).unwrap();
        let after = loaded.predict(&probe).unwrap();

        let tolerance = 1e-9 * before.abs().max(1.0);
        assert!((before - after).abs() < tolerance);
        assert_eq!(loaded.n_features, champion.n_features);
        assert_eq!(loaded.model.family(), champion.model.family());
    }

    #[test]
    fn test_artifact_key_is_per_channel() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        let paths: Vec<_> = Channel::ALL
            .iter()
            .map(|&ch| registry.artifact_path(ch))
            .collect();
        assert!(paths.iter().all(|p| p.starts_with(dir.path())));
        assert_eq!(
            paths.len(),
            paths
                .iter()
                .collect::<std::collections::HashSet<_>>()
                .len()
        );
        assert!(paths[0].file_name().unwrap().to_str().unwrap().contains("opend"));
    }

    #[test]
    fn test_save_overwrites_prior_champion() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path());
        let mut champion = fitted_champion();
        registry.save(&champion).unwrap();

        // Shift the model and persist again; the reloaded artifact follows.
        champion.model.update(&[0.4, -0.1, 0.5, -0.5], 3.0).unwrap();
        champion.holdout_rmse = 9.9;
        registry.save(&champion).unwrap();
        registry.invalidate();

        let loaded = registry.load(Channel::Opend).unwrap();
        assert_eq!(loaded.holdout_rmse, 9.9);
    }
}
