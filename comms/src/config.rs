//! The scalar configuration map the coordinator attaches to its instructions.

use std::{collections::HashMap, num::NonZeroUsize};

use serde::{Deserialize, Serialize};

/// Default number of local epochs per Fit instruction.
pub const DEFAULT_LOCAL_EPOCHS: NonZeroUsize = NonZeroUsize::new(1).unwrap();

/// Default training batch size per Fit instruction.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(16).unwrap();

/// An untyped configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Double(f64),
    Sint64(i64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Returns the value as an integer, only for `Sint64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Sint64(n) => Some(*n),
            _ => None,
        }
    }
}

/// The configuration map sent along Fit and Evaluate instructions.
pub type ConfigMap = HashMap<String, Scalar>;

/// The configuration keys this client understands, anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    LocalEpochs,
    BatchSize,
}

impl ConfigKey {
    /// The key as it appears on the wire.
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::LocalEpochs => "local_epochs",
            ConfigKey::BatchSize => "batch_size",
        }
    }

    pub fn default_value(self) -> NonZeroUsize {
        match self {
            ConfigKey::LocalEpochs => DEFAULT_LOCAL_EPOCHS,
            ConfigKey::BatchSize => DEFAULT_BATCH_SIZE,
        }
    }

    /// Reads this key from `config`.
    ///
    /// Absent keys, non integer values and non positive integers all resolve to
    /// the key's default, this never fails.
    pub fn read(self, config: &ConfigMap) -> NonZeroUsize {
        config
            .get(self.name())
            .and_then(Scalar::as_i64)
            .and_then(|n| usize::try_from(n).ok())
            .and_then(NonZeroUsize::new)
            .unwrap_or(self.default_value())
    }
}

/// The local training settings requested by a Fit instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitConfig {
    pub local_epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
}

impl FitConfig {
    /// Extracts the recognised keys from a configuration map.
    ///
    /// # Arguments
    /// * `config` - The map attached to the instruction.
    ///
    /// # Returns
    /// The settings, with defaults filled in where needed.
    pub fn from_config(config: &ConfigMap) -> Self {
        Self {
            local_epochs: ConfigKey::LocalEpochs.read(config),
            batch_size: ConfigKey::BatchSize.read(config),
        }
    }

    /// Builds the map a coordinator would send for these settings.
    pub fn to_config(self) -> ConfigMap {
        let mut config = ConfigMap::new();
        config.insert(
            ConfigKey::LocalEpochs.name().to_string(),
            Scalar::Sint64(self.local_epochs.get() as i64),
        );
        config.insert(
            ConfigKey::BatchSize.name().to_string(),
            Scalar::Sint64(self.batch_size.get() as i64),
        );
        config
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            local_epochs: DEFAULT_LOCAL_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(entries: &[(&str, Scalar)]) -> ConfigMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_map_uses_defaults() {
        let fit = FitConfig::from_config(&ConfigMap::new());
        assert_eq!(fit.local_epochs.get(), 1);
        assert_eq!(fit.batch_size.get(), 16);
    }

    #[test]
    fn integer_values_are_read() {
        let map = config(&[
            ("local_epochs", Scalar::Sint64(3)),
            ("batch_size", Scalar::Sint64(8)),
        ]);

        let fit = FitConfig::from_config(&map);
        assert_eq!(fit.local_epochs.get(), 3);
        assert_eq!(fit.batch_size.get(), 8);
    }

    #[test]
    fn malformed_values_fall_back() {
        let map = config(&[
            ("local_epochs", Scalar::Double(3.0)),
            ("batch_size", Scalar::Sint64(-4)),
        ]);

        assert_eq!(FitConfig::from_config(&map), FitConfig::default());

        let map = config(&[("batch_size", Scalar::Sint64(0))]);
        assert_eq!(FitConfig::from_config(&map).batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let map = config(&[
            ("learning_rate", Scalar::Double(0.1)),
            ("local_epochs", Scalar::Sint64(2)),
        ]);

        let fit = FitConfig::from_config(&map);
        assert_eq!(fit.local_epochs.get(), 2);
        assert_eq!(fit.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn to_config_is_read_back() {
        let fit = FitConfig {
            local_epochs: NonZeroUsize::new(4).unwrap(),
            batch_size: NonZeroUsize::new(32).unwrap(),
        };

        assert_eq!(FitConfig::from_config(&fit.to_config()), fit);
    }
}
