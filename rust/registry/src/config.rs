// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry configuration.
//!
//! The configuration is a plain value handed to constructors; nothing is read
//! from global state behind the caller's back.

use crate::error::{check_tolerance, Result};

/// Point tolerance used when none is configured, in model units.
pub const DEFAULT_POINT_TOLERANCE: f64 = 1e-4;

/// Environment variable read by [`RegistryConfig::from_env`].
pub const POINT_TOLERANCE_ENV: &str = "FEM_LITE_POINT_TOLERANCE";

/// Settings shared by the registries of one model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    /// Distance below which two nodes are the same node. Also the voxel
    /// grid cell size of a node index.
    pub point_tolerance: f64,
}

impl RegistryConfig {
    pub fn new(point_tolerance: f64) -> Result<Self> {
        let config = Self { point_tolerance };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(raw) = lookup(POINT_TOLERANCE_ENV) else {
            return Self::default();
        };
        match raw.trim().parse::<f64>() {
            Ok(point_tolerance) if check_tolerance(point_tolerance).is_ok() => {
                Self { point_tolerance }
            }
            _ => {
                tracing::warn!(
                    var = POINT_TOLERANCE_ENV,
                    value = %raw,
                    default = DEFAULT_POINT_TOLERANCE,
                    "ignoring invalid point tolerance"
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_tolerance(self.point_tolerance)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            point_tolerance: DEFAULT_POINT_TOLERANCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn lookup_overrides_default() {
        let config = RegistryConfig::from_lookup(|name| {
            (name == POINT_TOLERANCE_ENV).then(|| " 0.005 ".to_string())
        });
        assert_eq!(config.point_tolerance, 0.005);
    }

    #[test]
    fn bad_values_fall_back() {
        for raw in ["abc", "-1", "0", "inf"] {
            let config = RegistryConfig::from_lookup(|_| Some(raw.to_string()));
            assert_eq!(config, RegistryConfig::default(), "value {raw:?}");
        }
        let config = RegistryConfig::from_lookup(|_| None);
        assert_eq!(config.point_tolerance, DEFAULT_POINT_TOLERANCE);
    }

    #[test]
    fn new_validates() {
        assert!(RegistryConfig::new(1e-3).is_ok());
        assert!(matches!(
            RegistryConfig::new(0.0),
            Err(Error::DegenerateInput(_))
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_with_defaults() {
        let config: RegistryConfig = serde_json::from_str(r#"{"point_tolerance": 0.01}"#).unwrap();
        assert_eq!(config.point_tolerance, 0.01);

        let config: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RegistryConfig::default());
    }
}
