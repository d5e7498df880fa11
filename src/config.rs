//! Runtime configuration for the locator and the placement step.
//!
//! Values come from `Default`, a JSON settings file, or `QRPOSE_*`
//! environment variables. Nothing here is cached process-wide: every
//! config is a plain value handed to the component that uses it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which finder backend the locator should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Primary backend when compiled in, contour otherwise
    #[default]
    Auto,
    /// Run-length scanline backend (cargo feature `scanline`)
    Scanline,
    /// Contour-hierarchy backend
    Contour,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "scanline" => Ok(Self::Scanline),
            "contour" => Ok(Self::Contour),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Scanline => "scanline",
            Self::Contour => "contour",
        })
    }
}

/// Order in which detected corners are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CornerOrder {
    /// Symbol order as read by the backend: top-left, top-right,
    /// bottom-right, bottom-left of the code itself
    #[default]
    #[serde(rename = "detected")]
    AsDetected,
    /// Clockwise on screen around the centroid, starting with the corner
    /// nearest the image origin
    #[serde(rename = "canonical")]
    Canonical,
}

impl FromStr for CornerOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detected" | "as-detected" => Ok(Self::AsDetected),
            "canonical" => Ok(Self::Canonical),
            other => Err(format!("unknown corner order '{other}'")),
        }
    }
}

/// Locator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Backend selection, resolved once when the locator is built
    pub backend: BackendPreference,
    /// Corner reporting order
    pub corner_order: CornerOrder,
    /// Downscale inputs whose longer side exceeds this many pixels
    pub max_dim: Option<u32>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            corner_order: CornerOrder::AsDetected,
            max_dim: None,
        }
    }
}

impl LocatorConfig {
    /// Read `QRPOSE_BACKEND`, `QRPOSE_CORNER_ORDER` and `QRPOSE_MAX_DIM`.
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`LocatorConfig::from_env`] with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_dim = parse_var(&lookup, "QRPOSE_MAX_DIM", 0u32);
        Self {
            backend: parse_var(&lookup, "QRPOSE_BACKEND", defaults.backend),
            corner_order: parse_var(&lookup, "QRPOSE_CORNER_ORDER", defaults.corner_order),
            max_dim: (max_dim > 0).then_some(max_dim),
        }
    }
}

/// How a marker pose is turned into a scene transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Side of the square background plane in scene units
    pub plane_size: f64,
    /// Offset along the plane normal applied to the placed object
    pub lift: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            plane_size: 2.0,
            lift: 0.0,
        }
    }
}

/// Settings file layout: `{ "locator": {...}, "placement": {...} }`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Locator section
    pub locator: LocatorConfig,
    /// Placement section
    pub placement: PlacementConfig,
}

impl Settings {
    /// Load a JSON settings file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    lookup(name)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_reads_all_vars() {
        let cfg = LocatorConfig::from_lookup(lookup_from(&[
            ("QRPOSE_BACKEND", "contour"),
            ("QRPOSE_CORNER_ORDER", "canonical"),
            ("QRPOSE_MAX_DIM", " 1024 "),
        ]));
        assert_eq!(cfg.backend, BackendPreference::Contour);
        assert_eq!(cfg.corner_order, CornerOrder::Canonical);
        assert_eq!(cfg.max_dim, Some(1024));
    }

    #[test]
    fn test_from_lookup_bad_values_fall_back() {
        let cfg = LocatorConfig::from_lookup(lookup_from(&[
            ("QRPOSE_BACKEND", "zbar"),
            ("QRPOSE_MAX_DIM", "0"),
        ]));
        assert_eq!(cfg, LocatorConfig::default());
    }

    #[test]
    fn test_settings_partial_json() {
        let s: Settings =
            serde_json::from_str(r#"{"locator":{"backend":"scanline"},"placement":{"lift":0.1}}"#)
                .unwrap();
        assert_eq!(s.locator.backend, BackendPreference::Scanline);
        assert_eq!(s.locator.corner_order, CornerOrder::AsDetected);
        assert_eq!(s.placement.plane_size, 2.0);
        assert_eq!(s.placement.lift, 0.1);
    }

    #[test]
    fn test_settings_load_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/qrpose.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
