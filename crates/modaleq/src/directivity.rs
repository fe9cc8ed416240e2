//! Speaker directivity lookup.
//!
//! A [`DirectivityTable`] holds one or more named dB curves on a shared
//! frequency grid, for example the on-axis and listening-window responses of
//! a subwoofer. Values between grid points are interpolated linearly; outside
//! the grid the nearest edge value is used.

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Curve;
use crate::error::{ModalEqError, Result};

/// Position of a frequency relative to a sorted grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bracket {
    /// The grid is empty
    Empty,
    /// At or below the first point
    Below,
    /// At or above the last point
    Above,
    /// Between `lower` and `lower + 1`, `t` in [0, 1) from the lower point
    Between { lower: usize, t: f64 },
}

/// Locate `freq` in the ascending grid `freqs`
pub fn find_bracket(freqs: &[f64], freq: f64) -> Bracket {
    let n = freqs.len();
    if n == 0 {
        return Bracket::Empty;
    }
    if freq <= freqs[0] {
        return Bracket::Below;
    }
    if freq >= freqs[n - 1] {
        return Bracket::Above;
    }

    // First index whose frequency is greater than freq; 1 <= upper < n
    let upper = freqs.partition_point(|&f| f <= freq);
    let lower = upper - 1;
    let span = freqs[upper] - freqs[lower];
    let t = if span > 0.0 {
        (freq - freqs[lower]) / span
    } else {
        0.0
    };
    Bracket::Between { lower, t }
}

/// Piecewise-linear interpolation of `values` sampled on `freqs`
///
/// Clamps to the edge values outside the grid. Returns `None` for an empty
/// grid.
pub fn interpolate(freqs: &[f64], values: &[f64], freq: f64) -> Option<f64> {
    let n = freqs.len().min(values.len());
    match find_bracket(&freqs[..n], freq) {
        Bracket::Empty => None,
        Bracket::Below => Some(values[0]),
        Bracket::Above => Some(values[n - 1]),
        Bracket::Between { lower, t } => {
            Some(values[lower] * (1.0 - t) + values[lower + 1] * t)
        }
    }
}

/// Named dB curves on a shared frequency grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DirectivityTable {
    /// Ascending frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Curve name to dB values, one per frequency
    pub curves: BTreeMap<String, Vec<f64>>,
}

impl DirectivityTable {
    /// Check the grid and every curve
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, message: String| ModalEqError::InvalidDirectivity {
            curve_name: name.to_string(),
            message,
        };

        if self.frequencies.is_empty() {
            return Err(invalid("frequencies", "no frequency points".to_string()));
        }
        if let Some(w) = self
            .frequencies
            .windows(2)
            .find(|w| !(w[0] < w[1]))
        {
            return Err(invalid(
                "frequencies",
                format!("frequencies must be strictly ascending ({} then {})", w[0], w[1]),
            ));
        }
        for (name, values) in &self.curves {
            if values.len() != self.frequencies.len() {
                return Err(invalid(
                    name,
                    format!(
                        "{} values for {} frequencies",
                        values.len(),
                        self.frequencies.len()
                    ),
                ));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(invalid(name, "non-finite value".to_string()));
            }
        }
        Ok(())
    }

    /// Load and validate a table from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModalEqError::FileOperation {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let table: Self = serde_json::from_str(&content)?;
        table.validate()?;
        debug!(
            "loaded directivity table {} with curves {:?}",
            path.display(),
            table.curves.keys().collect::<Vec<_>>()
        );
        Ok(table)
    }

    fn curve(&self, name: &str) -> Result<&[f64]> {
        self.curves
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ModalEqError::InvalidDirectivity {
                curve_name: name.to_string(),
                message: format!(
                    "unknown curve, available: {}",
                    self.curves.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            })
    }

    /// Level of curve `name` at `freq` in dB
    pub fn level_db(&self, name: &str, freq: f64) -> Result<f64> {
        let values = self.curve(name)?;
        interpolate(&self.frequencies, values, freq).ok_or_else(|| {
            ModalEqError::InvalidDirectivity {
                curve_name: name.to_string(),
                message: "no frequency points".to_string(),
            }
        })
    }

    /// Linear gain multiplier of curve `name` at `freq`
    pub fn gain_at(&self, name: &str, freq: f64) -> Result<f64> {
        Ok(10f64.powf(self.level_db(name, freq)? / 20.0))
    }

    /// Shape `response` by curve `name`
    pub fn apply(&self, name: &str, response: &Curve) -> Result<Curve> {
        let values = self.curve(name)?;
        if self.frequencies.is_empty() {
            return Ok(response.clone());
        }
        Ok(response.map_points(|f, spl| {
            spl + interpolate(&self.frequencies, values, f).unwrap_or(0.0)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DirectivityTable {
        let mut curves = BTreeMap::new();
        curves.insert("on_axis".to_string(), vec![0.0, -6.0, -6.0]);
        DirectivityTable {
            frequencies: vec![20.0, 40.0, 200.0],
            curves,
        }
    }

    #[test]
    fn test_find_bracket() {
        let freqs = [20.0, 40.0, 200.0];
        assert_eq!(find_bracket(&[], 30.0), Bracket::Empty);
        assert_eq!(find_bracket(&freqs, 10.0), Bracket::Below);
        assert_eq!(find_bracket(&freqs, 200.0), Bracket::Above);
        assert_eq!(find_bracket(&freqs, 30.0), Bracket::Between { lower: 0, t: 0.5 });
        assert_eq!(find_bracket(&freqs, 40.0), Bracket::Between { lower: 1, t: 0.0 });
    }

    #[test]
    fn test_interpolate_clamps_at_edges() {
        let freqs = [20.0, 40.0];
        let values = [2.0, 4.0];
        assert_eq!(interpolate(&freqs, &values, 5.0), Some(2.0));
        assert_eq!(interpolate(&freqs, &values, 30.0), Some(3.0));
        assert_eq!(interpolate(&freqs, &values, 500.0), Some(4.0));
        assert_eq!(interpolate(&[], &[], 30.0), None);
    }

    #[test]
    fn test_gain_is_linear() {
        let table = table();
        assert!((table.gain_at("on_axis", 20.0).unwrap() - 1.0).abs() < 1e-12);
        let half = table.gain_at("on_axis", 100.0).unwrap();
        assert!((half - 10f64.powf(-6.0 / 20.0)).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_curve() {
        let err = table().gain_at("rear", 50.0).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("on_axis"));
    }

    #[test]
    fn test_apply_shapes_response() {
        let response = Curve::from_points(vec![(20.0, 80.0), (30.0, 80.0), (100.0, 80.0)]);
        let shaped = table().apply("on_axis", &response).unwrap();
        assert_eq!(shaped.spl.to_vec(), vec![80.0, 77.0, 74.0]);
    }

    #[test]
    fn test_validate() {
        assert!(table().validate().is_ok());

        let mut bad = table();
        bad.frequencies = vec![20.0, 20.0, 200.0];
        assert!(bad.validate().is_err());

        let mut short = table();
        short.curves.insert("short".to_string(), vec![1.0]);
        let err = short.validate().unwrap_err();
        assert!(err.to_string().contains("short"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directivity.json");
        std::fs::write(&path, serde_json::to_string(&table()).unwrap()).unwrap();
        assert_eq!(DirectivityTable::load(&path).unwrap(), table());

        let missing = DirectivityTable::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(missing.is_io_error());
    }
}
