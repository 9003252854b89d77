// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tracing configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the boundary tracing pipeline
///
/// All distances are in page units (PDF points unless the caller rescaled).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TraceConfig {
    /// Maximum chord deviation when flattening curves. Default: 0.25
    pub flatten_tolerance: f64,
    /// Endpoints closer than this merge into one node. Default: 0.5
    pub snap_tolerance: f64,
    /// Strokes thinner than this are annotation, not walls. Default: 0.2
    pub min_stroke_width: f64,
    /// Brightest channel (0..1) a stroke may have and still count as "dark". Default: 0.1
    pub max_stroke_darkness: f64,
    /// Fraction of loops trimmed from each end of the extent ranking. Default: 0.02
    pub outlier_percentile: f64,
    /// Page-span tolerance as a fraction of the smaller extent dimension. Default: 0.01
    pub perimeter_span_tolerance_fraction: f64,
    /// Lower bound for the page-span tolerance. Default: 5.0
    pub perimeter_span_tolerance_floor: f64,
    /// Minimum hint overlap needed to relabel a loop. Default: 0.3
    pub min_hint_overlap: f64,
    /// Split edges where another node touches their interior or where two
    /// edges cross. Default: true
    pub split_t_junctions: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            flatten_tolerance: 0.25,
            snap_tolerance: 0.5,
            min_stroke_width: 0.2,
            max_stroke_darkness: 0.1,
            outlier_percentile: 0.02,
            perimeter_span_tolerance_fraction: 0.01,
            perimeter_span_tolerance_floor: 5.0,
            min_hint_overlap: 0.3,
            split_t_junctions: true,
        }
    }
}

impl TraceConfig {
    /// Checks every knob; a bad value is a caller bug and fails fast.
    pub fn validate(&self) -> Result<()> {
        positive("flatten_tolerance", self.flatten_tolerance)?;
        positive("snap_tolerance", self.snap_tolerance)?;
        non_negative("min_stroke_width", self.min_stroke_width)?;
        in_range("max_stroke_darkness", self.max_stroke_darkness, 0.0, 1.0)?;
        non_negative("outlier_percentile", self.outlier_percentile)?;
        if self.outlier_percentile >= 0.5 {
            return Err(Error::invalid_config(
                "outlier_percentile",
                self.outlier_percentile,
                "must be below 0.5",
            ));
        }
        non_negative(
            "perimeter_span_tolerance_fraction",
            self.perimeter_span_tolerance_fraction,
        )?;
        non_negative(
            "perimeter_span_tolerance_floor",
            self.perimeter_span_tolerance_floor,
        )?;
        in_range("min_hint_overlap", self.min_hint_overlap, 0.0, 1.0)?;
        Ok(())
    }

    /// Page-span tolerance for an extent of the given size.
    pub fn span_tolerance(&self, width: f64, height: f64) -> f64 {
        (width.min(height) * self.perimeter_span_tolerance_fraction)
            .max(self.perimeter_span_tolerance_floor)
    }
}

fn finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid_config(field, value, "must be finite"))
    }
}

fn positive(field: &'static str, value: f64) -> Result<()> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config(field, value, "must be greater than zero"))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config(field, value, "must not be negative"))
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    finite(field, value)?;
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_config(field, value, "out of range 0..=1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TraceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let config = TraceConfig {
            snap_tolerance: -1.0,
            ..Default::default()
        };
        match config.validate() {
            Err(Error::InvalidConfig { field, .. }) => assert_eq!(field, "snap_tolerance"),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_rejected() {
        let config = TraceConfig {
            min_hint_overlap: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_span_tolerance_floor() {
        let config = TraceConfig::default();
        // 1% of 100 is below the floor
        assert_eq!(config.span_tolerance(100.0, 80.0), 5.0);
        assert!((config.span_tolerance(2000.0, 1000.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TraceConfig = serde_json::from_str(r#"{"snap_tolerance": 0.01}"#).unwrap();
        assert_eq!(config.snap_tolerance, 0.01);
        assert_eq!(config.min_hint_overlap, 0.3);
    }
}
