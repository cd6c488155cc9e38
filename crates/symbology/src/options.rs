//! Output and labelling options for a rendered map.

use std::fmt;
use std::str::FromStr;

use report_common::BoundingBox;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SymbologyError};

/// Where feature labels are placed relative to their feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPlacement {
    #[default]
    AroundPoint,
    OverPoint,
    Line,
    Curved,
    Horizontal,
    Free,
}

impl LabelPlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelPlacement::AroundPoint => "AroundPoint",
            LabelPlacement::OverPoint => "OverPoint",
            LabelPlacement::Line => "Line",
            LabelPlacement::Curved => "Curved",
            LabelPlacement::Horizontal => "Horizontal",
            LabelPlacement::Free => "Free",
        }
    }
}

impl fmt::Display for LabelPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelPlacement {
    type Err = SymbologyError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "aroundpoint" => Ok(LabelPlacement::AroundPoint),
            "overpoint" => Ok(LabelPlacement::OverPoint),
            "line" => Ok(LabelPlacement::Line),
            "curved" => Ok(LabelPlacement::Curved),
            "horizontal" => Ok(LabelPlacement::Horizontal),
            "free" => Ok(LabelPlacement::Free),
            _ => Err(SymbologyError::UnknownPlacement(s.to_string())),
        }
    }
}

/// Image size, extent scaling and labelling for one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// Factor the layer extent is grown by around its center
    pub scale: f64,
    pub label_size: u32,
    pub show_labels: bool,
    pub label_placement: LabelPlacement,
    /// Vector layer opacity in `[0, 1]`
    pub layer_opacity: f64,
    /// Round numeric labels to two decimals
    pub round_labels: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 830,
            height: 830,
            scale: 1.06,
            label_size: 30,
            show_labels: true,
            label_placement: LabelPlacement::AroundPoint,
            layer_opacity: 1.0,
            round_labels: false,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SymbologyError::InvalidOptions(format!(
                "image size {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(SymbologyError::InvalidOptions(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if !(0.0..=1.0).contains(&self.layer_opacity) {
            return Err(SymbologyError::InvalidOptions(format!(
                "layer opacity must be within [0, 1], got {}",
                self.layer_opacity
            )));
        }
        Ok(())
    }

    /// `extent` grown by [`RenderOptions::scale`] around its center.
    pub fn map_extent(&self, extent: &BoundingBox) -> Result<BoundingBox> {
        let (cx, cy) = extent.center();
        let half_w = extent.width() * self.scale / 2.0;
        let half_h = extent.height() * self.scale / 2.0;
        Ok(BoundingBox::with_crs(
            cx - half_w,
            cy - half_h,
            cx + half_w,
            cy + half_h,
            extent.crs(),
        )?)
    }

    /// Label text for an attribute value.
    pub fn label_text(&self, value: &Value) -> String {
        match value {
            Value::Number(n) if self.round_labels => match n.as_f64() {
                Some(v) => format!("{v:.2}"),
                None => n.to_string(),
            },
            other => crate::style::value_label(other),
        }
    }
}
