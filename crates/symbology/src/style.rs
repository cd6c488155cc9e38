//! Map types and the styling plans resolved from attribute values.
//!
//! A [`MapStyle`] is what the user asked for. Resolving it against the
//! attribute values of the input layer gives a [`StylePlan`]: concrete
//! categories or class ranges with their colors, ready for a renderer.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use report_common::Color;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SymbologyError};

/// Number of classes when a graduated map does not say.
pub const DEFAULT_CLASSES: usize = 3;

/// Placeholder for the classified attribute in QML templates.
const QML_FIELD_PLACEHOLDER: &str = r#"renderer-v2 attr="xxxxx""#;

/// Placeholder for the layer opacity in QML templates.
const QML_ALPHA_PLACEHOLDER: &str = r#"symbol alpha="ttt""#;

/// Saturation and value used for category colors.
const CATEGORY_SATURATION: u8 = 170;
const CATEGORY_VALUE: u8 = 220;

/// Kind of map to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    Categorized,
    Graduated,
    Qml,
    Test,
}

impl MapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::Categorized => "categorized",
            MapType::Graduated => "graduated",
            MapType::Qml => "qml",
            MapType::Test => "test",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapType {
    type Err = SymbologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "categorized" => Ok(MapType::Categorized),
            "graduated" => Ok(MapType::Graduated),
            "qml" => Ok(MapType::Qml),
            "test" => Ok(MapType::Test),
            _ => Err(SymbologyError::UnknownMapType(s.to_string())),
        }
    }
}

/// A requested styling, before looking at any data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MapStyle {
    /// One color per distinct value of `field`.
    Categorized { field: String },
    /// Equal-interval numeric classes of `field`.
    Graduated { field: String, classes: usize },
    /// A QML style sheet. `field`, when given, is substituted into the
    /// sheet's attribute placeholder.
    Qml { path: PathBuf, field: Option<String> },
    /// A single flat fill.
    Test,
}

impl MapStyle {
    /// Build a style from loose command-line parts.
    pub fn from_parts(
        map_type: MapType,
        field: Option<String>,
        classes: Option<usize>,
        qml: Option<PathBuf>,
    ) -> Result<Self> {
        let need_field = |map_type| SymbologyError::MissingParameter {
            map_type,
            what: "an attribute field",
        };

        match map_type {
            MapType::Categorized => Ok(MapStyle::Categorized {
                field: field.ok_or_else(|| need_field("categorized"))?,
            }),
            MapType::Graduated => Ok(MapStyle::Graduated {
                field: field.ok_or_else(|| need_field("graduated"))?,
                classes: classes.unwrap_or(DEFAULT_CLASSES),
            }),
            MapType::Qml => Ok(MapStyle::Qml {
                path: qml.ok_or(SymbologyError::MissingParameter {
                    map_type: "qml",
                    what: "a style sheet path",
                })?,
                field,
            }),
            MapType::Test => Ok(MapStyle::Test),
        }
    }

    pub fn map_type(&self) -> MapType {
        match self {
            MapStyle::Categorized { .. } => MapType::Categorized,
            MapStyle::Graduated { .. } => MapType::Graduated,
            MapStyle::Qml { .. } => MapType::Qml,
            MapStyle::Test => MapType::Test,
        }
    }

    /// The attribute this style classifies, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            MapStyle::Categorized { field } | MapStyle::Graduated { field, .. } => Some(field),
            MapStyle::Qml { field, .. } => field.as_deref(),
            MapStyle::Test => None,
        }
    }

    /// Resolve against the layer's attribute values.
    ///
    /// `opacity` only affects QML sheets, which carry it in their symbols.
    pub fn resolve(&self, values: &[Value], opacity: f64) -> Result<StylePlan> {
        let plan = match self {
            MapStyle::Categorized { field } => {
                if values.is_empty() {
                    return Err(SymbologyError::NoValues {
                        field: field.clone(),
                    });
                }
                StylePlan::Categorized {
                    field: field.clone(),
                    categories: categorize(values),
                }
            }
            MapStyle::Graduated { field, classes } => {
                let numbers: Vec<f64> = values.iter().filter_map(numeric).collect();
                let ranges = graduate(&numbers, *classes).map_err(|e| match e {
                    SymbologyError::NoValues { .. } => SymbologyError::NoValues {
                        field: field.clone(),
                    },
                    other => other,
                })?;
                StylePlan::Graduated {
                    field: field.clone(),
                    ranges,
                }
            }
            MapStyle::Qml { path, field } => StylePlan::Qml {
                source: path.clone(),
                document: load_qml(path, field.as_deref(), opacity)?,
            },
            MapStyle::Test => StylePlan::Test {
                fill: category_color(0, 1),
            },
        };

        debug!(map_type = %self.map_type(), "Resolved style plan");
        Ok(plan)
    }
}

/// One category of a categorized map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub value: Value,
    pub label: String,
    pub color: Color,
}

/// One class of a graduated map. `min` is inclusive, `max` exclusive except
/// for the last class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRange {
    pub min: f64,
    pub max: f64,
    pub label: String,
    pub color: Color,
}

/// A style resolved against data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StylePlan {
    Categorized {
        field: String,
        categories: Vec<Category>,
    },
    Graduated {
        field: String,
        ranges: Vec<ClassRange>,
    },
    Qml {
        source: PathBuf,
        document: String,
    },
    Test {
        fill: Color,
    },
}

impl StylePlan {
    pub fn map_type(&self) -> MapType {
        match self {
            StylePlan::Categorized { .. } => MapType::Categorized,
            StylePlan::Graduated { .. } => MapType::Graduated,
            StylePlan::Qml { .. } => MapType::Qml,
            StylePlan::Test { .. } => MapType::Test,
        }
    }

    /// Fill color for a feature with attribute `value`, if the plan knows.
    pub fn color_for(&self, value: &Value) -> Option<Color> {
        match self {
            StylePlan::Categorized { categories, .. } => categories
                .iter()
                .find(|c| &c.value == value)
                .map(|c| c.color),
            StylePlan::Graduated { ranges, .. } => {
                let v = numeric(value)?;
                let last = ranges.len().checked_sub(1)?;
                ranges
                    .iter()
                    .enumerate()
                    .find(|(i, r)| v >= r.min && (v < r.max || (*i == last && v <= r.max)))
                    .map(|(_, r)| r.color)
            }
            StylePlan::Qml { .. } => None,
            StylePlan::Test { fill } => Some(*fill),
        }
    }
}

/// One category per distinct value, in first-seen order.
pub fn categorize(values: &[Value]) -> Vec<Category> {
    let mut distinct: Vec<&Value> = Vec::new();
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }

    let count = distinct.len();
    distinct
        .into_iter()
        .enumerate()
        .map(|(i, value)| Category {
            value: value.clone(),
            label: value_label(value),
            color: category_color(i, count),
        })
        .collect()
}

/// Equal-interval classes over the finite values.
pub fn graduate(values: &[f64], classes: usize) -> Result<Vec<ClassRange>> {
    if classes == 0 {
        return Err(SymbologyError::ZeroClasses);
    }

    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
    .ok_or_else(|| SymbologyError::NoValues {
        field: String::new(),
    })?;

    let interval = (max - min) / classes as f64;
    let colors = red_yellow_green(classes);

    Ok(colors
        .into_iter()
        .enumerate()
        .map(|(i, color)| {
            let lo = min + interval * i as f64;
            let hi = if i + 1 == classes {
                max
            } else {
                min + interval * (i + 1) as f64
            };
            ClassRange {
                min: lo,
                max: hi,
                label: format!("{} - {}", bound_label(lo), bound_label(hi)),
                color,
            }
        })
        .collect())
}

/// A class bound rounded to 12 significant digits, trailing zeros dropped.
fn bound_label(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value == 0.0 { "0".to_string() } else { value.to_string() };
    }

    let sci = format!("{value:.11e}");
    let Some((mantissa, exp)) = sci
        .split_once('e')
        .and_then(|(m, e)| e.parse::<i32>().ok().map(|e| (m, e)))
    else {
        return value.to_string();
    };

    if (-4..12).contains(&exp) {
        let decimals = (11 - exp).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    } else {
        format!("{}e{exp}", trim_fraction(mantissa))
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// `n` colors running red, through yellow, to green.
pub fn red_yellow_green(n: usize) -> Vec<Color> {
    if n == 0 {
        return Vec::new();
    }
    let step = 510 / n;
    (0..n)
        .map(|i| {
            let red = 510usize.saturating_sub(step * i).min(255) as u8;
            let green = (step * i).min(255) as u8;
            Color::rgb(red, green, 0)
        })
        .collect()
}

/// Color of category `index` out of `count`, spaced evenly around the hue wheel.
pub fn category_color(index: usize, count: usize) -> Color {
    let interval = 359 / count.max(1);
    let hue = (index * interval).min(359) as u16;
    Color::from_hsv(hue, CATEGORY_SATURATION, CATEGORY_VALUE)
}

/// Fill a QML template's attribute and opacity placeholders.
pub fn fill_qml_template(template: &str, field: Option<&str>, opacity: f64) -> String {
    let mut document = template.to_string();
    if let Some(field) = field {
        document = document.replace(QML_FIELD_PLACEHOLDER, &format!(r#"renderer-v2 attr="{field}""#));
    }
    document.replace(QML_ALPHA_PLACEHOLDER, &format!(r#"symbol alpha="{opacity}""#))
}

fn load_qml(path: &Path, field: Option<&str>, opacity: f64) -> Result<String> {
    let template = std::fs::read_to_string(path).map_err(|source| SymbologyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(fill_qml_template(&template, field, opacity))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Display text of an attribute value: strings unquoted, everything else as JSON.
pub fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bound_label_significant_digits() {
        assert_eq!(bound_label(-12.333333333333334), "-12.3333333333");
        assert_eq!(bound_label(95.16666666666666), "95.1666666667");
        assert_eq!(bound_label(500.0), "500");
        assert_eq!(bound_label(-0.0), "0");
        assert_eq!(bound_label(1e-17), "1e-17");
        assert_eq!(bound_label(1.5e15), "1.5e15");
    }

    #[test]
    fn test_map_type_case_insensitive() {
        assert_eq!("QML".parse::<MapType>().unwrap(), MapType::Qml);
        assert_eq!("Graduated".parse::<MapType>().unwrap(), MapType::Graduated);
        assert!("pie".parse::<MapType>().is_err());
    }

    #[test]
    fn test_red_yellow_green_three() {
        assert_eq!(
            red_yellow_green(3),
            vec![
                Color::rgb(255, 0, 0),
                Color::rgb(255, 170, 0),
                Color::rgb(170, 255, 0)
            ]
        );
    }

    #[test]
    fn test_category_hues_distinct() {
        let colors: Vec<Color> = (0..6).map(|i| category_color(i, 6)).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(category_color(0, 0), category_color(0, 1));
    }

    #[test]
    fn test_categorize_first_seen_order() {
        let categories = categorize(&[json!("Ca"), json!("Nb"), json!("Ca"), json!(7)]);
        let labels: Vec<&str> = categories.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Ca", "Nb", "7"]);
    }

    #[test]
    fn test_from_parts_requires_field() {
        assert!(matches!(
            MapStyle::from_parts(MapType::Graduated, None, None, None),
            Err(SymbologyError::MissingParameter { .. })
        ));
        assert_eq!(
            MapStyle::from_parts(MapType::Graduated, Some("yield".into()), None, None).unwrap(),
            MapStyle::Graduated {
                field: "yield".into(),
                classes: DEFAULT_CLASSES
            }
        );
    }

    #[test]
    fn test_fill_qml_template() {
        let template = r#"<qgis><renderer-v2 attr="xxxxx"><symbol alpha="ttt"/></renderer-v2></qgis>"#;
        let filled = fill_qml_template(template, Some("profit"), 0.5);
        assert_eq!(
            filled,
            r#"<qgis><renderer-v2 attr="profit"><symbol alpha="0.5"/></renderer-v2></qgis>"#
        );
    }
}
