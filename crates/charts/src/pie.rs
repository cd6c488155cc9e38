//! Expense pie chart.

use report_common::Color;

use crate::error::{ChartError, Result};
use crate::svg::{num, SvgDocument, TextStyle};
use crate::Chart;

/// Wedge colors, cycled when there are more wedges than colors.
pub const DEFAULT_PALETTE: [&str; 12] = [
    "#FC9BBB", "#FC9BE4", "#DB68F2", "#B668F2", "#8F68F2", "#6884F2", "#68CBF2", "#68F2F0",
    "#68F2D9", "#68F271", "#D0F268", "#F2D768",
];

const WIDTH: u32 = 820;
const HEIGHT: u32 = 480;
const CENTER: (f64, f64) = (240.0, 260.0);
const RADIUS: f64 = 180.0;
const EDGE_WIDTH: f64 = 1.5;
const LEGEND_X: f64 = 480.0;
const LEGEND_ROW: f64 = 28.0;
const SWATCH: f64 = 18.0;
/// Wedges smaller than this fraction get no percentage label.
const MIN_LABELLED_FRACTION: f64 = 0.05;

/// One slice of the pie, angles in degrees clockwise from 12 o'clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Wedge {
    pub label: String,
    pub fraction: f64,
    pub start: f64,
    pub sweep: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieChart {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub palette: Vec<Color>,
}

impl PieChart {
    pub fn new(labels: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            title: "Expenses".to_string(),
            labels,
            values,
            palette: default_palette(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.labels.len() != self.values.len() {
            return Err(ChartError::InvalidData(format!(
                "{} labels for {} values",
                self.labels.len(),
                self.values.len()
            )));
        }
        if let Some(bad) = self.values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(ChartError::InvalidData(format!(
                "pie values must be non-negative numbers, got {bad}"
            )));
        }
        let total: f64 = self.values.iter().sum();
        if !total.is_finite() {
            return Err(ChartError::InvalidData(
                "pie values overflow when summed".to_string(),
            ));
        }
        if total <= 0.0 {
            return Err(ChartError::InvalidData(
                "pie values sum to zero".to_string(),
            ));
        }
        if self.palette.is_empty() {
            return Err(ChartError::InvalidData("empty palette".to_string()));
        }
        Ok(())
    }

    /// Wedge geometry, one per value (zero values give zero sweep).
    pub fn wedges(&self) -> Result<Vec<Wedge>> {
        self.validate()?;
        let total: f64 = self.values.iter().sum();

        let mut start = 0.0;
        Ok(self
            .labels
            .iter()
            .zip(&self.values)
            .enumerate()
            .map(|(i, (label, value))| {
                let fraction = value / total;
                let wedge = Wedge {
                    label: label.clone(),
                    fraction,
                    start,
                    sweep: fraction * 360.0,
                    color: self.palette[i % self.palette.len()],
                };
                start += wedge.sweep;
                wedge
            })
            .collect())
    }
}

impl Chart for PieChart {
    fn to_svg(&self) -> Result<String> {
        let wedges = self.wedges()?;
        let (cx, cy) = CENTER;
        let edge = Some((Color::WHITE, EDGE_WIDTH));

        let mut doc = SvgDocument::new(WIDTH, HEIGHT);
        doc.text(20.0, 40.0, &self.title, TextStyle::new(22.0));

        for wedge in wedges.iter().filter(|w| w.sweep > 0.0) {
            if wedge.fraction >= 1.0 {
                doc.circle(cx, cy, RADIUS, wedge.color, edge);
                continue;
            }
            let (x0, y0) = point_at(wedge.start, RADIUS);
            let (x1, y1) = point_at(wedge.start + wedge.sweep, RADIUS);
            let large_arc = if wedge.sweep > 180.0 { 1 } else { 0 };
            let d = format!(
                "M {} {} L {} {} A {} {} 0 {} 1 {} {} Z",
                num(cx),
                num(cy),
                num(x0),
                num(y0),
                num(RADIUS),
                num(RADIUS),
                large_arc,
                num(x1),
                num(y1)
            );
            doc.path(&d, wedge.color, edge);
        }

        for wedge in wedges.iter().filter(|w| w.fraction >= MIN_LABELLED_FRACTION) {
            let (x, y) = point_at(wedge.start + wedge.sweep / 2.0, RADIUS * 0.65);
            doc.text(
                x,
                y + 5.0,
                &format!("{:.0}%", wedge.fraction * 100.0),
                TextStyle::new(14.0)
                    .anchor("middle")
                    .color(wedge.color.contrasting()),
            );
        }

        for (i, wedge) in wedges.iter().enumerate() {
            let top = 80.0 + i as f64 * LEGEND_ROW;
            doc.rect(LEGEND_X, top, SWATCH, SWATCH, wedge.color, None);
            doc.text(
                LEGEND_X + SWATCH + 10.0,
                top + SWATCH - 3.0,
                &wedge.label.replace('\n', " "),
                TextStyle::new(18.0),
            );
        }

        Ok(doc.finish())
    }
}

pub fn default_palette() -> Vec<Color> {
    DEFAULT_PALETTE
        .iter()
        .filter_map(|hex| Color::from_hex(hex).ok())
        .collect()
}

/// Point on the circle at `angle` degrees clockwise from 12 o'clock.
fn point_at(angle: f64, radius: f64) -> (f64, f64) {
    let rad = angle.to_radians();
    (CENTER.0 + radius * rad.sin(), CENTER.1 - radius * rad.cos())
}
