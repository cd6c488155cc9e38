//! Acres-by-profit histogram.

use report_common::Color;

use crate::error::{ChartError, Result};
use crate::svg::{num, SvgDocument, TextStyle};
use crate::Chart;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 720;
const PLOT_LEFT: f64 = 150.0;
const PLOT_RIGHT: f64 = 970.0;
const PLOT_TOP: f64 = 30.0;
const PLOT_BOTTOM: f64 = 540.0;
const GRID_COLOR: Color = Color::rgb(0xB0, 0xB0, 0xB0);
const DEFAULT_BAR: Color = Color::rgba(0x68, 0x84, 0xF2, 217);
const TARGET_Y_TICKS: f64 = 6.0;

/// Bars of `values` centred on `bins`, one bin spacing wide.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitHistogram {
    pub bins: Vec<f64>,
    pub values: Vec<f64>,
    /// One color per bar, or empty for a single default color
    pub colors: Vec<Color>,
    pub x_label: String,
    pub y_label: String,
}

impl ProfitHistogram {
    pub fn new(bins: Vec<f64>, values: Vec<f64>, colors: Vec<Color>) -> Self {
        Self {
            bins,
            values,
            colors,
            x_label: "Profit ($)".to_string(),
            y_label: "Acres".to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bins.len() < 2 {
            return Err(ChartError::InvalidData(format!(
                "a histogram needs at least two bins, got {}",
                self.bins.len()
            )));
        }
        if self.bins.len() != self.values.len() {
            return Err(ChartError::InvalidData(format!(
                "{} bins for {} values",
                self.bins.len(),
                self.values.len()
            )));
        }
        if !self.colors.is_empty() && self.colors.len() != self.bins.len() {
            return Err(ChartError::InvalidData(format!(
                "{} colors for {} bins",
                self.colors.len(),
                self.bins.len()
            )));
        }
        if self.bins.iter().chain(&self.values).any(|v| !v.is_finite()) {
            return Err(ChartError::InvalidData(
                "bins and values must be finite".to_string(),
            ));
        }
        if self.values.iter().any(|v| *v < 0.0) {
            return Err(ChartError::InvalidData(
                "acreage values cannot be negative".to_string(),
            ));
        }
        if !self.values.iter().sum::<f64>().is_finite() {
            return Err(ChartError::InvalidData(
                "values overflow when summed".to_string(),
            ));
        }
        if self.bins.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ChartError::InvalidData(
                "bins must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// Tick labels; the outer bins are open-ended.
    pub fn tick_labels(&self) -> Vec<String> {
        let last = self.bins.len().saturating_sub(1);
        self.bins
            .iter()
            .enumerate()
            .map(|(i, bin)| match i {
                0 => format!("< {bin}"),
                i if i == last => format!("> {bin}"),
                _ => format!("{bin}"),
            })
            .collect()
    }

    /// Top of the y axis: the total of all values.
    pub fn y_max(&self) -> f64 {
        let total: f64 = self.values.iter().sum();
        if total > 0.0 {
            total
        } else {
            1.0
        }
    }

    /// Bar width in data units: the narrowest bin spacing.
    pub fn bar_width(&self) -> f64 {
        self.bins
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(f64::INFINITY, f64::min)
    }

    fn color(&self, i: usize) -> Color {
        self.colors.get(i).copied().unwrap_or(DEFAULT_BAR)
    }
}

impl Chart for ProfitHistogram {
    fn to_svg(&self) -> Result<String> {
        self.validate()?;

        let bar_width = self.bar_width();
        let x_min = self.bins[0] - bar_width;
        let x_max = self.bins[self.bins.len() - 1] + bar_width;
        let y_max = self.y_max();

        let sx = |x: f64| PLOT_LEFT + (x - x_min) / (x_max - x_min) * (PLOT_RIGHT - PLOT_LEFT);
        let sy = |y: f64| PLOT_BOTTOM - y / y_max * (PLOT_BOTTOM - PLOT_TOP);

        let mut doc = SvgDocument::new(WIDTH, HEIGHT);

        // Horizontal grid with labels; the zero tick is left off
        let step = nice_step(y_max / TARGET_Y_TICKS);
        let mut tick = step;
        while tick <= y_max + step * 1e-9 {
            let y = sy(tick);
            doc.line(PLOT_LEFT, y, PLOT_RIGHT, y, GRID_COLOR, 1.0);
            doc.text(
                PLOT_LEFT - 12.0,
                y + 6.0,
                &format_tick(tick),
                TextStyle::new(18.0).anchor("end"),
            );
            tick += step;
        }

        for (i, (bin, value)) in self.bins.iter().zip(&self.values).enumerate() {
            if *value <= 0.0 {
                continue;
            }
            let left = sx(bin - bar_width / 2.0);
            let right = sx(bin + bar_width / 2.0);
            let top = sy(*value);
            doc.rect(left, top, right - left, PLOT_BOTTOM - top, self.color(i), None);
        }

        doc.rect(
            PLOT_LEFT,
            PLOT_TOP,
            PLOT_RIGHT - PLOT_LEFT,
            PLOT_BOTTOM - PLOT_TOP,
            Color::rgba(0, 0, 0, 0),
            Some((Color::BLACK, 1.0)),
        );

        for (bin, label) in self.bins.iter().zip(self.tick_labels()) {
            let x = sx(*bin);
            doc.line(x, PLOT_BOTTOM, x, PLOT_BOTTOM + 6.0, Color::BLACK, 1.0);
            doc.text(
                x,
                PLOT_BOTTOM + 24.0,
                &label,
                TextStyle::new(18.0).anchor("end").rotate(-60.0),
            );
        }

        doc.text(
            (PLOT_LEFT + PLOT_RIGHT) / 2.0,
            HEIGHT as f64 - 20.0,
            &self.x_label,
            TextStyle::new(30.0).anchor("middle"),
        );
        let y_mid = (PLOT_TOP + PLOT_BOTTOM) / 2.0;
        doc.text(
            45.0,
            y_mid,
            &self.y_label,
            TextStyle::new(30.0).anchor("middle").rotate(-90.0),
        );

        Ok(doc.finish())
    }
}

/// A 1, 2 or 5 times power-of-ten step at least `raw`.
fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 || !raw.is_finite() {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn format_tick(v: f64) -> String {
    let s = num(v);
    if s.contains('.') {
        format!("{v:.1}")
    } else {
        s
    }
}
