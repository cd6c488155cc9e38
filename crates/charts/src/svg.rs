//! Minimal SVG document builder for charts.

use report_common::Color;

pub(crate) const FONT_FAMILY: &str = "DejaVu Sans, Arial, Helvetica, sans-serif";

/// Accumulates SVG elements inside a fixed-size root.
pub(crate) struct SvgDocument {
    width: u32,
    height: u32,
    body: String,
}

impl SvgDocument {
    pub fn new(width: u32, height: u32) -> Self {
        let mut doc = Self {
            width,
            height,
            body: String::new(),
        };
        doc.rect(0.0, 0.0, width as f64, height as f64, Color::WHITE, None);
        doc
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: Color, stroke: Option<(Color, f64)>) {
        self.body.push_str(&format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" {}{}/>"#,
            num(x),
            num(y),
            num(w),
            num(h),
            fill_attrs(fill),
            stroke_attrs(stroke)
        ));
        self.body.push('\n');
    }

    pub fn path(&mut self, d: &str, fill: Color, stroke: Option<(Color, f64)>) {
        self.body.push_str(&format!(
            r#"<path d="{}" {}{}/>"#,
            d,
            fill_attrs(fill),
            stroke_attrs(stroke)
        ));
        self.body.push('\n');
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: Color, stroke: Option<(Color, f64)>) {
        self.body.push_str(&format!(
            r#"<circle cx="{}" cy="{}" r="{}" {}{}/>"#,
            num(cx),
            num(cy),
            num(r),
            fill_attrs(fill),
            stroke_attrs(stroke)
        ));
        self.body.push('\n');
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: Color, width: f64) {
        self.body.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}"{}/>"#,
            num(x1),
            num(y1),
            num(x2),
            num(y2),
            stroke_attrs(Some((stroke, width)))
        ));
        self.body.push('\n');
    }

    /// Text anchored at `(x, y)`; `rotate` is in degrees around the anchor.
    pub fn text(&mut self, x: f64, y: f64, content: &str, style: TextStyle) {
        let transform = match style.rotate {
            Some(deg) => format!(r#" transform="rotate({} {} {})""#, num(deg), num(x), num(y)),
            None => String::new(),
        };
        self.body.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="{}" font-size="{}" text-anchor="{}" fill="{}"{}>{}</text>"#,
            num(x),
            num(y),
            FONT_FAMILY,
            num(style.size),
            style.anchor,
            style.color.to_hex_rgb(),
            transform,
            escape(content)
        ));
        self.body.push('\n');
    }

    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TextStyle {
    pub size: f64,
    pub anchor: &'static str,
    pub color: Color,
    pub rotate: Option<f64>,
}

impl TextStyle {
    pub fn new(size: f64) -> Self {
        Self {
            size,
            anchor: "start",
            color: Color::BLACK,
            rotate: None,
        }
    }

    pub fn anchor(mut self, anchor: &'static str) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn rotate(mut self, degrees: f64) -> Self {
        self.rotate = Some(degrees);
        self
    }
}

fn fill_attrs(fill: Color) -> String {
    if fill.a == 255 {
        format!(r#"fill="{}""#, fill.to_hex_rgb())
    } else {
        format!(
            r#"fill="{}" fill-opacity="{}""#,
            fill.to_hex_rgb(),
            num(fill.opacity())
        )
    }
}

fn stroke_attrs(stroke: Option<(Color, f64)>) -> String {
    match stroke {
        Some((color, width)) => format!(
            r#" stroke="{}" stroke-width="{}" stroke-linejoin="round""#,
            color.to_hex_rgb(),
            num(width)
        ),
        None => String::new(),
    }
}

/// Coordinates with at most three decimals and no trailing zeros.
pub(crate) fn num(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

pub(crate) fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
