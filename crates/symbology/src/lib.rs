//! Map styling for field reports.
//!
//! Styles are chosen by [`MapType`], resolved against attribute values into
//! a [`StylePlan`], and handed to a [`MapRenderer`] as part of a [`MapJob`].

pub mod error;
pub mod job;
pub mod options;
pub mod style;

pub use error::{Result, SymbologyError};
pub use job::{JobFileRenderer, MapJob, MapRenderer};
pub use options::{LabelPlacement, RenderOptions};
pub use style::{
    categorize, category_color, fill_qml_template, graduate, red_yellow_green, Category,
    ClassRange, MapStyle, MapType, StylePlan, DEFAULT_CLASSES,
};
