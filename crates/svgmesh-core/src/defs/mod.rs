//! Paint server and mask definitions
//!
//! Definitions are parsed once per conversion from the expanded document and
//! then shared read-only by every shape that references them.

pub mod gradient;
pub mod mask;

pub use gradient::{ColorStop, GradientAxis, GradientDefinition, normalize_stops, parse_gradients};
pub use mask::{MaskDefinition, MaskGeometry, MaskShape, MaskUnits, Region, parse_masks};
