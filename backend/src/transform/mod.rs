//! Transformation module.
//!
//! This module turns import file lines into profile updates:
//! - Coerce: Raw cell to typed property value
//! - Line split: One line to one profile update
//! - Pipeline: Whole import jobs

pub mod coerce;
pub mod line_split;
pub mod pipeline;

pub use coerce::{coerce, parse_boolean, CoercionError};
pub use line_split::{transform_line, LineOutcome, LineSplitProcessor};
pub use pipeline::*;
