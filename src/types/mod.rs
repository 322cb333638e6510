//! Core types for fiber segmentation.

pub mod point;
pub mod polyline;
pub mod bundle;
pub mod assignment;

pub use point::Point3;
pub use polyline::{EmptyPolylineError, Polyline};
pub use bundle::Bundle;
pub use assignment::{Assignment, FiberState, LabelId};
