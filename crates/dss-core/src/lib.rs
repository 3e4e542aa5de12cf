//! dss-core: stable foundation for dsstap.
//!
//! Contains:
//! - class (element classes and element references)
//! - reading (fixed-shape phased results)
//! - property (engine property values)
//! - numeric (engine array helpers)
//! - units (uom SI time types + constructors)
//! - error (shared error types)

pub mod class;
pub mod error;
pub mod numeric;
pub mod property;
pub mod reading;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use class::{ElementClass, ElementRef};
pub use error::{DssError, DssResult};
pub use numeric::*;
pub use property::PropertyValue;
pub use reading::Reading;
pub use units::*;
