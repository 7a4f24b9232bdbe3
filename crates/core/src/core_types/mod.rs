//! Core types and utilities

pub mod fire;
pub mod geo;
pub mod psi;
pub mod units;
pub mod wind;

pub use fire::*;
pub use geo::GeoPoint;
pub use psi::*;
pub use units::*;
pub use wind::*;
