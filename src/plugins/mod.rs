//! Depot subsystems.

pub mod bays;
pub mod history;
pub mod persistence;
pub mod scenario;
pub mod shadow;
