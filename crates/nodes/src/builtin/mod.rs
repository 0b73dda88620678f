//! Built-in vessels shipped with the engine.

pub mod basic;
pub mod math;

use crate::vessel::Vessel;

/// Every built-in vessel, ready to be registered.
pub fn vessels() -> Vec<Vessel> {
    vec![basic::vessel(), math::vessel()]
}
