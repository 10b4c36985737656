pub mod classifier;
pub mod gate;
pub mod hooks;
pub mod scorer;
pub mod trust;
pub mod types;
pub mod verification;

pub use gate::{GateDecision, VeraGate};
