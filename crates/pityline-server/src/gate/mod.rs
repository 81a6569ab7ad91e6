pub mod classifier;
pub mod controller;

pub use classifier::{classify, PathClass};
pub use controller::{decide, GateDecision};
