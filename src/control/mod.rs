//! Fill control: coast-distance model and the fill-cycle state machine.

pub mod fill;
pub mod shutoff;
