// ABOUTME: Target registry module - tracks engagement pressure per target.
// ABOUTME: Keeps the fleet from piling onto one trend or entity past its saturation cap.

mod targets;

pub use targets::{Candidate, TargetCategory, TargetId, TargetRegistry};

#[cfg(test)]
mod targets_test;
