//! Wrappers around the external tools the synchronizer shells out to.

pub mod covers;
pub mod probe;

pub use covers::{CoverGenerator, CoverGeneratorConfig};
pub use probe::{CommandProbe, CommandProbeConfig, DurationProbe, ProbeError};
