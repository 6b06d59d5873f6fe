//! Helpers for tests and dry runs that need an oracle without a network.

pub mod sim_oracle;

pub use sim_oracle::{EpochSchedule, SimStream, SimulatedOracle};
