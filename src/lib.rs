//! lanewatch library crate.
//!
//! Lane detection over a live camera feed: a shared capture source
//! ([`camera`]), the detection chain ([`vision`]), the raw and processed
//! stream loops with their UI hand-off ([`stream`]), configuration
//! ([`config`]) and the command-line front end ([`cli`]).

pub mod camera;
pub mod cli;
pub mod config;
pub mod stream;
pub mod vision;
