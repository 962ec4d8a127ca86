//! Simple cli for tracking how long you've worked today and which projects
//! the time went to. A master counter and per-project counters advance
//! independently from stored timestamps, so the engine keeps reconciling them
//! and rebuilds a session timeline from project switches.
//!

pub mod cli;
pub mod engine;
pub mod storage;
pub mod utils;
