//! Glassbox CLI
//!
//! Command-line interface for running display-server sessions and
//! inspecting the resources they would use.

pub mod commands;
pub mod output;
