//! CLI Commands

pub mod config;
pub mod display;
pub mod platform;
pub mod port;
pub mod run;
