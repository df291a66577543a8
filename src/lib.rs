//! # happl3
//!
//! Steps an operator through a plan of shell commands, runs the selected ones in a single
//! persistent shell session and durably tracks the outcome of every command across restarts.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod state;
pub mod system;
