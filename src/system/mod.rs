//! # System Interaction Layer
//!
//! This module is the boundary between the plan logic and the operating system.
//!
//! ## Modules
//!
//! - **`shell`**: Owns the persistent shell subprocess. It frames every command with a
//!   sentinel, collects its stdout, stderr and exit code, and restarts the session after
//!   it dies.
//! - **`shells_config`**: Handles the loading and parsing of the `shells.toml` file, which
//!   defines the program and arguments used to launch each shell kind.

pub mod shell;
pub mod shells_config;
