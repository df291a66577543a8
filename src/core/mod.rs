// src/core/mod.rs

pub mod batch_executor;
pub mod fingerprint;
pub mod index_manager;
pub mod paths;
pub mod plan_loader;
pub mod run_log;
pub mod selection;
