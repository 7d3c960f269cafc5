//! Shared plumbing for the depot shadow: errors, config, storage, output.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod output;
pub mod schemas;
pub mod time;
pub mod workspace;
