//! `flux` command-line client: environment configuration, argument
//! parsing, a directory-backed download target, and the command
//! handlers that drive the sync orchestrator.

pub mod cli;
pub mod commands;
pub mod config;
pub mod save;
