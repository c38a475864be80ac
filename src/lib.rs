//! Pattern-driven link, copy and post-command workflows.
//!
//! A configuration holds an ordered list of rules. Each rule discovers
//! files or directories under a base directory through glob, regex,
//! explicit-path and ignore-rules patterns, materializes them under a
//! target directory as symbolic links, hard links or copies, adjusts their
//! permissions, and finally runs an optional post-command.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: load and validate TOML rules
//! - **[`discovery`]**: evaluate search patterns against a directory tree
//! - **[`resources`]**: link/copy creation, attribute adjustment, post-commands
//! - **[`workflow`]**: run rules with per-item failure isolation
//! - **[`commands`]**: top-level subcommand handlers (`run`, `discover`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod logging;
pub mod resources;
pub mod workflow;

pub use discovery::discover;
pub use resources::attributes::adjust_attributes;
pub use resources::command::execute_command;
pub use resources::link::create_link;
pub use workflow::run_workflow;
