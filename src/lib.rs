//! roll generates opinionated Rails applications.
//! A run is an ordered list of named steps, each made of primitive file
//! operations and external commands, executed against a fresh application tree.

/// File operations layer: copy, render, inject, replace and friends
pub mod actions;

/// Command-line interface module for the roll application
pub mod cli;

/// Configuration handling
/// Supports JSON and YAML formats (roll.json, roll.yml, roll.yaml)
pub mod config;

pub mod constants;

/// Error types and handling for the roll application
pub mod error;

pub mod logger;

/// Options resolved once per run and read by guards and steps
pub mod options;

/// Sequential step execution with an execution log
pub mod pipeline;

/// The concrete Rails recipe
pub mod recipe;

/// Named step lookup and pre-run validation
pub mod registry;

/// Template rendering backed by MiniJinja
pub mod renderer;

pub mod secret;

/// External process execution
pub mod shell;

pub mod step;

/// Read-only template repositories
pub mod store;
