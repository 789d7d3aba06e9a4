//! Terminal controller, export client and command-line interface
//!
//! This crate provides the `slowjog` binary: the interactive timer with its
//! metronome and session records, and the `server` subcommand that runs the
//! Google Calendar export server.

pub mod audio;
pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod secret;

pub use cli::Cli;
pub use controller::{Controller, ExportNotice, Input, Reaction};
pub use error::{ClientError, ClientResult};
pub use export::ExportClient;
