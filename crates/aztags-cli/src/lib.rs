//! Command-line front end for aztags: argument parsing, the `az` client,
//! the tag support download and terminal output.

pub mod azcli;
pub mod capability;
pub mod cli;
pub mod commands;
pub mod observability;
pub mod output;
