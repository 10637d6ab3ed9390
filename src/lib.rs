//! Pokedex CLI Library
//!
//! This crate exposes the response cache, the PokéAPI client, the REPL
//! commands and the CLI configuration for use by the binary and integration tests.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod data;
pub mod repl;
