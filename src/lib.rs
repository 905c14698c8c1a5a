//! Crucible - An extensible command shell
//!
//! This library provides the core functionality for the Crucible shell,
//! including command dispatch, runtime plugin loading, and the sandboxed
//! script engine.
//!
//! # Modules
//!
//! - [`registry`]: Command and plugin bookkeeping
//! - [`commands`]: The `Command` trait and the built-in command set
//! - [`plugins`]: Native and script plugin loading
//! - [`engine`]: Sandboxed Lua interpreter
//! - [`shell`]: Subprocess execution with captured output
//! - [`config`]: Configuration management
//! - [`repl`]: The interactive input loop

pub mod commands;
pub mod config;
pub mod engine;
pub mod plugins;
pub mod registry;
pub mod repl;
pub mod shell;
