//! Command-line client for Ocean-style data exchange nodes.
//!
//! The binary wires [`catalog::build_registry`], a [`commands::CommandRunner`]
//! and the terminal into a [`dispatcher::Dispatcher`].

pub mod addresses;
pub mod catalog;
pub mod chain;
pub mod commands;
pub mod compute;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod input;
pub mod node;
pub mod registry;
pub mod session;
