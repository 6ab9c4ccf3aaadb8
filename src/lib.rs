// src/lib.rs

#[macro_use]
pub mod macros;

pub mod cli;
pub mod config;
pub mod core;
pub mod specs;

pub mod csv;
pub mod data;
pub mod delta;
pub mod error;
pub mod file;
pub mod log;
pub mod poller;
pub mod sink;
pub mod source;
pub mod store;
