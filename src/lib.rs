// ABOUTME: Library module for postgres-mirror
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod archive;
pub mod commands;
pub mod config;
pub mod deploy;
pub mod dump;
pub mod interactive;
pub mod migration;
pub mod postgres;
pub mod utils;
