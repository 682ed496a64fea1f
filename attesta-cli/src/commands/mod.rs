//! Subcommand implementations.

pub mod audit;
pub mod capture;
pub mod hash;
pub mod verify;
