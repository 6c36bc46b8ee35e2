//! Subcommand implementations, one module per `sparring` subcommand.

pub mod check;
pub mod compile;
pub mod run;
