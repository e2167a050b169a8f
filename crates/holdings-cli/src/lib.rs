//! `holdings` command-line front end.

pub mod cli;
mod logging;
mod report;

pub use report::{JsonReport, TextReport};
