//! Command-line entry point for SnapHound searches.

pub mod cli;
pub mod dispatch;
