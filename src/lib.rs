//! Scans Python source trees for functions and record types and renders them
//! as a deterministic Markdown report.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
