//! Parameter-bag and request ingestion: JSON files and piped stdin.

pub mod file;
pub mod stdin;
