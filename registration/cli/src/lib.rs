//! Onboarding registration CLI
#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::unwrap_used)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

/// Command-line interface functionality and types.
pub mod cli;
pub mod logger;
/// Text and JSON rendering of roles and contract calls.
pub mod render;
/// Resolution of the onboarding config from file, flags and environment.
pub mod settings;
