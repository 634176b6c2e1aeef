//! Role-based onboarding: wallet connection, role schemas, and registration dispatch.
//!
//! The pieces, leaf first:
//! - [`provider::ProviderAdapter`] owns the connection to a [`provider::SigningProvider`]
//! - [`roles::RoleSchemaRegistry`] maps each [`roles::RoleId`] to a contract entry point
//! - [`draft::FormController`] holds the [`draft::RegistrationDraft`] being edited
//! - [`dispatcher::TransactionDispatcher`] encodes, sends and confirms the registration
//! - [`flow::SubmissionFlow`] sequences all of the above as an observable state machine
pub mod abi;
pub mod config;
pub mod dispatcher;
pub mod draft;
pub mod errors;
pub mod flow;
pub mod provider;
pub mod roles;
pub mod test_utils;

pub use errors::{ConfigError, ErrorKind, OnboardingError, ProviderError};
pub use flow::{FlowSnapshot, FlowState, SubmissionFlow};
