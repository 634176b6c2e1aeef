use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::errors::OnboardingError;
use crate::provider::ConnectionState;
use crate::roles::{RoleId, RoleSchema, USERNAME};

/// In-progress registration data.
///
/// A draft is a value: every edit produces a new draft and leaves the old one untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    role: Option<RoleId>,
    username: String,
    fields: BTreeMap<String, String>,
}

impl RegistrationDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self) -> Option<RoleId> {
        self.role
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn with_role(&self, role: Option<RoleId>) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }

    pub fn with_username(&self, username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..self.clone()
        }
    }

    pub fn with_field(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(name.into(), value.into());
        Self {
            fields,
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the required inputs this draft is still missing
    pub fn missing_requirements(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.role.is_none() {
            missing.push("role".to_string());
        }
        if self.username.trim().is_empty() {
            missing.push(USERNAME.to_string());
        }
        missing
    }

    /// Positional entry point arguments for `schema`.
    ///
    /// Only fields the schema declares are read; absent keys become empty strings.
    pub fn arguments_for(&self, schema: &RoleSchema) -> Vec<String> {
        std::iter::once(self.username.clone())
            .chain(
                schema
                    .fields
                    .iter()
                    .map(|f| self.field(&f.name).unwrap_or_default().to_string()),
            )
            .collect()
    }
}

/// Holds the current draft and gates submission on the shared connection state
#[derive(Debug)]
pub struct FormController {
    draft: RegistrationDraft,
    connection: watch::Receiver<ConnectionState>,
}

impl FormController {
    pub fn new(connection: watch::Receiver<ConnectionState>) -> Self {
        Self {
            draft: RegistrationDraft::new(),
            connection,
        }
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    pub fn set_role(&mut self, role: Option<RoleId>) {
        debug!(?role, "role selected");
        self.draft = self.draft.with_role(role);
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.draft = self.draft.with_username(username);
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.draft = self.draft.with_field(name, value);
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn is_submittable(&self) -> bool {
        self.validate().is_ok()
    }

    /// Checks the submission invariant: connected, role chosen, username present
    pub fn validate(&self) -> Result<(), OnboardingError> {
        if self.connection_state() != ConnectionState::Connected {
            return Err(OnboardingError::NotConnected);
        }
        let missing = self.draft.missing_requirements();
        if !missing.is_empty() {
            return Err(OnboardingError::IncompleteForm(missing));
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        debug!("registration draft reset");
        self.draft = RegistrationDraft::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleSchemaRegistry;
    use pretty_assertions::assert_eq;

    fn controller(state: ConnectionState) -> (watch::Sender<ConnectionState>, FormController) {
        let (tx, rx) = watch::channel(state);
        (tx, FormController::new(rx))
    }

    #[test]
    fn test_edits_do_not_mutate_previous_draft() {
        let draft = RegistrationDraft::new();
        let edited = draft
            .with_role(Some(RoleId::Patient))
            .with_username("alice")
            .with_field("medicalHistory", "asthma");

        assert!(draft.is_empty());
        assert_eq!(edited.role(), Some(RoleId::Patient));
        assert_eq!(edited.username(), "alice");
        assert_eq!(edited.field("medicalHistory"), Some("asthma"));
    }

    #[test]
    fn test_submittable_requires_role_username_and_connection() {
        let (_tx, mut form) = controller(ConnectionState::Connected);
        assert!(!form.is_submittable());

        form.set_role(Some(RoleId::Hospital));
        assert!(!form.is_submittable());

        form.set_username("st-mary");
        assert!(form.is_submittable());

        form.set_role(None);
        assert!(!form.is_submittable());
    }

    #[test]
    fn test_submittable_ignores_optional_fields() {
        let (_tx, mut form) = controller(ConnectionState::Connected);
        form.set_role(Some(RoleId::Supplier));
        form.set_username("acme");
        assert!(form.is_submittable());

        form.set_field("companyName", "Acme Ltd");
        assert!(form.is_submittable());
    }

    #[test]
    fn test_disconnected_is_never_submittable() {
        let (tx, mut form) = controller(ConnectionState::Disconnected);
        form.set_role(Some(RoleId::Patient));
        form.set_username("alice");
        assert!(!form.is_submittable());
        assert_eq!(form.validate().unwrap_err(), OnboardingError::NotConnected);

        tx.send_replace(ConnectionState::Connected);
        assert!(form.is_submittable());
    }

    #[test]
    fn test_whitespace_username_is_missing() {
        let (_tx, mut form) = controller(ConnectionState::Connected);
        form.set_role(Some(RoleId::Patient));
        form.set_username("   ");
        assert_eq!(
            form.validate().unwrap_err(),
            OnboardingError::IncompleteForm(vec!["username".to_string()])
        );
    }

    #[test]
    fn test_empty_role_reported_as_incomplete() {
        let (_tx, mut form) = controller(ConnectionState::Connected);
        form.set_username("bob");
        assert_eq!(
            form.validate().unwrap_err(),
            OnboardingError::IncompleteForm(vec!["role".to_string()])
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let (_tx, mut form) = controller(ConnectionState::Connected);
        form.set_role(Some(RoleId::Pharmacy));
        form.set_username("corner-pharmacy");
        form.set_field("address", "1 Main St");
        form.reset();
        assert!(form.draft().is_empty());
    }

    #[test]
    fn test_arguments_read_only_declared_fields() {
        let registry = RoleSchemaRegistry::with_default_roles();
        let draft = RegistrationDraft::new()
            .with_role(Some(RoleId::Patient))
            .with_username("alice")
            .with_field("medicalHistory", "none")
            .with_field("licenseNumber", "H-1");

        let args = draft.arguments_for(registry.schema_for(RoleId::Supplier).unwrap());
        assert_eq!(args, vec!["alice", "", ""]);

        let args = draft.arguments_for(registry.schema_for(RoleId::Patient).unwrap());
        assert_eq!(args, vec!["alice", "none"]);
    }
}
