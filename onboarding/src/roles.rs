use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::OnboardingError;

/// Name of the argument every entry point takes first
pub const USERNAME: &str = "username";

/// Organizational roles a wallet can register as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleId {
    Patient,
    Hospital,
    Pharmacy,
    Supplier,
}

impl RoleId {
    pub const ALL: [RoleId; 4] = [
        RoleId::Patient,
        RoleId::Hospital,
        RoleId::Pharmacy,
        RoleId::Supplier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleId::Patient => "Patient",
            RoleId::Hospital => "Hospital",
            RoleId::Pharmacy => "Pharmacy",
            RoleId::Supplier => "Supplier",
        }
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleId {
    type Err = OnboardingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(RoleId::Patient),
            "hospital" => Ok(RoleId::Hospital),
            "pharmacy" => Ok(RoleId::Pharmacy),
            "supplier" => Ok(RoleId::Supplier),
            _ => Err(OnboardingError::UnknownRole(s.to_string())),
        }
    }
}

/// One role-specific input on the registration form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    pub prompt: String,
    /// Shown as optional on the form. Not enforced: only role and username are required.
    pub optional: bool,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            optional: true,
        }
    }
}

/// Maps a role to the contract entry point it registers through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSchema {
    pub role: RoleId,
    pub entry_point: String,
    /// Role-specific fields in positional order, after the username
    pub fields: Vec<FieldSpec>,
}

impl RoleSchema {
    pub fn new(role: RoleId, entry_point: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            role,
            entry_point: entry_point.into(),
            fields,
        }
    }

    /// Positional argument names for the entry point, username first
    pub fn argument_order(&self) -> Vec<&str> {
        std::iter::once(USERNAME)
            .chain(self.fields.iter().map(|f| f.name.as_str()))
            .collect()
    }

    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }
}

/// Immutable lookup from role to schema
///
/// Built once through [`RoleSchemaRegistryBuilder`] and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RoleSchemaRegistry {
    schemas: HashMap<RoleId, RoleSchema>,
}

impl RoleSchemaRegistry {
    /// Registry with the four built-in roles
    pub fn with_default_roles() -> Self {
        RoleSchemaRegistryBuilder::with_default_roles().build()
    }

    pub fn schema_for(&self, role: RoleId) -> Result<&RoleSchema, OnboardingError> {
        self.schemas
            .get(&role)
            .ok_or_else(|| OnboardingError::UnknownRole(role.to_string()))
    }

    /// Registered schemas ordered by role
    pub fn schemas(&self) -> Vec<&RoleSchema> {
        let mut schemas: Vec<&RoleSchema> = self.schemas.values().collect();
        schemas.sort_by_key(|s| s.role);
        schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Default for RoleSchemaRegistry {
    fn default() -> Self {
        RoleSchemaRegistryBuilder::default().build()
    }
}

/// Mutable builder used during setup. Call `build()` once all roles are registered.
#[derive(Debug, Default)]
pub struct RoleSchemaRegistryBuilder {
    schemas: HashMap<RoleId, RoleSchema>,
}

impl RoleSchemaRegistryBuilder {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    pub fn with_default_roles() -> Self {
        let mut builder = Self::new();
        register_default_roles(&mut builder);
        builder
    }

    /// Registers a schema, returning the one it replaced if the role was already present
    pub fn register(&mut self, schema: RoleSchema) -> Option<RoleSchema> {
        self.schemas.insert(schema.role, schema)
    }

    pub fn build(self) -> RoleSchemaRegistry {
        RoleSchemaRegistry {
            schemas: self.schemas,
        }
    }
}

fn register_default_roles(builder: &mut RoleSchemaRegistryBuilder) {
    builder.register(RoleSchema::new(
        RoleId::Patient,
        "registerPatient",
        vec![FieldSpec::optional(
            "medicalHistory",
            "Enter your medical history (optional)",
        )],
    ));
    builder.register(RoleSchema::new(
        RoleId::Hospital,
        "registerHospital",
        vec![
            FieldSpec::required("licenseNumber", "Enter your hospital license number"),
            FieldSpec::optional("location", "Enter your hospital location (optional)"),
        ],
    ));
    builder.register(RoleSchema::new(
        RoleId::Pharmacy,
        "registerPharmacy",
        vec![
            FieldSpec::required("licenseNumber", "Enter your pharmacy license number"),
            FieldSpec::required("address", "Enter your pharmacy address"),
        ],
    ));
    builder.register(RoleSchema::new(
        RoleId::Supplier,
        "registerSupplier",
        vec![
            FieldSpec::required("companyName", "Enter your supplier company name"),
            FieldSpec::required("contactInfo", "Enter your supplier contact information"),
        ],
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_argument_orders() {
        let registry = RoleSchemaRegistry::with_default_roles();
        let expected: [(RoleId, &str, Vec<&str>); 4] = [
            (
                RoleId::Patient,
                "registerPatient",
                vec!["username", "medicalHistory"],
            ),
            (
                RoleId::Hospital,
                "registerHospital",
                vec!["username", "licenseNumber", "location"],
            ),
            (
                RoleId::Pharmacy,
                "registerPharmacy",
                vec!["username", "licenseNumber", "address"],
            ),
            (
                RoleId::Supplier,
                "registerSupplier",
                vec!["username", "companyName", "contactInfo"],
            ),
        ];

        for (role, entry_point, order) in expected {
            let schema = registry.schema_for(role).unwrap();
            assert_eq!(schema.entry_point, entry_point);
            assert_eq!(schema.argument_order(), order);
            assert_eq!(schema.argument_order()[0], USERNAME);
        }
    }

    #[test]
    fn test_every_role_has_a_schema() {
        let registry = RoleSchemaRegistry::with_default_roles();
        assert_eq!(registry.len(), RoleId::ALL.len());
        for role in RoleId::ALL {
            assert!(registry.schema_for(role).is_ok(), "missing schema for {role}");
        }
    }

    #[test]
    fn test_empty_registry_reports_unknown_role() {
        let registry = RoleSchemaRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(
            registry.schema_for(RoleId::Pharmacy).unwrap_err(),
            OnboardingError::UnknownRole("Pharmacy".to_string())
        );
    }

    #[test]
    fn test_builder_register_returns_old() {
        let mut builder = RoleSchemaRegistryBuilder::new();
        let old = builder.register(RoleSchema::new(RoleId::Patient, "registerPatient", vec![]));
        assert!(old.is_none());

        let old = builder.register(RoleSchema::new(RoleId::Patient, "enrollPatient", vec![]));
        assert_eq!(old.unwrap().entry_point, "registerPatient");

        let registry = builder.build();
        assert_eq!(
            registry.schema_for(RoleId::Patient).unwrap().entry_point,
            "enrollPatient"
        );
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Patient".parse::<RoleId>().unwrap(), RoleId::Patient);
        assert_eq!("hospital".parse::<RoleId>().unwrap(), RoleId::Hospital);
        assert_eq!(" SUPPLIER ".parse::<RoleId>().unwrap(), RoleId::Supplier);
        assert_eq!(
            "Doctor".parse::<RoleId>().unwrap_err(),
            OnboardingError::UnknownRole("Doctor".to_string())
        );
    }

    #[test]
    fn test_schemas_are_ordered_by_role() {
        let registry = RoleSchemaRegistry::with_default_roles();
        let roles: Vec<RoleId> = registry.schemas().iter().map(|s| s.role).collect();
        assert_eq!(roles, RoleId::ALL.to_vec());
    }

    #[test]
    fn test_declares() {
        let registry = RoleSchemaRegistry::with_default_roles();
        let hospital = registry.schema_for(RoleId::Hospital).unwrap();
        assert!(hospital.declares("location"));
        assert!(!hospital.declares("medicalHistory"));
        assert!(!hospital.declares(USERNAME));
    }
}
