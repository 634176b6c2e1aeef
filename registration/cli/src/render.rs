use std::fmt::Write as _;

use onboarding::provider::ContractCall;
use onboarding::roles::{RoleSchema, RoleSchemaRegistry};

/// One line per role: `Role: entryPoint(arg, optionalArg?)`
#[must_use]
pub fn roles_text(registry: &RoleSchemaRegistry) -> String {
    registry
        .schemas()
        .into_iter()
        .map(role_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn role_line(schema: &RoleSchema) -> String {
    let args = std::iter::once(onboarding::roles::USERNAME.to_string())
        .chain(schema.fields.iter().map(|field| {
            if field.optional {
                format!("{}?", field.name)
            } else {
                field.name.clone()
            }
        }))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}: {}({args})", schema.role, schema.entry_point)
}

/// Aligned key/value view of an encoded call
#[must_use]
pub fn call_text(call: &ContractCall) -> String {
    let selector = call.calldata.get(..4).map(hex::encode).unwrap_or_default();
    let mut out = String::new();
    let _ = writeln!(out, "contract:    {}", call.contract);
    let _ = writeln!(out, "entry point: {}", call.entry_point);
    let _ = writeln!(out, "arguments:   {:?}", call.args);
    let _ = writeln!(out, "selector:    0x{selector}");
    let _ = write!(out, "calldata:    {}", call.calldata);
    out
}
