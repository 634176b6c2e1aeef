use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::sol;
use tracing::error;

use crate::errors::OnboardingError;
use crate::provider::ContractCall;
use crate::roles::RoleSchemaRegistry;

/// ABI of the deployed user registration contract
pub const USER_REGISTRATION_ABI: &str = include_str!("../abi/UserRegistration.json");

sol! {
    #[sol(all_derives)]
    interface IUserRegistration {
        function registerPatient(string username, string medicalHistory) external;
        function registerHospital(string username, string licenseNumber, string location) external;
        function registerPharmacy(string username, string licenseNumber, string postalAddress) external;
        function registerSupplier(string username, string companyName, string contactInfo) external;

        event UserRegistered(address indexed account, string role, string username);
    }
}

/// Deployed contract address together with its ABI
#[derive(Debug, Clone)]
pub struct ContractInterface {
    address: Address,
    abi: JsonAbi,
}

impl ContractInterface {
    pub fn from_json(address: Address, abi_json: &str) -> Result<Self, OnboardingError> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| OnboardingError::Contract(format!("invalid ABI: {e}")))?;
        Ok(Self { address, abi })
    }

    pub fn user_registration(address: Address) -> Result<Self, OnboardingError> {
        Self::from_json(address, USER_REGISTRATION_ABI)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Looks up the overload of `entry_point` taking `arity` string arguments
    fn function(&self, entry_point: &str, arity: usize) -> Result<&Function, OnboardingError> {
        let overloads = self.abi.function(entry_point).ok_or_else(|| {
            OnboardingError::Contract(format!("entry point '{entry_point}' not found in ABI"))
        })?;
        overloads
            .iter()
            .find(|f| f.inputs.len() == arity && f.inputs.iter().all(|p| p.ty == "string"))
            .ok_or_else(|| {
                OnboardingError::Contract(format!(
                    "entry point '{entry_point}' does not take {arity} string arguments"
                ))
            })
    }

    /// Builds the call for `entry_point` with positional string arguments
    pub fn encode_call(
        &self,
        entry_point: &str,
        args: Vec<String>,
    ) -> Result<ContractCall, OnboardingError> {
        let function = self.function(entry_point, args.len())?;
        let values: Vec<DynSolValue> = args.iter().cloned().map(DynSolValue::String).collect();
        let calldata = function
            .abi_encode_input(&values)
            .map_err(|e| OnboardingError::Contract(format!("failed to encode {entry_point}: {e}")))?;

        Ok(ContractCall {
            contract: self.address,
            entry_point: entry_point.to_string(),
            args,
            calldata: Bytes::from(calldata),
        })
    }

    /// Checks that every role's entry point exists with a matching argument list
    pub fn verify(&self, registry: &RoleSchemaRegistry) -> Result<(), OnboardingError> {
        for schema in registry.schemas() {
            let arity = schema.argument_order().len();
            if let Err(err) = self.function(&schema.entry_point, arity) {
                error!(role = %schema.role, %err, "role schema does not match contract ABI");
                return Err(err);
            }
        }
        Ok(())
    }
}
