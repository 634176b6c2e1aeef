use std::path::Path;
use std::time::Duration;

use alloy_primitives::{Address, address};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// First contract deployed by the default account on a local development chain
pub const DEFAULT_CONTRACT_ADDRESS: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
pub const DEFAULT_CHAIN_ID: u64 = 31337;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;

/// Static deployment settings for the registration contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OnboardingConfig {
    pub contract_address: Address,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            chain_id: DEFAULT_CHAIN_ID,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        }
    }
}

impl OnboardingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "confirmationTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.contract_address == Address::ZERO {
            return Err(ConfigError::Invalid(
                "contractAddress must not be the zero address".to_string(),
            ));
        }
        Ok(())
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OnboardingConfig::default();
        config.validate().unwrap();
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_minimal() {
        let config = OnboardingConfig::from_json_str(
            r#"{"contractAddress": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"}"#,
        )
        .unwrap();
        assert_eq!(
            config.contract_address,
            address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512")
        );
        assert_eq!(config.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(
            config.confirmation_timeout_secs,
            DEFAULT_CONFIRMATION_TIMEOUT_SECS
        );
    }

    #[test]
    fn test_parse_full() {
        let config = OnboardingConfig::from_json_str(
            r#"{
                "contractAddress": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512",
                "chainId": 11155111,
                "confirmationTimeoutSecs": 30
            }"#,
        )
        .unwrap();
        assert_eq!(config.chain_id, 11155111);
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = OnboardingConfig::from_json_str(
            r#"{"contractAddress": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512", "confirmationTimeoutSecs": 0}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = OnboardingConfig::from_json_str(
            r#"{"contractAddress": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512", "rpcUrl": "x"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = OnboardingConfig::from_file("/nonexistent/onboarding.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
