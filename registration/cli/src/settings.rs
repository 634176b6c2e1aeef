use std::path::PathBuf;

use alloy_primitives::Address;
use clap::{Arg, ArgMatches, Command};
use onboarding::ConfigError;
use onboarding::config::OnboardingConfig;

/// Environment variable overriding the registration contract address
pub const CONTRACT_ENV: &str = "ONBOARDING_CONTRACT";
/// Environment variable overriding the chain id
pub const CHAIN_ID_ENV: &str = "ONBOARDING_CHAIN_ID";

fn parse_address(value: &str) -> Result<Address, String> {
    value
        .parse::<Address>()
        .map_err(|err| format!("invalid address '{value}': {err}"))
}

/// Adds the config flags shared by every subcommand
#[must_use]
pub fn with_config_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("JSON config file (contractAddress, chainId, confirmationTimeoutSecs)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("contract")
                .long("contract")
                .value_name("ADDRESS")
                .help("Registration contract address")
                .env(CONTRACT_ENV)
                .value_parser(parse_address)
                .global(true),
        )
        .arg(
            Arg::new("chain-id")
                .long("chain-id")
                .value_name("ID")
                .help("Chain id the simulator signs for")
                .env(CHAIN_ID_ENV)
                .value_parser(clap::value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .value_name("SECONDS")
                .help("How long to wait for confirmation")
                .value_parser(clap::value_parser!(u64))
                .global(true),
        )
}

/// Loads the config file if given, then applies flag and environment overrides.
///
/// Precedence: flag, environment, file, built-in default.
pub fn resolve_config(matches: &ArgMatches) -> Result<OnboardingConfig, ConfigError> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => OnboardingConfig::from_file(path)?,
        None => OnboardingConfig::default(),
    };
    if let Some(address) = matches.get_one::<Address>("contract") {
        config.contract_address = *address;
    }
    if let Some(chain_id) = matches.get_one::<u64>("chain-id") {
        config.chain_id = *chain_id;
    }
    if let Some(secs) = matches.get_one::<u64>("timeout-secs") {
        config.confirmation_timeout_secs = *secs;
    }
    config.validate()?;
    Ok(config)
}
