use std::process::ExitCode;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use onboarding::config::OnboardingConfig;
use onboarding::dispatcher::TransactionDispatcher;
use onboarding::draft::RegistrationDraft;
use onboarding::provider::StaticDiscovery;
use onboarding::roles::{RoleId, RoleSchemaRegistry, USERNAME};
use onboarding::{ConfigError, FlowState, OnboardingError, SubmissionFlow};
use onboarding_simulator::{SimulatedWallet, SimulatorOptions};
use thiserror::Error;
use tracing::{info, warn};

use crate::render;
use crate::settings::{resolve_config, with_config_args};

/// Errors that abort a command before it produces output
#[derive(Debug, Error)]
pub enum CliError {
    /// The config could not be loaded or failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The onboarding library refused the request
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),
    /// Output could not be serialized
    #[error("Failed to serialize output as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn parse_role(value: &str) -> Result<RoleId, OnboardingError> {
    value.parse::<RoleId>()
}

fn parse_field(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{value}'")),
    }
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FORMAT")
        .help("Output format")
        .value_parser(["text", "json"])
        .default_value("text")
}

fn draft_args(command: Command, role_required: bool) -> Command {
    let roles = RoleId::ALL.map(|role| role.as_str()).join(", ");
    command
        .arg(
            Arg::new("role")
                .short('r')
                .long("role")
                .value_name("ROLE")
                .help(format!("Role to register as ({roles})"))
                .value_parser(parse_role)
                .required(role_required),
        )
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .value_name("NAME")
                .help("Username to register"),
        )
        .arg(
            Arg::new("field")
                .short('f')
                .long("field")
                .value_name("NAME=VALUE")
                .help("Role-specific field, repeatable")
                .value_parser(parse_field)
                .action(ArgAction::Append),
        )
}

fn draft_from(matches: &ArgMatches) -> RegistrationDraft {
    let mut draft = RegistrationDraft::new()
        .with_role(matches.get_one::<RoleId>("role").copied())
        .with_username(username_from(matches));
    for (name, value) in fields_from(matches) {
        draft = draft.with_field(name.as_str(), value.as_str());
    }
    draft
}

fn username_from(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("username")
        .map_or("", String::as_str)
}

fn fields_from(matches: &ArgMatches) -> impl Iterator<Item = &(String, String)> {
    matches
        .get_many::<(String, String)>("field")
        .into_iter()
        .flatten()
}

fn output_format(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("output")
        .map_or("text", String::as_str)
}

fn print_roles(matches: &ArgMatches) -> Result<ExitCode, CliError> {
    let registry = RoleSchemaRegistry::with_default_roles();
    match output_format(matches) {
        "json" => println!("{}", serde_json::to_string_pretty(&registry.schemas())?),
        _ => println!("{}", render::roles_text(&registry)),
    }
    Ok(ExitCode::SUCCESS)
}

fn encode(matches: &ArgMatches, config: &OnboardingConfig) -> Result<ExitCode, CliError> {
    let dispatcher = TransactionDispatcher::from_config(config)?;
    let draft = draft_from(matches);
    let missing = draft.missing_requirements();
    if !missing.is_empty() {
        return Err(OnboardingError::IncompleteForm(missing).into());
    }

    let call = dispatcher.build_call(&draft)?;
    info!(entry_point = %call.entry_point, "registration call encoded");
    match output_format(matches) {
        "json" => println!("{}", serde_json::to_string_pretty(&call)?),
        _ => println!("{}", render::call_text(&call)),
    }
    Ok(ExitCode::SUCCESS)
}

async fn register(matches: &ArgMatches, config: &OnboardingConfig) -> Result<ExitCode, CliError> {
    let wallet = Arc::new(SimulatedWallet::new(SimulatorOptions {
        chain_id: config.chain_id,
        grant_access: !matches.get_flag("deny-access"),
        approve_signatures: !matches.get_flag("reject-signature"),
        ..SimulatorOptions::default()
    }));
    let discovery = if matches.get_flag("no-provider") {
        StaticDiscovery::none()
    } else {
        wallet.injected()
    };

    let mut flow = SubmissionFlow::from_config(config, discovery)?;
    if let Err(err) = flow.connect_provider().await {
        warn!(%err, "continuing without a connected wallet");
    }
    if let Some(role) = matches.get_one::<RoleId>("role") {
        flow.select_role(role.as_str())?;
    }
    flow.edit_field(USERNAME, username_from(matches));
    for (name, value) in fields_from(matches) {
        flow.edit_field(name, value.as_str());
    }

    let terminal = flow.submit().await;
    println!("{}", serde_json::to_string_pretty(&flow.snapshot())?);
    Ok(match terminal {
        FlowState::Succeeded { .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// app cli
pub struct Cli;
impl Cli {
    /// The full command tree
    #[must_use]
    pub fn command() -> Command {
        let roles = Command::new("roles")
            .about("List the roles a wallet can register as")
            .arg(output_arg());
        let encode = draft_args(
            Command::new("encode")
                .about("Encode a registration call without sending it")
                .arg(output_arg()),
            true,
        );
        let register = draft_args(
            Command::new("register")
                .about("Run a registration against the local wallet simulator and print the final state"),
            false,
        )
        .arg(
            Arg::new("deny-access")
                .long("deny-access")
                .help("Simulated wallet refuses account access")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("reject-signature")
                .long("reject-signature")
                .help("Simulated wallet refuses to sign")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-provider")
                .long("no-provider")
                .help("Run as if no wallet were installed")
                .action(ArgAction::SetTrue),
        );

        with_config_args(
            Command::new("onboarding-registration")
                .version("1.0")
                .about("Registers wallets as healthcare participants on the user registration contract")
                .subcommand_required(true)
                .subcommand(roles)
                .subcommand(encode)
                .subcommand(register),
        )
    }

    /// start the registration cli
    pub async fn execute() -> ExitCode {
        let matches = Self::command().get_matches();
        match Self::run(&matches).await {
            Ok(code) => code,
            Err(err) => {
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
        }
    }

    /// Dispatches parsed arguments to the selected subcommand
    pub async fn run(matches: &ArgMatches) -> Result<ExitCode, CliError> {
        match matches.subcommand() {
            Some(("roles", sub)) => print_roles(sub),
            Some(("encode", sub)) => encode(sub, &resolve_config(sub)?),
            Some(("register", sub)) => register(sub, &resolve_config(sub)?).await,
            _ => {
                eprintln!("Error: missing subcommand");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
