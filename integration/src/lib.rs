//! Utilities for integration tests
#![forbid(unsafe_code)]
#![deny(clippy::all)] // don't deny unwraps for integration testing
#![warn(missing_docs, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc
)]

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use futures::future::FutureExt;
use onboarding::SubmissionFlow;
use onboarding::config::OnboardingConfig;
use onboarding_simulator::{SimulatedWallet, SimulatorOptions, dev_accounts};

/// Arguments passed to the `test` function in [`Builder::execute`].
pub struct TestArgs {
    /// The coordinator under test, wired to the simulated wallet
    pub flow: SubmissionFlow,
    /// The simulated wallet and chain, for scripting account changes and inspecting state
    pub wallet: Arc<SimulatedWallet>,
}

/// Test harness builder.
#[derive(Debug, Clone)]
pub struct Builder {
    options: SimulatorOptions,
    config: OnboardingConfig,
    legacy: bool,
    detected: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            options: SimulatorOptions::default(),
            config: OnboardingConfig::default(),
            legacy: false,
            detected: true,
        }
    }
}

impl Builder {
    /// Create a new instance of [`Self`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the wallet as a pre-authorized legacy provider.
    #[must_use]
    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    /// Run as if no wallet were installed.
    #[must_use]
    pub fn without_provider(mut self) -> Self {
        self.detected = false;
        self
    }

    /// Accounts the wallet exposes.
    #[must_use]
    pub fn accounts(mut self, accounts: Vec<Address>) -> Self {
        self.options.accounts = accounts;
        self
    }

    /// The wallet refuses account access when prompted.
    #[must_use]
    pub fn deny_access(mut self) -> Self {
        self.options.grant_access = false;
        self
    }

    /// The wallet refuses every signature request.
    #[must_use]
    pub fn reject_signatures(mut self) -> Self {
        self.options.approve_signatures = false;
        self
    }

    /// How long the simulated chain takes to mine a transaction.
    #[must_use]
    pub fn confirmation_delay(mut self, delay: Duration) -> Self {
        self.options.confirmation_delay = delay;
        self
    }

    /// How long the coordinator waits for confirmation. Rounded up to whole seconds.
    #[must_use]
    pub fn confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.config.confirmation_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Build the flow and wallet without running a test.
    pub fn build(self) -> TestArgs {
        let wallet = Arc::new(SimulatedWallet::new(SimulatorOptions {
            chain_id: self.config.chain_id,
            ..self.options
        }));
        let discovery = match (self.detected, self.legacy) {
            (false, _) => onboarding::provider::StaticDiscovery::none(),
            (true, true) => wallet.legacy(),
            (true, false) => wallet.injected(),
        };
        let flow = SubmissionFlow::from_config(&self.config, discovery)
            .expect("bundled ABI matches the built-in roles");
        TestArgs { flow, wallet }
    }

    /// Execute `test`.
    ///
    /// # Panics
    ///
    /// Panics if `test` panics.
    pub async fn execute<F, T>(self, test: F)
    where
        F: FnOnce(TestArgs) -> T,
        T: Future<Output = ()>,
    {
        let test_args = self.build();

        // Note: this isn't actually unwind safe. However, since we don't
        // attempt to access any memory from `test` that may get corrupted
        // by a panic, it is ok to ignore the compiler.
        let res = AssertUnwindSafe(test(test_args)).catch_unwind().await;

        assert!(res.is_ok());
    }
}

/// Select `role`, then fill the username and every `(name, value)` field.
pub fn fill_form(flow: &mut SubmissionFlow, role: &str, username: &str, fields: &[(&str, &str)]) {
    flow.select_role(role).expect("known role");
    flow.edit_field(onboarding::roles::USERNAME, username);
    for (name, value) in fields {
        flow.edit_field(name, *value);
    }
}

/// The flow's observable snapshot as JSON, as a UI would receive it.
#[must_use]
pub fn snapshot_json(flow: &SubmissionFlow) -> serde_json::Value {
    serde_json::to_value(flow.snapshot()).expect("snapshot serializes")
}

/// First well-known development account; the one the wallet signs with by default.
#[must_use]
pub fn primary_account() -> Address {
    dev_accounts()[0]
}
