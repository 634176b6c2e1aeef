//! Submission flow coordinator.
//!
//! Sequences connection check, validation, signature and confirmation as explicit
//! states, published through a `watch` channel so a UI can render each step.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::OnboardingConfig;
use crate::dispatcher::TransactionDispatcher;
use crate::draft::{FormController, RegistrationDraft};
use crate::errors::{ErrorKind, OnboardingError};
use crate::provider::{
    ConnectionState, ProviderAdapter, ProviderDiscovery, Receipt, TransactionHandle,
};
use crate::roles::{RoleId, USERNAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FlowState {
    Idle,
    Validating,
    AwaitingSignature,
    AwaitingConfirmation { transaction: TransactionHandle },
    Succeeded { receipt: Receipt },
    Failed { kind: ErrorKind, message: String },
}

impl FlowState {
    /// True between the start of a submission and its terminal state; submit stays disabled
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            FlowState::Validating
                | FlowState::AwaitingSignature
                | FlowState::AwaitingConfirmation { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Succeeded { .. } | FlowState::Failed { .. })
    }
}

/// Everything a UI needs to render the registration screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub connection_state: ConnectionState,
    pub draft: RegistrationDraft,
    pub flow_state: FlowState,
    pub last_error: Option<String>,
}

// A broadcast transaction whose confirmation timed out, kept so an unchanged
// resubmission waits on it instead of registering twice.
#[derive(Debug, Clone)]
struct UnconfirmedSubmission {
    draft: RegistrationDraft,
    transaction: TransactionHandle,
}

pub struct SubmissionFlow {
    adapter: ProviderAdapter,
    form: FormController,
    dispatcher: TransactionDispatcher,
    state: watch::Sender<FlowState>,
    last_error: Option<OnboardingError>,
    unconfirmed: Option<UnconfirmedSubmission>,
}

impl SubmissionFlow {
    pub fn new(adapter: ProviderAdapter, dispatcher: TransactionDispatcher) -> Self {
        let form = FormController::new(adapter.subscribe());
        let (state, _) = watch::channel(FlowState::Idle);
        Self {
            adapter,
            form,
            dispatcher,
            state,
            last_error: None,
            unconfirmed: None,
        }
    }

    /// Builds a flow over the built-in roles, targeting the contract in `config`
    pub fn from_config(
        config: &OnboardingConfig,
        discovery: impl ProviderDiscovery + 'static,
    ) -> Result<Self, OnboardingError> {
        let dispatcher = TransactionDispatcher::from_config(config)?;
        Ok(Self::new(ProviderAdapter::new(discovery), dispatcher))
    }

    pub fn adapter(&self) -> &ProviderAdapter {
        &self.adapter
    }

    pub fn draft(&self) -> &RegistrationDraft {
        self.form.draft()
    }

    pub fn flow_state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    pub fn last_error(&self) -> Option<&OnboardingError> {
        self.last_error.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.adapter.subscribe()
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            connection_state: self.adapter.state(),
            draft: self.form.draft().clone(),
            flow_state: self.flow_state(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    pub fn is_submittable(&self) -> bool {
        !self.state.borrow().is_in_flight() && self.form.is_submittable()
    }

    /// Detects the provider on first use, then asks it for account access
    pub async fn connect_provider(&mut self) -> Result<ConnectionState, OnboardingError> {
        let outcome = if self.adapter.provider_kind().is_none() {
            self.adapter.initialize().await
        } else {
            self.adapter.request_connection().await.map(|_| ConnectionState::Connected)
        };
        match outcome {
            Ok(state) => {
                self.last_error = None;
                Ok(state)
            }
            Err(err) => {
                warn!(%err, "wallet connection failed");
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Selects a role by name; an empty name clears the selection
    pub fn select_role(&mut self, role: &str) -> Result<(), OnboardingError> {
        let role = if role.trim().is_empty() {
            None
        } else {
            Some(role.parse::<RoleId>()?)
        };
        self.form.set_role(role);
        Ok(())
    }

    /// Edits the username or a role-specific field
    pub fn edit_field(&mut self, name: &str, value: impl Into<String>) {
        if name == USERNAME {
            self.form.set_username(value);
        } else {
            self.form.set_field(name, value);
        }
    }

    /// Runs one submission to a terminal state and returns it.
    ///
    /// Errors never escape: they become `FlowState::Failed` and the draft is kept.
    pub async fn submit(&mut self) -> FlowState {
        self.last_error = None;
        self.transition(FlowState::Idle);

        let terminal = match self.run_submission().await {
            Ok(receipt) => {
                info!(transaction = %receipt.transaction, "registration succeeded");
                self.unconfirmed = None;
                self.form.reset();
                FlowState::Succeeded { receipt }
            }
            Err(err) => {
                warn!(kind = ?err.kind(), %err, "registration failed");
                let failed = FlowState::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                };
                self.last_error = Some(err);
                failed
            }
        };
        self.transition(terminal.clone());
        terminal
    }

    async fn run_submission(&mut self) -> Result<Receipt, OnboardingError> {
        if self.adapter.sync_accounts() != ConnectionState::Connected {
            return Err(OnboardingError::NotConnected);
        }
        self.transition(FlowState::Validating);
        self.form.validate()?;
        let handle = self.adapter.handle()?;
        let draft = self.form.draft().clone();

        let transaction = match self.resumable(&draft) {
            Some(transaction) => {
                info!(%transaction, "awaiting previously broadcast registration");
                transaction
            }
            None => {
                self.unconfirmed = None;
                self.transition(FlowState::AwaitingSignature);
                let call = self.dispatcher.build_call(&draft)?;
                self.dispatcher.send(&call, &handle).await?
            }
        };

        self.transition(FlowState::AwaitingConfirmation { transaction });
        let confirmed = self.dispatcher.confirm(transaction, &handle).await;
        // Only a timeout leaves the outcome open; any other answer is final for this transaction.
        self.unconfirmed = match &confirmed {
            Err(OnboardingError::ConfirmationTimeout(_)) => {
                Some(UnconfirmedSubmission { draft, transaction })
            }
            _ => None,
        };
        confirmed
    }

    fn resumable(&self, draft: &RegistrationDraft) -> Option<TransactionHandle> {
        self.unconfirmed
            .as_ref()
            .filter(|pending| pending.draft == *draft)
            .map(|pending| pending.transaction)
    }

    fn transition(&self, next: FlowState) {
        debug!(?next, "flow transition");
        self.state.send_replace(next);
    }
}
