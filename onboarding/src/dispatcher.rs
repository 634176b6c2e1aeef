use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::abi::ContractInterface;
use crate::config::OnboardingConfig;
use crate::draft::RegistrationDraft;
use crate::errors::{OnboardingError, ProviderError};
use crate::provider::{ContractCall, ProviderHandle, Receipt, TransactionHandle};
use crate::roles::RoleSchemaRegistry;

/// Outcome of one [`TransactionDispatcher::submit`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub transaction: Option<TransactionHandle>,
    pub receipt: Option<Receipt>,
    pub error: Option<OnboardingError>,
}

impl SubmissionResult {
    fn failed(transaction: Option<TransactionHandle>, error: OnboardingError) -> Self {
        Self {
            transaction,
            receipt: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.receipt.is_some()
    }
}

/// Turns a draft into a contract call and tracks it through to confirmation.
///
/// Role-agnostic: the entry point and argument order come from the registry.
pub struct TransactionDispatcher {
    registry: Arc<RoleSchemaRegistry>,
    contract: Arc<ContractInterface>,
    confirmation_timeout: Duration,
}

impl TransactionDispatcher {
    pub fn new(
        registry: Arc<RoleSchemaRegistry>,
        contract: Arc<ContractInterface>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            contract,
            confirmation_timeout,
        }
    }

    /// Wires the built-in roles and bundled ABI against `config`, verifying they agree
    pub fn from_config(config: &OnboardingConfig) -> Result<Self, OnboardingError> {
        let registry = RoleSchemaRegistry::with_default_roles();
        let contract = ContractInterface::user_registration(config.contract_address)?;
        contract.verify(&registry)?;
        Ok(Self::new(
            Arc::new(registry),
            Arc::new(contract),
            config.confirmation_timeout(),
        ))
    }

    pub fn registry(&self) -> &RoleSchemaRegistry {
        &self.registry
    }

    pub fn contract(&self) -> &ContractInterface {
        &self.contract
    }

    /// Resolves the draft's role and encodes the entry point call, without touching a provider
    pub fn build_call(&self, draft: &RegistrationDraft) -> Result<ContractCall, OnboardingError> {
        let role = draft
            .role()
            .ok_or_else(|| OnboardingError::IncompleteForm(vec!["role".to_string()]))?;
        let schema = self.registry.schema_for(role).inspect_err(|err| {
            error!(%err, "selected role has no registered schema");
        })?;
        self.contract
            .encode_call(&schema.entry_point, draft.arguments_for(schema))
    }

    /// Asks the provider to sign and broadcast `call`
    #[instrument(skip_all, fields(entry_point = %call.entry_point, account = %handle.account))]
    pub async fn send(
        &self,
        call: &ContractCall,
        handle: &ProviderHandle,
    ) -> Result<TransactionHandle, OnboardingError> {
        match handle.provider.write_contract(handle.account, call).await {
            Ok(transaction) => {
                info!(%transaction, "registration transaction broadcast");
                Ok(transaction)
            }
            Err(err) => {
                warn!(%err, "provider declined to sign");
                Err(OnboardingError::SubmissionRejected(err.to_string()))
            }
        }
    }

    /// Waits for `transaction` to be included, bounded by the configured timeout
    #[instrument(skip_all, fields(transaction = %transaction))]
    pub async fn confirm(
        &self,
        transaction: TransactionHandle,
        handle: &ProviderHandle,
    ) -> Result<Receipt, OnboardingError> {
        let waited = tokio::time::timeout(
            self.confirmation_timeout,
            handle.provider.wait_for_receipt(&transaction),
        )
        .await;

        let failed = |reason: String| OnboardingError::ConfirmationFailed {
            transaction: transaction.to_string(),
            reason,
        };
        match waited {
            Ok(Ok(receipt)) if receipt.success => {
                info!(block = receipt.block_number, "registration confirmed");
                Ok(receipt)
            }
            Ok(Ok(receipt)) => {
                warn!(block = receipt.block_number, "registration reverted");
                Err(failed("transaction reverted".to_string()))
            }
            Ok(Err(ProviderError::Timeout)) | Err(_) => {
                warn!("timed out waiting for confirmation");
                Err(OnboardingError::ConfirmationTimeout(transaction.to_string()))
            }
            Ok(Err(err)) => {
                warn!(%err, "confirmation failed");
                Err(failed(err.to_string()))
            }
        }
    }

    /// Builds, sends and confirms one registration. Issues at most one transaction.
    ///
    /// One-shot path for callers without a UI. `SubmissionFlow` calls `build_call`, `send`
    /// and `confirm` itself so it can publish each state and resume a timed-out transaction.
    pub async fn submit(
        &self,
        draft: &RegistrationDraft,
        handle: &ProviderHandle,
    ) -> SubmissionResult {
        let call = match self.build_call(draft) {
            Ok(call) => call,
            Err(err) => return SubmissionResult::failed(None, err),
        };
        let transaction = match self.send(&call, handle).await {
            Ok(transaction) => transaction,
            Err(err) => return SubmissionResult::failed(None, err),
        };
        match self.confirm(transaction, handle).await {
            Ok(receipt) => SubmissionResult {
                transaction: Some(transaction),
                receipt: Some(receipt),
                error: None,
            },
            Err(err) => SubmissionResult::failed(Some(transaction), err),
        }
    }
}
