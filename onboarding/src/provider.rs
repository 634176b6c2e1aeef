//! Signing provider boundary and the adapter that owns the connection state.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::{OnboardingError, ProviderError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// A fully resolved call to a registration entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    pub contract: Address,
    pub entry_point: String,
    pub args: Vec<String>,
    /// ABI-encoded input, selector included
    pub calldata: Bytes,
}

/// Hash identifying a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHandle(pub B256);

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction: TransactionHandle,
    pub block_number: u64,
    /// `false` when the transaction was included but reverted
    pub success: bool,
}

/// External capability that holds user keys and signs transactions on request
#[async_trait]
pub trait SigningProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Accounts already exposed to the application, without prompting the user
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Prompts the user for account access
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Signs and broadcasts `call` from `from`
    async fn write_contract(
        &self,
        from: Address,
        call: &ContractCall,
    ) -> Result<TransactionHandle, ProviderError>;

    /// Resolves once the network has included the transaction
    async fn wait_for_receipt(&self, handle: &TransactionHandle)
    -> Result<Receipt, ProviderError>;

    /// Stream of account-list changes, if the provider publishes them
    fn account_events(&self) -> Option<watch::Receiver<Vec<Address>>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Modern injected wallet: account access must be granted by the user
    Injected,
    /// Pre-authorized provider: accounts are readable without a prompt
    Legacy,
}

#[derive(Clone)]
pub struct DetectedProvider {
    pub kind: ProviderKind,
    pub provider: Arc<dyn SigningProvider>,
}

impl fmt::Debug for DetectedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectedProvider")
            .field("kind", &self.kind)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Probes the environment for a signing provider
pub trait ProviderDiscovery: Send + Sync {
    fn detect(&self) -> Option<DetectedProvider>;
}

/// Discovery that always returns the same result, for hosts that know their provider up front
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery(pub Option<DetectedProvider>);

impl StaticDiscovery {
    pub fn injected(provider: Arc<dyn SigningProvider>) -> Self {
        Self(Some(DetectedProvider {
            kind: ProviderKind::Injected,
            provider,
        }))
    }

    pub fn legacy(provider: Arc<dyn SigningProvider>) -> Self {
        Self(Some(DetectedProvider {
            kind: ProviderKind::Legacy,
            provider,
        }))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl ProviderDiscovery for StaticDiscovery {
    fn detect(&self) -> Option<DetectedProvider> {
        self.0.clone()
    }
}

/// Connected provider plus the account transactions are sent from
#[derive(Clone)]
pub struct ProviderHandle {
    pub provider: Arc<dyn SigningProvider>,
    pub account: Address,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", &self.provider.name())
            .field("account", &self.account)
            .finish()
    }
}

/// Sole writer of the process-wide [`ConnectionState`].
///
/// Readers obtain a `watch::Receiver` through [`ProviderAdapter::subscribe`].
pub struct ProviderAdapter {
    discovery: Box<dyn ProviderDiscovery>,
    detected: Option<DetectedProvider>,
    accounts: Vec<Address>,
    state: watch::Sender<ConnectionState>,
    account_events: Option<watch::Receiver<Vec<Address>>>,
}

impl ProviderAdapter {
    pub fn new(discovery: impl ProviderDiscovery + 'static) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            discovery: Box::new(discovery),
            detected: None,
            accounts: Vec::new(),
            state,
            account_events: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    pub fn active_account(&self) -> Option<Address> {
        self.accounts.first().copied()
    }

    pub fn provider_kind(&self) -> Option<ProviderKind> {
        self.detected.as_ref().map(|d| d.kind)
    }

    /// Probes for a provider and, if one is found, tries to obtain accounts.
    ///
    /// Returns `Err(NoProvider)` when nothing is detected; the adapter stays usable and
    /// keeps its current state. A detected provider that withholds access, or exposes no
    /// accounts, leaves the adapter Disconnected with `Err(ConnectionDenied)`; it is retained
    /// so [`ProviderAdapter::request_connection`] can ask again.
    pub async fn initialize(&mut self) -> Result<ConnectionState, OnboardingError> {
        let Some(detected) = self.discovery.detect() else {
            warn!("no signing provider detected");
            return Err(OnboardingError::NoProvider);
        };
        info!(provider = detected.provider.name(), kind = ?detected.kind, "signing provider detected");

        let accounts = match detected.kind {
            ProviderKind::Injected => detected.provider.request_accounts().await,
            ProviderKind::Legacy => detected.provider.accounts().await,
        };
        self.adopt(detected);

        let reason = match accounts {
            Ok(accounts) if !accounts.is_empty() => {
                self.apply_accounts(accounts);
                return Ok(ConnectionState::Connected);
            }
            Ok(_) => "provider returned no accounts".to_string(),
            Err(err) => err.to_string(),
        };
        warn!(%reason, "account access not granted");
        self.disconnect();
        Err(OnboardingError::ConnectionDenied(reason))
    }

    /// Explicitly asks the detected provider for account access
    pub async fn request_connection(&mut self) -> Result<&[Address], OnboardingError> {
        let provider = match &self.detected {
            Some(detected) => detected.provider.clone(),
            None => return Err(OnboardingError::NoProvider),
        };

        let accounts = provider
            .request_accounts()
            .await
            .map_err(|err| OnboardingError::ConnectionDenied(err.to_string()))?;
        if accounts.is_empty() {
            return Err(OnboardingError::ConnectionDenied(
                "provider returned no accounts".to_string(),
            ));
        }
        self.apply_accounts(accounts);
        Ok(&self.accounts)
    }

    /// Applies any account change the provider published since the last call.
    ///
    /// An empty account list or a closed stream means the wallet went away.
    pub fn sync_accounts(&mut self) -> ConnectionState {
        let Some(events) = self.account_events.as_mut() else {
            return self.state();
        };
        match events.has_changed() {
            Ok(false) => {}
            Ok(true) => {
                let accounts = events.borrow_and_update().clone();
                if accounts.is_empty() {
                    info!("provider reported no accounts, disconnecting");
                    self.disconnect();
                } else {
                    self.apply_accounts(accounts);
                }
            }
            Err(_) => {
                warn!("provider account stream closed, disconnecting");
                self.account_events = None;
                self.disconnect();
            }
        }
        self.state()
    }

    /// Handle used by the dispatcher; only available while connected
    pub fn handle(&self) -> Result<ProviderHandle, OnboardingError> {
        match (&self.detected, self.active_account(), self.state()) {
            (Some(detected), Some(account), ConnectionState::Connected) => Ok(ProviderHandle {
                provider: detected.provider.clone(),
                account,
            }),
            _ => Err(OnboardingError::NotConnected),
        }
    }

    // Subscribes to account events at most once per provider instance.
    fn adopt(&mut self, detected: DetectedProvider) {
        let same_provider = self
            .detected
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(&current.provider, &detected.provider));
        if !same_provider || self.account_events.is_none() {
            self.account_events = detected.provider.account_events();
            if self.account_events.is_some() {
                debug!("subscribed to provider account events");
            }
        }
        self.detected = Some(detected);
    }

    fn apply_accounts(&mut self, accounts: Vec<Address>) {
        info!(account = %accounts[0], count = accounts.len(), "wallet connected");
        self.accounts = accounts;
        self.state.send_replace(ConnectionState::Connected);
    }

    fn disconnect(&mut self) {
        self.accounts.clear();
        self.state.send_replace(ConnectionState::Disconnected);
    }
}
