//! In-process wallet and chain for exercising the onboarding flow without a browser.
//!
//! [`SimulatedWallet`] signs nothing: it builds the EIP-1559 transaction a real
//! wallet would broadcast, "mines" it after a configurable delay, and applies the
//! registration contract's one-registration-per-account rule.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559};
use alloy_primitives::{Address, TxKind, U256};
use alloy_sol_types::SolInterface;
use async_trait::async_trait;
use onboarding::abi::IUserRegistration::IUserRegistrationCalls;
use onboarding::provider::{
    ContractCall, Receipt, SigningProvider, StaticDiscovery, TransactionHandle,
};
use onboarding::ProviderError;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

const GAS_LIMIT: u64 = 500_000;
const MAX_FEE_PER_GAS: u128 = 2_000_000_000;
const MAX_PRIORITY_FEE_PER_GAS: u128 = 1_000_000_000;

/// Well-known development accounts, funded on local chains
pub fn dev_accounts() -> Vec<Address> {
    vec![
        alloy_primitives::address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
        alloy_primitives::address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
    ]
}

#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    pub chain_id: u64,
    pub accounts: Vec<Address>,
    pub grant_access: bool,
    pub approve_signatures: bool,
    pub confirmation_delay: Duration,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            chain_id: onboarding::config::DEFAULT_CHAIN_ID,
            accounts: dev_accounts(),
            grant_access: true,
            approve_signatures: true,
            confirmation_delay: Duration::from_millis(10),
        }
    }
}

/// A registration recorded by the simulated contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub role: String,
    pub username: String,
    pub details: Vec<String>,
}

#[derive(Debug)]
struct PendingTransaction {
    from: Address,
    tx: TxEip1559,
    mined_at: Instant,
}

#[derive(Debug, Default)]
struct ChainState {
    nonces: HashMap<Address, u64>,
    pending: HashMap<TransactionHandle, PendingTransaction>,
    mined: HashMap<TransactionHandle, (TxEip1559, Receipt)>,
    registrations: HashMap<Address, Registration>,
    block_number: u64,
}

pub struct SimulatedWallet {
    options: SimulatorOptions,
    accounts: Mutex<Vec<Address>>,
    events: watch::Sender<Vec<Address>>,
    chain: Mutex<ChainState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedWallet {
    pub fn new(options: SimulatorOptions) -> Self {
        let (events, _) = watch::channel(options.accounts.clone());
        Self {
            accounts: Mutex::new(options.accounts.clone()),
            options,
            events,
            chain: Mutex::new(ChainState::default()),
        }
    }

    /// Exposes the wallet as a modern injected provider
    pub fn injected(self: &Arc<Self>) -> StaticDiscovery {
        StaticDiscovery::injected(self.clone())
    }

    /// Exposes the wallet as a pre-authorized legacy provider
    pub fn legacy(self: &Arc<Self>) -> StaticDiscovery {
        StaticDiscovery::legacy(self.clone())
    }

    /// Replaces the accounts the wallet exposes, as when the user switches account
    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        info!(count = accounts.len(), "simulated wallet accounts changed");
        *lock(&self.accounts) = accounts.clone();
        self.events.send_replace(accounts);
    }

    pub fn disconnect(&self) {
        self.switch_accounts(Vec::new());
    }

    pub fn registration(&self, account: Address) -> Option<Registration> {
        lock(&self.chain).registrations.get(&account).cloned()
    }

    /// The transaction as it would have been broadcast, once mined
    pub fn mined_transaction(&self, handle: &TransactionHandle) -> Option<TxEip1559> {
        lock(&self.chain)
            .mined
            .get(handle)
            .map(|(tx, _)| tx.clone())
    }

    pub fn block_number(&self) -> u64 {
        lock(&self.chain).block_number
    }

    fn build_transaction(
        &self,
        chain: &mut ChainState,
        from: Address,
        call: &ContractCall,
    ) -> TxEip1559 {
        let nonce = chain.nonces.entry(from).or_insert(0);
        let tx = TxEip1559 {
            chain_id: self.options.chain_id,
            nonce: *nonce,
            gas_limit: GAS_LIMIT,
            max_fee_per_gas: MAX_FEE_PER_GAS,
            max_priority_fee_per_gas: MAX_PRIORITY_FEE_PER_GAS,
            to: TxKind::Call(call.contract),
            value: U256::ZERO,
            input: call.calldata.clone(),
            ..Default::default()
        };
        *nonce += 1;
        tx
    }
}

// Applies the registration contract's rules: one registration per account.
fn execute(chain: &mut ChainState, from: Address, tx: &TxEip1559) -> bool {
    let decoded = match IUserRegistrationCalls::abi_decode(&tx.input) {
        Ok(decoded) => decoded,
        Err(err) => {
            debug!(%err, "calldata does not match the registration interface");
            return false;
        }
    };
    if chain.registrations.contains_key(&from) {
        debug!(%from, "account already registered");
        return false;
    }
    let registration = match decoded {
        IUserRegistrationCalls::registerPatient(c) => Registration {
            role: "Patient".to_string(),
            username: c.username,
            details: vec![c.medicalHistory],
        },
        IUserRegistrationCalls::registerHospital(c) => Registration {
            role: "Hospital".to_string(),
            username: c.username,
            details: vec![c.licenseNumber, c.location],
        },
        IUserRegistrationCalls::registerPharmacy(c) => Registration {
            role: "Pharmacy".to_string(),
            username: c.username,
            details: vec![c.licenseNumber, c.postalAddress],
        },
        IUserRegistrationCalls::registerSupplier(c) => Registration {
            role: "Supplier".to_string(),
            username: c.username,
            details: vec![c.companyName, c.contactInfo],
        },
    };
    chain.registrations.insert(from, registration);
    true
}

#[async_trait]
impl SigningProvider for SimulatedWallet {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(lock(&self.accounts).clone())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        if !self.options.grant_access {
            return Err(ProviderError::UserRejected(
                "User denied account access".to_string(),
            ));
        }
        Ok(lock(&self.accounts).clone())
    }

    async fn write_contract(
        &self,
        from: Address,
        call: &ContractCall,
    ) -> Result<TransactionHandle, ProviderError> {
        if !self.options.approve_signatures {
            return Err(ProviderError::UserRejected(
                "User denied transaction signature".to_string(),
            ));
        }
        if !lock(&self.accounts).contains(&from) {
            return Err(ProviderError::Request(format!(
                "account {from} is not managed by this wallet"
            )));
        }

        let mut chain = lock(&self.chain);
        let tx = self.build_transaction(&mut chain, from, call);
        let handle = TransactionHandle(tx.signature_hash());
        info!(transaction = %handle, nonce = tx.nonce, entry_point = %call.entry_point, "simulated broadcast");
        let mined_at = Instant::now() + self.options.confirmation_delay;
        chain.pending.insert(handle, PendingTransaction { from, tx, mined_at });
        Ok(handle)
    }

    async fn wait_for_receipt(
        &self,
        handle: &TransactionHandle,
    ) -> Result<Receipt, ProviderError> {
        let mined_at = {
            let chain = lock(&self.chain);
            if let Some((_, receipt)) = chain.mined.get(handle) {
                return Ok(receipt.clone());
            }
            chain
                .pending
                .get(handle)
                .map(|pending| pending.mined_at)
                .ok_or_else(|| ProviderError::Request(format!("unknown transaction {handle}")))?
        };
        tokio::time::sleep_until(mined_at).await;

        let mut chain = lock(&self.chain);
        if let Some((_, receipt)) = chain.mined.get(handle) {
            return Ok(receipt.clone());
        }
        let PendingTransaction { from, tx, .. } = chain
            .pending
            .remove(handle)
            .ok_or_else(|| ProviderError::Request(format!("unknown transaction {handle}")))?;

        let success = execute(&mut chain, from, &tx);
        chain.block_number += 1;
        let receipt = Receipt {
            transaction: *handle,
            block_number: chain.block_number,
            success,
        };
        debug!(transaction = %handle, block = receipt.block_number, success, "simulated block mined");
        chain.mined.insert(*handle, (tx, receipt.clone()));
        Ok(receipt)
    }

    fn account_events(&self) -> Option<watch::Receiver<Vec<Address>>> {
        Some(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboarding::draft::RegistrationDraft;
    use onboarding::roles::RoleId;
    use onboarding::test_utils::test_dispatcher;

    fn hospital_call() -> ContractCall {
        let draft = RegistrationDraft::new()
            .with_role(Some(RoleId::Hospital))
            .with_username("st-mary")
            .with_field("licenseNumber", "H-42");
        test_dispatcher(Duration::from_secs(5))
            .build_call(&draft)
            .unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_builds_eip1559_transaction() {
        let wallet = SimulatedWallet::new(SimulatorOptions::default());
        let from = dev_accounts()[0];
        let call = hospital_call();

        let handle = wallet.write_contract(from, &call).await.unwrap();
        let receipt = wallet.wait_for_receipt(&handle).await.unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.block_number, 1);
        let tx = wallet.mined_transaction(&handle).unwrap();
        assert_eq!(tx.chain_id, 31337);
        assert_eq!(tx.nonce, 0);
        assert_eq!(tx.to, TxKind::Call(call.contract));
        assert_eq!(tx.input, call.calldata);
        assert_eq!(
            wallet.registration(from),
            Some(Registration {
                role: "Hospital".to_string(),
                username: "st-mary".to_string(),
                details: vec!["H-42".to_string(), String::new()],
            })
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_reverts() {
        let wallet = SimulatedWallet::new(SimulatorOptions::default());
        let from = dev_accounts()[0];
        let call = hospital_call();

        let first = wallet.write_contract(from, &call).await.unwrap();
        let second = wallet.write_contract(from, &call).await.unwrap();
        assert_ne!(first, second);

        assert!(wallet.wait_for_receipt(&first).await.unwrap().success);
        assert!(!wallet.wait_for_receipt(&second).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_receipt_is_stable() {
        let wallet = SimulatedWallet::new(SimulatorOptions::default());
        let handle = wallet
            .write_contract(dev_accounts()[1], &hospital_call())
            .await
            .unwrap();
        let first = wallet.wait_for_receipt(&handle).await.unwrap();
        let again = wallet.wait_for_receipt(&handle).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(wallet.block_number(), 1);
    }

    #[tokio::test]
    async fn test_rejections() {
        let wallet = SimulatedWallet::new(SimulatorOptions {
            grant_access: false,
            approve_signatures: false,
            ..SimulatorOptions::default()
        });
        assert!(matches!(
            wallet.request_accounts().await,
            Err(ProviderError::UserRejected(_))
        ));
        assert!(matches!(
            wallet.write_contract(dev_accounts()[0], &hospital_call()).await,
            Err(ProviderError::UserRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_account_and_transaction() {
        let wallet = SimulatedWallet::new(SimulatorOptions::default());
        assert!(matches!(
            wallet
                .write_contract(Address::repeat_byte(0x42), &hospital_call())
                .await,
            Err(ProviderError::Request(_))
        ));
        assert!(matches!(
            wallet
                .wait_for_receipt(&TransactionHandle(Default::default()))
                .await,
            Err(ProviderError::Request(_))
        ));
    }

    #[test]
    fn test_disconnect_publishes_empty_accounts() {
        let wallet = SimulatedWallet::new(SimulatorOptions::default());
        let mut events = wallet.account_events().unwrap();
        wallet.disconnect();
        assert!(events.has_changed().unwrap());
        assert!(events.borrow_and_update().is_empty());
    }
}
