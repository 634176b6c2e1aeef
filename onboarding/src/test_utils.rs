use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy_primitives::{Address, keccak256};
use async_trait::async_trait;
use tokio::sync::{Notify, watch};

use crate::abi::ContractInterface;
use crate::dispatcher::TransactionDispatcher;
use crate::errors::ProviderError;
use crate::provider::{ContractCall, Receipt, SigningProvider, TransactionHandle};
use crate::roles::RoleSchemaRegistry;

pub fn test_account(n: u8) -> Address {
    Address::repeat_byte(n)
}

/// Dispatcher over the built-in roles and the bundled ABI
pub fn test_dispatcher(confirmation_timeout: Duration) -> TransactionDispatcher {
    TransactionDispatcher::new(
        Arc::new(RoleSchemaRegistry::with_default_roles()),
        Arc::new(
            ContractInterface::user_registration(test_account(0xcc))
                .expect("bundled ABI parses"),
        ),
        confirmation_timeout,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptBehavior {
    Success,
    Revert,
    /// The provider itself reports a timeout
    Timeout,
    /// Never resolves
    Pending,
}

/// Scriptable [`SigningProvider`] that records every call it receives
pub struct MockProvider {
    accounts: Mutex<Vec<Address>>,
    grant_access: AtomicBool,
    approve_signatures: AtomicBool,
    receipts: Mutex<ReceiptBehavior>,
    signature_gate: Option<Arc<Notify>>,
    receipt_gate: Option<Arc<Notify>>,
    events: watch::Sender<Vec<Address>>,
    calls: Mutex<Vec<ContractCall>>,
    access_requests: AtomicUsize,
    event_subscriptions: AtomicUsize,
    receipt_requests: AtomicUsize,
    block_number: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_accounts(vec![test_account(1)])
    }

    pub fn with_accounts(accounts: Vec<Address>) -> Self {
        let (events, _) = watch::channel(accounts.clone());
        Self {
            accounts: Mutex::new(accounts),
            grant_access: AtomicBool::new(true),
            approve_signatures: AtomicBool::new(true),
            receipts: Mutex::new(ReceiptBehavior::Success),
            signature_gate: None,
            receipt_gate: None,
            events,
            calls: Mutex::new(Vec::new()),
            access_requests: AtomicUsize::new(0),
            event_subscriptions: AtomicUsize::new(0),
            receipt_requests: AtomicUsize::new(0),
            block_number: AtomicU64::new(0),
        }
    }

    pub fn deny_access(self) -> Self {
        self.set_access(false);
        self
    }

    pub fn reject_signatures(self) -> Self {
        self.approve_signatures.store(false, Ordering::SeqCst);
        self
    }

    pub fn with_receipts(self, behavior: ReceiptBehavior) -> Self {
        self.set_receipts(behavior);
        self
    }

    /// `write_contract` waits for a permit on `gate` before answering
    pub fn with_signature_gate(mut self, gate: Arc<Notify>) -> Self {
        self.signature_gate = Some(gate);
        self
    }

    /// `wait_for_receipt` waits for a permit on `gate` before answering
    pub fn with_receipt_gate(mut self, gate: Arc<Notify>) -> Self {
        self.receipt_gate = Some(gate);
        self
    }

    pub fn set_access(&self, granted: bool) {
        self.grant_access.store(granted, Ordering::SeqCst);
    }

    pub fn set_receipts(&self, behavior: ReceiptBehavior) {
        *lock(&self.receipts) = behavior;
    }

    /// Simulates the user switching or removing accounts in the wallet
    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        *lock(&self.accounts) = accounts.clone();
        self.events.send_replace(accounts);
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        lock(&self.calls).clone()
    }

    pub fn access_requests(&self) -> usize {
        self.access_requests.load(Ordering::SeqCst)
    }

    pub fn event_subscriptions(&self) -> usize {
        self.event_subscriptions.load(Ordering::SeqCst)
    }

    pub fn receipt_requests(&self) -> usize {
        self.receipt_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(lock(&self.accounts).clone())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.access_requests.fetch_add(1, Ordering::SeqCst);
        if !self.grant_access.load(Ordering::SeqCst) {
            return Err(ProviderError::UserRejected(
                "User denied account access".to_string(),
            ));
        }
        Ok(lock(&self.accounts).clone())
    }

    async fn write_contract(
        &self,
        _from: Address,
        call: &ContractCall,
    ) -> Result<TransactionHandle, ProviderError> {
        if let Some(gate) = &self.signature_gate {
            gate.notified().await;
        }
        if !self.approve_signatures.load(Ordering::SeqCst) {
            return Err(ProviderError::UserRejected(
                "User denied transaction signature".to_string(),
            ));
        }
        let mut calls = lock(&self.calls);
        calls.push(call.clone());
        let mut preimage = call.calldata.to_vec();
        preimage.extend_from_slice(&(calls.len() as u64).to_be_bytes());
        Ok(TransactionHandle(keccak256(preimage)))
    }

    async fn wait_for_receipt(
        &self,
        handle: &TransactionHandle,
    ) -> Result<Receipt, ProviderError> {
        self.receipt_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.receipt_gate {
            gate.notified().await;
        }
        let behavior = *lock(&self.receipts);
        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;
        match behavior {
            ReceiptBehavior::Success | ReceiptBehavior::Revert => Ok(Receipt {
                transaction: *handle,
                block_number,
                success: behavior == ReceiptBehavior::Success,
            }),
            ReceiptBehavior::Timeout => Err(ProviderError::Timeout),
            ReceiptBehavior::Pending => std::future::pending().await,
        }
    }

    fn account_events(&self) -> Option<watch::Receiver<Vec<Address>>> {
        self.event_subscriptions.fetch_add(1, Ordering::SeqCst);
        Some(self.events.subscribe())
    }
}
