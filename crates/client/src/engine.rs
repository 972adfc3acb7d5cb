//! Per-account submission state machine.
//!
//! `Built → Estimating → Signed → Submitted → Pending → Confirmed | Reverted | TimedOut`
//!
//! All work for one account runs under that account's lock, so nonce reads,
//! deployment detection and signing requests never overlap for the same account.
//! Different accounts proceed concurrently.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use alloy_primitives::{Address, B256, U256};
use keyrelay_core::{
    AccountCall, AccountIdentity, CoreError, Fees, KeyMaterial, UserOperation,
};
use tracing::{debug, info, warn};

use crate::{
    builder::OperationBuilder,
    bundler::{BundlerClient, SubmitOutcome},
    chain::ChainStateLookup,
    config::EngineConfig,
    error::EngineError,
    metrics::EngineMetrics,
    paymaster::PaymasterClient,
    poller::{PollOutcome, ReceiptPoller},
    receipt::UserOperationReceipt,
    signer::OperationSigner,
};

/// Stage of a submission, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// Operation assembled with placeholder signature.
    Built,
    /// Gas and fees are being filled in.
    Estimating,
    /// A canonical signature is attached.
    Signed,
    /// The relay accepted the operation.
    Submitted,
    /// Waiting for a receipt.
    Pending,
    /// Included and executed successfully.
    Confirmed,
    /// Included but execution reverted.
    Reverted,
    /// No receipt before the deadline.
    TimedOut,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Built => "built",
            Self::Estimating => "estimating",
            Self::Signed => "signed",
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Reverted => "reverted",
            Self::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Summary of a confirmed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    /// Hash the relay accepted.
    pub user_op_hash: B256,
    /// Account address.
    pub sender: Address,
    /// Nonce the operation used.
    pub nonce: U256,
    /// Whether this operation deployed the account.
    pub deployed_account: bool,
    /// Fees of the accepted operation.
    pub fees: Fees,
    /// Automatic fee replacements performed.
    pub fee_replacements: u32,
    /// Receipt reported by the relay.
    pub receipt: UserOperationReceipt,
}

/// Drives operations from intent to receipt.
pub struct SubmissionEngine {
    config: EngineConfig,
    builder: OperationBuilder,
    bundler: BundlerClient,
    paymaster: Option<PaymasterClient>,
    chain: Arc<dyn ChainStateLookup>,
    poller: ReceiptPoller,
    account_locks: Mutex<HashMap<Address, Arc<tokio::sync::Mutex<()>>>>,
    metrics: EngineMetrics,
}

impl fmt::Debug for SubmissionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionEngine")
            .field("config", &self.config)
            .field("bundler", &self.bundler)
            .field("paymaster", &self.paymaster)
            .finish_non_exhaustive()
    }
}

impl SubmissionEngine {
    /// Engine over the given relay and chain view.
    pub fn new(
        config: EngineConfig,
        bundler: BundlerClient,
        chain: Arc<dyn ChainStateLookup>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if bundler.entry_point() != config.entry_point {
            return Err(EngineError::InvalidConfig(format!(
                "bundler targets {} but config targets {}",
                bundler.entry_point(),
                config.entry_point
            )));
        }
        Ok(Self {
            builder: config.builder(),
            poller: config.poller(),
            config,
            bundler,
            paymaster: None,
            chain,
            account_locks: Mutex::new(HashMap::new()),
            metrics: EngineMetrics::default(),
        })
    }

    /// Sponsors every operation through `paymaster`.
    pub fn with_paymaster(mut self, paymaster: PaymasterClient) -> Self {
        self.paymaster = Some(paymaster);
        self
    }

    /// Engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Operation builder in use.
    pub const fn builder(&self) -> &OperationBuilder {
        &self.builder
    }

    /// Counterfactual identity for `key` at `index`. Not yet checked against the chain.
    pub fn account(&self, key: KeyMaterial, index: u64) -> AccountIdentity {
        self.config.deriver().identity(key, index)
    }

    /// Re-reads the deployment state of `account`.
    pub async fn refresh(&self, account: &AccountIdentity) -> Result<AccountIdentity, EngineError> {
        let deployed = self.chain.is_deployed(account.address).await?;
        Ok(AccountIdentity { deployed, ..account.clone() })
    }

    /// Builds and prices an operation without signing it.
    pub async fn prepare(
        &self,
        account: &AccountIdentity,
        call: &AccountCall,
    ) -> Result<UserOperation, EngineError> {
        let lock = self.account_lock(account.address);
        let _guard = lock.lock().await;
        self.prepare_locked(account, call).await
    }

    /// Builds, signs, submits and waits for `call` from `account`.
    ///
    /// On a fee-too-low rejection the operation is re-priced, re-sponsored and
    /// re-signed with the same nonce, up to the configured number of times.
    /// Dropping the future abandons polling; nothing is resubmitted afterwards.
    pub async fn submit(
        &self,
        account: &AccountIdentity,
        call: AccountCall,
        signer: &dyn OperationSigner,
    ) -> Result<SubmissionReport, EngineError> {
        if signer.key_type() != account.key_type() {
            return Err(CoreError::malformed(format!(
                "signer key type {:?} does not match account key type {:?}",
                signer.key_type(),
                account.key_type()
            ))
            .into());
        }

        let lock = self.account_lock(account.address);
        let _guard = lock.lock().await;

        let mut op = self.prepare_locked(account, &call).await?;
        let deployed_account = op.deployment.is_some();
        self.sign(&mut op, signer).await?;
        self.transition(&op, SubmissionState::Signed);

        let started = Instant::now();
        let mut fee_replacements = 0;
        let user_op_hash = loop {
            self.metrics.submissions.increment(1);
            match self.bundler.send(&op).await? {
                SubmitOutcome::Accepted(hash) => {
                    let local = self.builder.signing_digest(&op);
                    if hash != local {
                        warn!(message = "relay hash differs from local hash", relay = %hash, local = %local);
                    }
                    break hash;
                }
                SubmitOutcome::NeedsFeeBump(floor)
                    if fee_replacements < self.config.max_fee_replacements =>
                {
                    let fees = self.config.fee_policy.bump(op.fees(), floor);
                    info!(
                        message = "replacing operation with higher fees",
                        sender = %op.sender,
                        nonce = %op.nonce,
                        floor_max_fee = floor.current_max_fee,
                        floor_priority_fee = floor.current_max_priority_fee,
                        max_fee = fees.max_fee_per_gas,
                        priority_fee = fees.max_priority_fee_per_gas
                    );
                    self.builder.apply_fees(&mut op, fees);
                    self.builder.reset_signature(&mut op, account.key_type());
                    self.sponsor(&mut op).await?;
                    self.sign(&mut op, signer).await?;
                    fee_replacements += 1;
                    self.metrics.fee_replacements.increment(1);
                }
                SubmitOutcome::NeedsFeeBump(floor) => {
                    self.metrics.rejections.increment(1);
                    return Err(EngineError::FeeTooLow(floor));
                }
                SubmitOutcome::Rejected(error) => {
                    warn!(message = "relay rejected operation", sender = %op.sender, code = error.code, error = %error.message);
                    self.metrics.rejections.increment(1);
                    return Err(EngineError::RelayRejected(error));
                }
            }
        };
        self.transition(&op, SubmissionState::Submitted);

        self.transition(&op, SubmissionState::Pending);
        match self.poller.wait(&self.bundler, user_op_hash).await {
            PollOutcome::Included(receipt) if receipt.success => {
                self.metrics.confirmations.increment(1);
                self.metrics.confirmation_latency.record(started.elapsed().as_secs_f64());
                self.transition(&op, SubmissionState::Confirmed);
                Ok(SubmissionReport {
                    user_op_hash,
                    sender: op.sender,
                    nonce: op.nonce,
                    deployed_account,
                    fees: op.fees(),
                    fee_replacements,
                    receipt: *receipt,
                })
            }
            PollOutcome::Included(mut receipt) => {
                self.metrics.reverts.increment(1);
                self.transition(&op, SubmissionState::Reverted);
                if receipt.user_op_hash.is_zero() {
                    receipt.user_op_hash = user_op_hash;
                }
                Err(EngineError::Reverted(receipt))
            }
            PollOutcome::TimedOut { waited } => {
                self.metrics.timeouts.increment(1);
                self.transition(&op, SubmissionState::TimedOut);
                Err(EngineError::Timeout { user_op_hash, waited })
            }
        }
    }

    async fn prepare_locked(
        &self,
        account: &AccountIdentity,
        call: &AccountCall,
    ) -> Result<UserOperation, EngineError> {
        let account = self.refresh(account).await?;
        let nonce = self.chain.nonce(self.config.entry_point, account.address).await?;

        let mut op = self.builder.build(&account, nonce, call);
        self.transition(&op, SubmissionState::Built);
        debug!(message = "operation preview", sender = %op.sender, actions = ?self.builder.preview(&op));

        self.transition(&op, SubmissionState::Estimating);
        let fees = self.chain.fee_suggestion().await?;
        self.builder.apply_fees(&mut op, fees);
        let estimate = self.bundler.estimate_gas(&op).await?;
        self.builder.apply_estimate(&mut op, &estimate);
        self.sponsor(&mut op).await?;
        Ok(op)
    }

    async fn sponsor(&self, op: &mut UserOperation) -> Result<(), EngineError> {
        if let Some(paymaster) = &self.paymaster {
            op.paymaster = None;
            let sponsorship = paymaster.sponsor(op).await?;
            self.builder.apply_sponsorship(op, &sponsorship);
        }
        Ok(())
    }

    async fn sign(
        &self,
        op: &mut UserOperation,
        signer: &dyn OperationSigner,
    ) -> Result<(), EngineError> {
        let digest = self.builder.signing_digest(op);
        let raw = signer.sign_digest(digest).await.inspect_err(|err| {
            warn!(message = "signer failed", sender = %op.sender, error = %err);
        })?;
        if raw.key_type() != signer.key_type() {
            return Err(CoreError::malformed("signer returned a signature for a different curve").into());
        }
        self.builder.attach_signature(op, &raw)?;
        Ok(())
    }

    fn account_lock(&self, account: Address) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.account_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // a lock only the map references has no holder and no waiter
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(account).or_default())
    }

    fn transition(&self, op: &UserOperation, state: SubmissionState) {
        info!(
            message = "submission state",
            state = %state,
            sender = %op.sender,
            nonce = %op.nonce,
            max_fee = op.max_fee_per_gas
        );
    }
}
