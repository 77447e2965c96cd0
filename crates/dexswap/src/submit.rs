use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::builder::{ApprovalRequest, PreparedSwap, TransactionRequest};
use crate::config::SwapConfig;
use crate::error::{SubmitError, WalletError};
use crate::notify::{Notification, Notifier, Severity, DEFAULT_AUTO_CLOSE};

/// Wallet-level transaction identifier.
pub type TxHash = String;

/// What the network eventually reported for a sent transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinedStatus {
    Success,
    Failed,
    Unknown,
}

/// Signing and submission primitives provided by the host wallet.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Account that owns the tokens, `None` when disconnected.
    fn account_id(&self) -> Option<String>;

    /// Sign and submit a token allowance; resolves once the network acknowledges it.
    async fn approve_allowance(&self, request: &ApprovalRequest) -> Result<TxHash, WalletError>;

    /// Sign and submit a contract call.
    async fn execute(&self, request: &TransactionRequest) -> Result<TxHash, WalletError>;

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<MinedStatus, WalletError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    Confirmed { tx_hash: TxHash },
    Reverted { tx_hash: TxHash },
    /// Sent, but mining was never observed.
    Unresolved { tx_hash: TxHash },
    NotSent { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    ApprovalPending,
    ApprovalDone,
    SwapPending,
    SwapDone(SwapOutcome),
    ApprovalFailed(String),
}

impl SubmissionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SubmissionState::ApprovalPending
                | SubmissionState::ApprovalDone
                | SubmissionState::SwapPending
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::SwapDone(_) | SubmissionState::ApprovalFailed(_)
        )
    }
}

/// Sequences the approval and swap transactions of one user action.
///
/// ```text
/// Idle -> ApprovalPending -> ApprovalDone -> SwapPending -> SwapDone(outcome)
///               \
///                -> ApprovalFailed
/// ```
///
/// The swap is only ever sent after the approval call returned a hash.
pub struct SubmissionController {
    wallet: Arc<dyn Wallet>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<SubmissionState>,
    auto_close: Duration,
}

impl SubmissionController {
    pub fn new(wallet: Arc<dyn Wallet>, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            wallet,
            notifier,
            state,
            auto_close: DEFAULT_AUTO_CLOSE,
        }
    }

    /// Controller whose notifications close after the configured toast timeout.
    pub fn from_config(
        wallet: Arc<dyn Wallet>,
        notifier: Arc<dyn Notifier>,
        config: &SwapConfig,
    ) -> Self {
        Self::new(wallet, notifier).with_auto_close(config.toast_auto_close())
    }

    pub fn with_auto_close(mut self, auto_close: Duration) -> Self {
        self.auto_close = auto_close;
        self
    }

    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_in_flight()
    }

    /// Return to `Idle` after a terminal state. No-op while in flight.
    pub fn reset(&self) {
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                *state = SubmissionState::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Submit the approval, then the swap, then wait for the swap to be mined.
    ///
    /// Errors mean the swap was never sent; a sent swap always yields `Ok`.
    pub async fn submit(&self, prepared: PreparedSwap) -> Result<SwapOutcome, SubmitError> {
        let started = self.state.send_if_modified(|state| {
            if state.is_in_flight() {
                false
            } else {
                *state = SubmissionState::ApprovalPending;
                true
            }
        });
        if !started {
            tracing::warn!("swap submitted while another is in flight");
            return Err(SubmitError::Busy);
        }
        tracing::info!(state = ?SubmissionState::ApprovalPending, "submission state");

        let PreparedSwap {
            mut approval,
            transaction,
            ..
        } = prepared;

        let approval_result = match self.wallet.account_id() {
            Some(owner) => {
                approval.owner = Some(owner);
                self.wallet.approve_allowance(&approval).await
            }
            None => Err(WalletError::NotConnected),
        };

        let approval_hash = match approval_result {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!(error = %e, "allowance approval failed");
                self.transition(SubmissionState::ApprovalFailed(e.to_string()));
                self.notify("Approval Failed", e.to_string(), Severity::Error);
                return Err(SubmitError::Approval(e));
            }
        };
        tracing::info!(tx_hash = %approval_hash, amount = %approval.amount, "allowance approved");
        self.transition(SubmissionState::ApprovalDone);

        self.transition(SubmissionState::SwapPending);
        let tx_hash = match self.wallet.execute(&transaction).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!(error = %e, "swap not sent");
                self.transition(SubmissionState::SwapDone(SwapOutcome::NotSent {
                    reason: e.to_string(),
                }));
                self.notify("Transaction Failed", e.to_string(), Severity::Error);
                return Err(SubmitError::Swap(e));
            }
        };

        self.notify("Transaction sent", tx_hash.clone(), Severity::Info);
        // Stays open until the host dismisses it.
        self.notifier.notify(
            Notification::info("Waiting for transaction to be mined", tx_hash.clone()).sticky(),
        );

        let outcome = match self.wallet.wait_for_receipt(&tx_hash).await {
            Ok(MinedStatus::Success) => {
                self.notify("Transaction Success", tx_hash.clone(), Severity::Success);
                SwapOutcome::Confirmed { tx_hash }
            }
            Ok(MinedStatus::Failed) => {
                self.notify("Transaction Failed", tx_hash.clone(), Severity::Error);
                SwapOutcome::Reverted { tx_hash }
            }
            Ok(MinedStatus::Unknown) => {
                self.notify("Transaction status unknown", tx_hash.clone(), Severity::Warning);
                SwapOutcome::Unresolved { tx_hash }
            }
            Err(e) => {
                tracing::warn!(error = %e, %tx_hash, "receipt unavailable");
                self.notify("Transaction status unknown", tx_hash.clone(), Severity::Warning);
                SwapOutcome::Unresolved { tx_hash }
            }
        };

        self.transition(SubmissionState::SwapDone(outcome.clone()));
        Ok(outcome)
    }

    fn transition(&self, next: SubmissionState) {
        tracing::info!(state = ?next, "submission state");
        self.state.send_replace(next);
    }

    fn notify(&self, title: &str, message: String, severity: Severity) {
        self.notifier.notify(
            Notification::new(title, message, severity).with_auto_close(self.auto_close),
        );
    }
}
