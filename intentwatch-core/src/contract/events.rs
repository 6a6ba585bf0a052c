//! Typed escrow contract events.

use alloy_primitives::{Address, B256, U256};

/// A buyer signaled an intent to take liquidity from a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentSignaled {
    pub intent_hash: B256,
    pub deposit_id: U256,
    pub verifier: Address,
    pub owner: Address,
    pub to: Address,
    pub amount: U256,
    pub fiat_currency: B256,
    pub conversion_rate: U256,
    pub timestamp: U256,
}

/// An intent was fulfilled and the funds released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentFulfilled {
    pub intent_hash: B256,
    pub deposit_id: U256,
    pub verifier: Address,
    pub owner: Address,
    pub to: Address,
    pub amount: U256,
    pub sustainability_fee: U256,
    pub verifier_fee: U256,
}

/// An intent was pruned (cancelled or expired).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentPruned {
    pub intent_hash: B256,
    pub deposit_id: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceived {
    pub deposit_id: U256,
    pub depositor: Address,
    pub token: Address,
    pub amount: U256,
    pub intent_amount_min: U256,
    pub intent_amount_max: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositCurrencyAdded {
    pub deposit_id: U256,
    pub verifier: Address,
    pub currency: B256,
    pub conversion_rate: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositVerifierAdded {
    pub deposit_id: U256,
    pub verifier: Address,
    pub payee_details_hash: B256,
    pub intent_gating_service: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositWithdrawn {
    pub deposit_id: U256,
    pub depositor: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositClosed {
    pub deposit_id: U256,
    pub depositor: Address,
}

/// Shared shape of `DepositCurrencyRateUpdated` and
/// `DepositConversionRateUpdated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRateUpdated {
    pub deposit_id: U256,
    pub verifier: Address,
    pub currency: B256,
    pub conversion_rate: U256,
}

/// ERC-4337 entry point event bundled into the same transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOperation {
    pub user_op_hash: B256,
    pub sender: Address,
    pub paymaster: Address,
    pub nonce: U256,
    pub success: bool,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
}

/// Reason a log fell back to [`DecodedEvent::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unrecognized {
    /// First topic of the log.
    pub signature: Option<B256>,
    /// Best-effort entity id read from the third topic.
    pub inferred_id: Option<U256>,
    pub reason: String,
}

/// A log classified against the escrow schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    IntentSignaled(IntentSignaled),
    IntentFulfilled(IntentFulfilled),
    IntentPruned(IntentPruned),
    DepositReceived(DepositReceived),
    DepositCurrencyAdded(DepositCurrencyAdded),
    DepositVerifierAdded(DepositVerifierAdded),
    DepositWithdrawn(DepositWithdrawn),
    DepositClosed(DepositClosed),
    DepositCurrencyRateUpdated(DepositRateUpdated),
    DepositConversionRateUpdated(DepositRateUpdated),
    BeforeExecution,
    UserOperationEvent(UserOperation),
    Unrecognized(Unrecognized),
}

impl DecodedEvent {
    /// Event name as declared in the contract ABI.
    pub fn name(&self) -> &'static str {
        match self {
            DecodedEvent::IntentSignaled(_) => "IntentSignaled",
            DecodedEvent::IntentFulfilled(_) => "IntentFulfilled",
            DecodedEvent::IntentPruned(_) => "IntentPruned",
            DecodedEvent::DepositReceived(_) => "DepositReceived",
            DecodedEvent::DepositCurrencyAdded(_) => "DepositCurrencyAdded",
            DecodedEvent::DepositVerifierAdded(_) => "DepositVerifierAdded",
            DecodedEvent::DepositWithdrawn(_) => "DepositWithdrawn",
            DecodedEvent::DepositClosed(_) => "DepositClosed",
            DecodedEvent::DepositCurrencyRateUpdated(_) => "DepositCurrencyRateUpdated",
            DecodedEvent::DepositConversionRateUpdated(_) => "DepositConversionRateUpdated",
            DecodedEvent::BeforeExecution => "BeforeExecution",
            DecodedEvent::UserOperationEvent(_) => "UserOperationEvent",
            DecodedEvent::Unrecognized(_) => "Unrecognized",
        }
    }

    /// Deposit the event refers to, if any.
    pub fn deposit_id(&self) -> Option<U256> {
        match self {
            DecodedEvent::IntentSignaled(e) => Some(e.deposit_id),
            DecodedEvent::IntentFulfilled(e) => Some(e.deposit_id),
            DecodedEvent::IntentPruned(e) => Some(e.deposit_id),
            DecodedEvent::DepositReceived(e) => Some(e.deposit_id),
            DecodedEvent::DepositCurrencyAdded(e) => Some(e.deposit_id),
            DecodedEvent::DepositVerifierAdded(e) => Some(e.deposit_id),
            DecodedEvent::DepositWithdrawn(e) => Some(e.deposit_id),
            DecodedEvent::DepositClosed(e) => Some(e.deposit_id),
            DecodedEvent::DepositCurrencyRateUpdated(e)
            | DecodedEvent::DepositConversionRateUpdated(e) => Some(e.deposit_id),
            DecodedEvent::Unrecognized(u) => u.inferred_id,
            DecodedEvent::BeforeExecution | DecodedEvent::UserOperationEvent(_) => None,
        }
    }
}

/// A decoded event together with the transaction it was emitted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    pub event: DecodedEvent,
    pub tx_hash: B256,
    pub block_number: u64,
}
