// ABOUTME: Budget module - the shared rate-budget ledger gating every outbound action.
// ABOUTME: Sliding windows per scope with adaptive backoff driven by platform feedback.

mod ledger;

pub use ledger::{
    BudgetLedger, DenialReason, GrantDecision, LedgerStatus, RecordOutcome, ScopeStatus,
};

#[cfg(test)]
mod ledger_test;
