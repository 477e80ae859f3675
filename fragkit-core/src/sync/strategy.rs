//! Bulk-then-legacy strategy selection shared by export and import.

use std::fmt;

/// Where a synchronization currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    /// Single-request archive transfer
    Bulk,
    /// Per-entity reconciliation for servers without bulk support
    Legacy,
    Done,
}

/// Result of a bulk attempt, as far as strategy selection cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    Completed,
    /// The attempt failed locally or in transport
    Failed(String),
    /// The server answered but signaled an error
    ServerError(String),
}

impl BulkOutcome {
    pub fn reason(&self) -> Option<&str> {
        match self {
            BulkOutcome::Completed => None,
            BulkOutcome::Failed(reason) | BulkOutcome::ServerError(reason) => Some(reason),
        }
    }
}

/// Which strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Bulk,
    Legacy,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Bulk => f.write_str("bulk"),
            Strategy::Legacy => f.write_str("legacy"),
        }
    }
}

/// Next state after `outcome`
///
/// Only a bulk attempt can fall back, and only once: `Legacy` always moves to
/// `Done` whatever the outcome, and `Done` is terminal.
pub fn choose_strategy(state: StrategyState, outcome: &BulkOutcome) -> StrategyState {
    match (state, outcome) {
        (StrategyState::Bulk, BulkOutcome::Completed) => StrategyState::Done,
        (StrategyState::Bulk, BulkOutcome::Failed(_) | BulkOutcome::ServerError(_)) => {
            StrategyState::Legacy
        }
        (StrategyState::Legacy, _) | (StrategyState::Done, _) => StrategyState::Done,
    }
}
