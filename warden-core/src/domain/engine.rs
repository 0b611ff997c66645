//! Intent operation engine: derives the exact byte payload to sign for one
//! operation of an intent, enforcing sequencing preconditions between
//! neighboring operations. Implemented once and shared by every transport
//! surface.

use crate::domain::chain::{BridgeRegistry, ChainRegistry, Solver};
use crate::domain::intent::{Intent, Operation, OperationKind};
use crate::foundation::{CustodyError, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct EngineDeps {
    pub chains: Arc<dyn ChainRegistry>,
    pub bridge: Arc<dyn BridgeRegistry>,
    pub solver: Arc<dyn Solver>,
}

/// Returns the hex payload that must be signed for `intent.operations[index]`,
/// or a precondition violation.
///
/// The intent's expiry and identity signature are checked before any payload
/// is released. Precondition failures are typed errors, never silent returns.
pub async fn payload_for_operation(intent: &Intent, index: usize, deps: &EngineDeps) -> Result<String> {
    intent.check_expiry()?;
    intent.verify_signature()?;

    let op = intent
        .operations
        .get(index)
        .ok_or_else(|| CustodyError::InvalidOperation(format!("operation index {} out of range", index)))?;

    match op.kind {
        OperationKind::Transaction => required(op, index, "data_to_sign", op.data_to_sign.as_deref()),

        OperationKind::SendToBridge => {
            // The transaction must pay the bridge custody wallet and nothing
            // else. Rejecting here keeps a compromised sequencer from routing
            // deposits to an arbitrary address.
            let wallet = deps.bridge.bridge_wallet(&op.blockchain_id)?;
            if let Some(destination) = op.solver_metadata.destination.as_deref() {
                if !destination.eq_ignore_ascii_case(&wallet) {
                    return Err(CustodyError::DestinationNotAllowed(destination.to_string()));
                }
            }
            required(op, index, "data_to_sign", op.data_to_sign.as_deref())
        }

        OperationKind::Solver => {
            let name = op
                .solver
                .as_deref()
                .ok_or_else(|| CustodyError::MissingField { index, field: "solver".to_string() })?;
            deps.solver.construct(name, intent, index).await
        }

        OperationKind::BridgeDeposit => {
            let deposit_hash = match op.solver_metadata.transaction_hash.as_deref() {
                Some(hash) => hash.to_string(),
                None => {
                    let prev = predecessor(intent, index, OperationKind::SendToBridge)?;
                    prev.result.clone().ok_or_else(|| CustodyError::MissingField {
                        index: index - 1,
                        field: "result".to_string(),
                    })?
                }
            };

            let chain = deps.chains.get(&op.blockchain_id)?;
            let wallet = deps.bridge.bridge_wallet(&op.blockchain_id)?;
            let transfers = chain.get_transfers(&deposit_hash, &wallet).await?;
            let first = transfers.first().ok_or_else(|| {
                CustodyError::InvalidOperation(format!("no transfers found for deposit {}", deposit_hash))
            })?;
            let (exists, _pegged) = deps.bridge.token_exists(&op.blockchain_id, &first.token).await?;
            if !exists {
                return Err(CustodyError::TokenNotRegistered(first.token.clone()));
            }

            let payload = op.solver_data_to_sign.as_deref().or(op.data_to_sign.as_deref());
            required(op, index, "solver_data_to_sign", payload)
        }

        OperationKind::Swap => {
            predecessor(intent, index, OperationKind::BridgeDeposit)?;
            required(op, index, "solver_data_to_sign", op.solver_data_to_sign.as_deref())
        }

        OperationKind::Burn => {
            predecessor(intent, index, OperationKind::Swap)?;
            successor(intent, index, OperationKind::Withdraw)?;
            required(op, index, "solver_data_to_sign", op.solver_data_to_sign.as_deref())
        }

        OperationKind::BurnSynthetic => {
            successor(intent, index, OperationKind::Withdraw)?;

            let token = op
                .solver_metadata
                .token
                .as_deref()
                .ok_or_else(|| CustodyError::MissingField { index, field: "solver_metadata.token".to_string() })?;
            let amount = op
                .solver_metadata
                .amount
                .ok_or_else(|| CustodyError::MissingField { index, field: "solver_metadata.amount".to_string() })?;

            let chain = deps.chains.get(&op.blockchain_id)?;
            let wallet = deps.bridge.bridge_wallet(&op.blockchain_id)?;
            let balance = chain.token_balance(token, &wallet).await?;
            if balance < amount {
                return Err(CustodyError::InsufficientBridgeBalance { balance, required: amount });
            }

            required(op, index, "solver_data_to_sign", op.solver_data_to_sign.as_deref())
        }

        OperationKind::Withdraw => {
            let prev = previous(intent, index)
                .ok_or_else(|| CustodyError::MissingPredecessor { index, expected: "burn".to_string() })?;
            if prev.kind != OperationKind::Burn && prev.kind != OperationKind::BurnSynthetic {
                return Err(CustodyError::MissingPredecessor { index, expected: "burn".to_string() });
            }

            let burned = prev.solver_metadata.token.as_deref().ok_or_else(|| CustodyError::MissingField {
                index: index - 1,
                field: "solver_metadata.token".to_string(),
            })?;
            let requested = op
                .solver_metadata
                .token
                .as_deref()
                .ok_or_else(|| CustodyError::MissingField { index, field: "solver_metadata.token".to_string() })?;
            if !burned.eq_ignore_ascii_case(requested) {
                return Err(CustodyError::TokenMismatch { burned: burned.to_string(), requested: requested.to_string() });
            }

            let (exists, _pegged) = deps.bridge.token_exists(&op.blockchain_id, requested).await?;
            if !exists {
                return Err(CustodyError::TokenNotRegistered(requested.to_string()));
            }

            required(op, index, "solver_data_to_sign", op.solver_data_to_sign.as_deref())
        }
    }
}

fn previous(intent: &Intent, index: usize) -> Option<&Operation> {
    index.checked_sub(1).and_then(|i| intent.operations.get(i))
}

fn predecessor(intent: &Intent, index: usize, expected: OperationKind) -> Result<&Operation> {
    match previous(intent, index) {
        Some(prev) if prev.kind == expected => Ok(prev),
        _ => Err(CustodyError::MissingPredecessor { index, expected: expected.as_str().to_string() }),
    }
}

fn successor(intent: &Intent, index: usize, expected: OperationKind) -> Result<&Operation> {
    match intent.operations.get(index + 1) {
        Some(next) if next.kind == expected => Ok(next),
        _ => Err(CustodyError::InvalidOperation(format!(
            "operation {} must be immediately followed by {}",
            index,
            expected.as_str()
        ))),
    }
}

fn required(_op: &Operation, index: usize, field: &str, value: Option<&str>) -> Result<String> {
    value
        .map(str::to_string)
        .ok_or_else(|| CustodyError::MissingField { index, field: field.to_string() })
}
