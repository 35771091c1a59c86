use crate::error::{ChainError, Result};
use serde::Deserialize;
use serde_json::Value;

use super::block::{now_millis, Block};

/// Optional checks layered on top of the linkage rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationRules {
    /// Require `predecessor.timestamp <= timestamp <= now + max_future_drift_ms`.
    pub strict_timestamps: bool,
    pub max_future_drift_ms: u64,
}

impl ValidationRules {
    pub fn strict(max_future_drift_ms: u64) -> Self {
        Self {
            strict_timestamps: true,
            max_future_drift_ms,
        }
    }
}

/// Shape check for a block received as JSON, before it is trusted as a `Block`.
pub fn validate_block_structure(raw: &Value) -> Result<()> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ChainError::MalformedBlock("expected a JSON object".to_string()))?;

    let field = |name: &str| {
        obj.get(name)
            .ok_or_else(|| ChainError::MalformedBlock(format!("missing field `{}`", name)))
    };

    if !field("index")?.is_u64() {
        return Err(ChainError::MalformedBlock(
            "`index` must be a non-negative integer".to_string(),
        ));
    }
    if !field("hash")?.is_string() {
        return Err(ChainError::MalformedBlock("`hash` must be a string".to_string()));
    }
    match obj.get("previousHash") {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(_) => {
            return Err(ChainError::MalformedBlock(
                "`previousHash` must be a string or null".to_string(),
            ))
        }
    }
    if !field("timestamp")?.is_u64() {
        return Err(ChainError::MalformedBlock(
            "`timestamp` must be a non-negative integer".to_string(),
        ));
    }
    if !field("data")?.is_string() {
        return Err(ChainError::MalformedBlock("`data` must be a string".to_string()));
    }
    Ok(())
}

/// Structural check followed by conversion into a `Block`.
pub fn parse_block(raw: &Value) -> Result<Block> {
    validate_block_structure(raw)?;
    Block::deserialize(raw).map_err(|e| ChainError::MalformedBlock(e.to_string()))
}

pub fn parse_chain(raw: &[Value]) -> Result<Vec<Block>> {
    raw.iter().map(parse_block).collect()
}

/// Checks that `candidate` may directly follow `previous`.
///
/// Index, previous hash and hash are checked in that order; the first
/// failure is returned.
pub fn validate_new_block(candidate: &Block, previous: &Block) -> Result<()> {
    let expected_index = previous.index + 1;
    if candidate.index != expected_index {
        return Err(ChainError::IndexMismatch {
            expected: expected_index,
            found: candidate.index,
        });
    }

    if candidate.previous_hash.as_deref() != Some(previous.hash.as_str()) {
        return Err(ChainError::PreviousHashMismatch {
            expected: previous.hash.clone(),
            found: candidate.previous_hash.clone(),
        });
    }

    let computed = candidate.calculate_hash();
    if computed != candidate.hash {
        return Err(ChainError::HashMismatch {
            computed,
            stated: candidate.hash.clone(),
        });
    }

    Ok(())
}

pub fn validate_timestamp(candidate: &Block, previous: &Block, max_future_drift_ms: u64) -> Result<()> {
    let earliest = previous.timestamp;
    let latest = now_millis().saturating_add(max_future_drift_ms);
    if candidate.timestamp < earliest || candidate.timestamp > latest {
        return Err(ChainError::TimestampOutOfRange {
            timestamp: candidate.timestamp,
            earliest,
            latest,
        });
    }
    Ok(())
}

pub fn validate_new_block_with(candidate: &Block, previous: &Block, rules: &ValidationRules) -> Result<()> {
    validate_new_block(candidate, previous)?;
    if rules.strict_timestamps {
        validate_timestamp(candidate, previous, rules.max_future_drift_ms)?;
    }
    Ok(())
}

/// A chain is valid when it starts with the genesis block and every link
/// from genesis to tail passes `validate_new_block`.
pub fn validate_chain(chain: &[Block]) -> Result<()> {
    validate_chain_with(chain, &ValidationRules::default())
}

pub fn validate_chain_with(chain: &[Block], rules: &ValidationRules) -> Result<()> {
    let first = chain.first().ok_or(ChainError::EmptyChain)?;
    if !first.is_genesis() {
        return Err(ChainError::ChainInvalid {
            position: 0,
            reason: Box::new(ChainError::GenesisMismatch),
        });
    }

    for (position, pair) in chain.windows(2).enumerate() {
        validate_new_block_with(&pair[1], &pair[0], rules).map_err(|reason| ChainError::ChainInvalid {
            position: position + 1,
            reason: Box::new(reason),
        })?;
    }
    Ok(())
}
