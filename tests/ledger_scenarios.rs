//! End-to-end ledger scenarios: append, fork resolution and tamper detection

use linkchain::blockchain::{calculate_hash, validate_chain, Block};
use linkchain::{ChainError, Ledger};

/// Builds a chain of `len` blocks starting at genesis, independent of any ledger.
fn competing_chain(len: usize, tag: &str) -> Vec<Block> {
    let mut chain = vec![Block::genesis()];
    for i in 1..len {
        let previous = &chain[i - 1];
        let block = Block::new(
            previous.index + 1,
            Some(previous.hash.clone()),
            previous.timestamp + 1_000,
            format!("{} {}", tag, i),
        );
        chain.push(block);
    }
    chain
}

#[test]
fn test_append_then_fork_resolution() -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Ledger::new();
    let genesis = Block::genesis();

    let block = ledger.create_block("hello");
    ledger.append(block)?;
    assert_eq!(ledger.len(), 2);
    let tail = ledger.latest();
    assert_eq!(tail.index, 1);
    assert_eq!(tail.previous_hash.as_deref(), Some(genesis.hash.as_str()));

    // A longer valid competing history wins.
    let competing = competing_chain(3, "competing");
    ledger.replace_chain(competing.clone())?;
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.latest(), competing[2]);

    // A length-4 chain with a broken middle link loses, even though it is longer.
    let mut broken = competing_chain(4, "broken");
    broken[2].previous_hash = Some("0".repeat(64));
    broken[2].hash = calculate_hash(
        broken[2].index,
        broken[2].previous_hash.as_deref(),
        broken[2].timestamp,
        &broken[2].data,
    );
    let result = ledger.replace_chain(broken);
    assert!(matches!(result, Err(ChainError::ChainInvalid { position: 2, .. })));
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.latest(), competing[2]);

    Ok(())
}

#[test]
fn test_broken_length_three_chain_is_rejected() {
    let ledger = Ledger::new();
    ledger.append_data("hello").unwrap();

    let mut broken = competing_chain(3, "broken");
    broken[1].previous_hash = Some("f".repeat(64));

    assert!(ledger.replace_chain(broken).is_err());
    assert_eq!(ledger.len(), 2);
}

#[test]
fn test_equal_length_chain_keeps_incumbent() {
    let ledger = Ledger::new();
    ledger.append_data("mine").unwrap();
    let before = ledger.chain();

    let result = ledger.replace_chain(competing_chain(2, "theirs"));
    assert_eq!(result, Err(ChainError::ChainNotLonger { candidate: 2, local: 2 }));
    assert_eq!(ledger.chain(), before);
}

#[test]
fn test_append_soundness() {
    let ledger = Ledger::new();
    let tail = ledger.latest();

    let good = ledger.create_block("payload");

    let mut bad_index = good.clone();
    bad_index.index = 2;
    let mut bad_link = good.clone();
    bad_link.previous_hash = None;
    let mut bad_hash = good.clone();
    bad_hash.hash = "0".repeat(64);

    for candidate in [bad_index, bad_link, bad_hash] {
        assert!(ledger.append(candidate).is_err());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.latest(), tail);
    }

    ledger.append(good.clone()).unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.latest(), good);
}

#[test]
fn test_chain_round_trips_through_wire_json() {
    let ledger = Ledger::new();
    for data in ["a", "b", "c"] {
        ledger.append_data(data).unwrap();
    }

    let json = serde_json::to_string(&ledger.chain()).unwrap();
    let decoded: Vec<Block> = serde_json::from_str(&json).unwrap();
    assert!(validate_chain(&decoded).is_ok());

    let mut tampered = decoded;
    tampered[2].data = "B".to_string();
    assert!(validate_chain(&tampered).is_err());
}
