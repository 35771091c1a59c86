//! Shared handle to the local chain
//!
//! `Ledger` is the only way the rest of the node touches the chain. Reads
//! take a shared lock, `append`/`replace_chain` take the exclusive lock, and
//! every accepted change publishes the new tail to subscribers (the peer
//! network rebroadcasts it).

use crate::blockchain::{Block, Blockchain, ValidationRules};
use crate::error::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

const TAIL_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Ledger {
    chain: Arc<RwLock<Blockchain>>,
    tail_tx: broadcast::Sender<Block>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::len_without_is_empty)]
impl Ledger {
    pub fn new() -> Self {
        Self::from_blockchain(Blockchain::new())
    }

    pub fn with_rules(rules: ValidationRules) -> Self {
        Self::from_blockchain(Blockchain::with_rules(rules))
    }

    pub fn from_blockchain(blockchain: Blockchain) -> Self {
        let (tail_tx, _) = broadcast::channel(TAIL_CHANNEL_CAPACITY);
        Self {
            chain: Arc::new(RwLock::new(blockchain)),
            tail_tx,
        }
    }

    /// Receives the new tail after every accepted append or replacement.
    pub fn subscribe(&self) -> broadcast::Receiver<Block> {
        self.tail_tx.subscribe()
    }

    /// Snapshot of the full chain.
    pub fn chain(&self) -> Vec<Block> {
        self.chain.read().blocks().to_vec()
    }

    pub fn latest(&self) -> Block {
        self.chain.read().latest().clone()
    }

    pub fn get(&self, index: u64) -> Option<Block> {
        self.chain.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    pub fn rules(&self) -> ValidationRules {
        *self.chain.read().rules()
    }

    /// Candidate block following the current tail; call `append` to add it.
    pub fn create_block(&self, data: &str) -> Block {
        self.chain.read().generate_next_block(data)
    }

    pub fn append(&self, block: Block) -> Result<()> {
        let tail = {
            let mut chain = self.chain.write();
            chain.add_block(block)?;
            chain.latest().clone()
        };
        info!(index = tail.index, hash = %tail.short_hash(), "ledger.append");
        self.notify(tail);
        Ok(())
    }

    /// Creates and appends a block for `data` under one write lock, so
    /// concurrent local producers never compete for the same index.
    pub fn append_data(&self, data: &str) -> Result<Block> {
        let block = {
            let mut chain = self.chain.write();
            let block = chain.generate_next_block(data);
            chain.add_block(block.clone())?;
            block
        };
        info!(index = block.index, hash = %block.short_hash(), "ledger.append");
        self.notify(block.clone());
        Ok(block)
    }

    pub fn replace_chain(&self, candidate: Vec<Block>) -> Result<()> {
        let (previous_len, tail) = {
            let mut chain = self.chain.write();
            let previous_len = chain.len();
            chain.replace_chain(candidate)?;
            (previous_len, chain.latest().clone())
        };
        info!(
            previous_len,
            new_len = tail.index + 1,
            hash = %tail.short_hash(),
            "ledger.replace_chain"
        );
        self.notify(tail);
        Ok(())
    }

    fn notify(&self, tail: Block) {
        // No subscribers is not an error: nobody needs to hear about it.
        if self.tail_tx.send(tail).is_err() {
            debug!("no tail subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::validate_chain;
    use crate::error::ChainError;
    use tokio::sync::broadcast::error::TryRecvError;

    fn fork_of_len(len: usize) -> Vec<Block> {
        let ledger = Ledger::new();
        for i in 1..len {
            ledger.append_data(&format!("fork {}", i)).unwrap();
        }
        ledger.chain()
    }

    #[test]
    fn test_create_then_append() {
        let ledger = Ledger::new();
        let block = ledger.create_block("hello");
        assert_eq!(ledger.len(), 1);

        ledger.append(block.clone()).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.latest(), block);
        assert_eq!(ledger.get(1), Some(block));
    }

    #[test]
    fn test_notifications_only_on_accepted_changes() {
        let ledger = Ledger::new();
        let mut rx = ledger.subscribe();

        let block = ledger.append_data("one").unwrap();
        assert_eq!(rx.try_recv().unwrap(), block);

        assert!(ledger.append(block.clone()).is_err());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        let short = fork_of_len(2);
        assert!(matches!(
            ledger.replace_chain(short),
            Err(ChainError::ChainNotLonger { .. })
        ));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        let long = fork_of_len(4);
        ledger.replace_chain(long.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), long[3]);
        assert_eq!(ledger.chain(), long);
    }

    #[test]
    fn test_concurrent_appends_are_serialized() {
        let ledger = Ledger::new();
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        ledger.append_data(&format!("thread {} entry {}", t, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let chain = ledger.chain();
        assert_eq!(chain.len(), 1 + 8 * 25);
        assert!(validate_chain(&chain).is_ok());
    }

    #[test]
    fn test_genesis_survives_every_transition() {
        let ledger = Ledger::new();
        ledger.append_data("a").unwrap();
        ledger.replace_chain(fork_of_len(5)).unwrap();
        let _ = ledger.replace_chain(vec![]);
        assert!(ledger.chain()[0].is_genesis());
    }
}
