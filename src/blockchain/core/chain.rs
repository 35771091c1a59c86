use crate::error::{ChainError, Result};

use super::block::{now_millis, Block};
use super::validation::{validate_chain_with, validate_new_block_with, ValidationRules};

/// The local chain. Never empty: it starts at the genesis block and is only
/// ever extended by a validated block or swapped for a longer valid chain.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    rules: ValidationRules,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::len_without_is_empty)]
impl Blockchain {
    pub fn new() -> Self {
        Self::with_rules(ValidationRules::default())
    }

    pub fn with_rules(rules: ValidationRules) -> Self {
        Blockchain {
            blocks: vec![Block::genesis()],
            rules,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn latest(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Builds the block that would follow the current tail. The chain is not modified.
    pub fn generate_next_block(&self, data: &str) -> Block {
        let previous = self.latest();
        let timestamp = now_millis().max(previous.timestamp);
        Block::new(
            previous.index + 1,
            Some(previous.hash.clone()),
            timestamp,
            data.to_string(),
        )
    }

    /// Appends `block` if it validly extends the tail; otherwise the chain is left untouched.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        validate_new_block_with(&block, self.latest(), &self.rules)?;
        self.blocks.push(block);
        Ok(())
    }

    /// Longest-chain rule: adopt `candidate` only if it is valid and strictly
    /// longer than the local chain. Ties keep the local chain.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<()> {
        validate_chain_with(&candidate, &self.rules)?;
        if candidate.len() <= self.blocks.len() {
            return Err(ChainError::ChainNotLonger {
                candidate: candidate.len(),
                local: self.blocks.len(),
            });
        }
        self.blocks = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extended(chain: &Blockchain, extra: usize, tag: &str) -> Vec<Block> {
        let mut fork = chain.clone();
        for i in 0..extra {
            let block = fork.generate_next_block(&format!("{} {}", tag, i));
            fork.add_block(block).unwrap();
        }
        fork.blocks().to_vec()
    }

    #[test]
    fn test_new_chain_holds_only_genesis() {
        let chain = Blockchain::new();
        assert_eq!(chain.len(), 1);
        assert!(chain.latest().is_genesis());
        assert_eq!(chain.get(0), Some(&Block::genesis()));
        assert_eq!(chain.get(1), None);
    }

    #[test]
    fn test_generate_next_block_does_not_mutate() {
        let chain = Blockchain::new();
        let block = chain.generate_next_block("hello");
        assert_eq!(chain.len(), 1);
        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash.as_deref(), Some(Block::genesis().hash.as_str()));
        assert_eq!(block.hash, block.calculate_hash());
    }

    #[test]
    fn test_add_block() {
        let mut chain = Blockchain::new();
        let block = chain.generate_next_block("hello");
        chain.add_block(block.clone()).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.latest(), &block);
    }

    #[test]
    fn test_rejected_block_leaves_chain_untouched() {
        let mut chain = Blockchain::new();
        let first = chain.generate_next_block("first");
        chain.add_block(first.clone()).unwrap();

        // Same block again: index no longer follows the tail.
        assert!(matches!(
            chain.add_block(first.clone()),
            Err(ChainError::IndexMismatch { expected: 2, found: 1 })
        ));

        let mut forged = chain.generate_next_block("second");
        forged.data = "forged".to_string();
        assert!(matches!(chain.add_block(forged), Err(ChainError::HashMismatch { .. })));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.latest(), &first);
    }

    #[test]
    fn test_replace_with_longer_valid_chain() {
        let mut chain = Blockchain::new();
        let block = chain.generate_next_block("local");
        chain.add_block(block).unwrap();

        let fork = extended(&Blockchain::new(), 2, "remote");
        chain.replace_chain(fork.clone()).unwrap();
        assert_eq!(chain.blocks(), fork.as_slice());
    }

    #[test]
    fn test_tie_keeps_local_chain() {
        let mut chain = Blockchain::new();
        let block = chain.generate_next_block("local");
        chain.add_block(block).unwrap();
        let before = chain.blocks().to_vec();

        let fork = extended(&Blockchain::new(), 1, "remote");
        assert_eq!(
            chain.replace_chain(fork),
            Err(ChainError::ChainNotLonger { candidate: 2, local: 2 })
        );
        assert_eq!(chain.blocks(), before.as_slice());
    }

    #[test]
    fn test_invalid_longer_chain_is_rejected() {
        let mut chain = Blockchain::new();
        let mut fork = extended(&chain, 3, "remote");
        fork[2].data = "tampered".to_string();

        assert!(matches!(
            chain.replace_chain(fork),
            Err(ChainError::ChainInvalid { position: 2, .. })
        ));
        assert_eq!(chain.len(), 1);
    }
}
