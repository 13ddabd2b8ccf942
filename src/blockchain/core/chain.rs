use crate::crypto::sha256_hex;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::ProofOfWork;
use crate::transaction::Transaction;
use serde_json::Value;
use tracing::{debug, info};

use super::validation::validate_chain;

/// Proof carried by the genesis block; the first mined block solves against it.
pub const GENESIS_PROOF: u64 = 100;
/// `previous_hash` of the genesis block. A literal marker, not a digest.
pub const GENESIS_PREVIOUS_HASH: &str = "1";
pub const DEFAULT_MINING_REWARD: u64 = 1;

/// A sealed block. Field order here is the order used in JSON responses;
/// hashing uses [`Block::canonical_json`] instead.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// Hex SHA-256 of the block's canonical JSON.
    pub fn hash(&self) -> String {
        sha256_hex(self.canonical_json().as_bytes())
    }

    /// Compact JSON with the fields in fixed lexicographic order:
    /// `index`, `previous_hash`, `proof`, `timestamp`, `transactions`.
    /// Transactions keep their own `sender`, `recipient`, `amount` order.
    pub fn canonical_json(&self) -> String {
        let transactions: Vec<String> = self
            .transactions
            .iter()
            .map(Transaction::canonical_json)
            .collect();
        format!(
            r#"{{"index":{},"previous_hash":{},"proof":{},"timestamp":{},"transactions":[{}]}}"#,
            self.index,
            Value::from(self.previous_hash.as_str()),
            self.proof,
            self.timestamp,
            transactions.join(",")
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1
    }
}

pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
    pow: ProofOfWork,
    mining_reward: u64,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a new `Blockchain` at the default difficulty.
    pub fn new() -> Self {
        Self::with_proof_of_work(ProofOfWork::default(), DEFAULT_MINING_REWARD)
    }

    /// Create a new `Blockchain` that mines with `pow` and credits
    /// `mining_reward` per block.
    pub fn with_proof_of_work(pow: ProofOfWork, mining_reward: u64) -> Self {
        let mut blockchain = Blockchain {
            blocks: vec![],
            mempool: Mempool::new(),
            pow,
            mining_reward,
        };
        blockchain.create_genesis_block();
        blockchain
    }

    fn create_genesis_block(&mut self) {
        let genesis = Block {
            index: 1,
            timestamp: chrono::Utc::now().timestamp(),
            transactions: vec![],
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        };
        info!(hash = %genesis.hash(), "Genesis block created");
        self.blocks.push(genesis);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false for a chain built through this type.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Snapshot of the whole chain and its length.
    pub fn get_chain(&self) -> (Vec<Block>, usize) {
        (self.blocks.clone(), self.blocks.len())
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn mining_reward(&self) -> u64 {
        self.mining_reward
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Queues a transaction and returns the index of the block it is
    /// expected to land in.
    ///
    /// The index is advisory: it is the next block number at submission
    /// time, and a concurrent mine may seal that block first.
    pub fn submit_transaction(
        &mut self,
        sender: impl Into<Value>,
        recipient: impl Into<Value>,
        amount: impl Into<Value>,
    ) -> Result<u64, ChainError> {
        self.add_transaction(Transaction::new(sender, recipient, amount))
    }

    pub fn add_transaction(&mut self, tx: Transaction) -> Result<u64, ChainError> {
        let next_index = self.last_block()?.index + 1;
        debug!(
            sender = %tx.sender,
            recipient = %tx.recipient,
            amount = %tx.amount,
            next_index,
            "Transaction queued"
        );
        self.mempool.add_transaction(tx);
        Ok(next_index)
    }

    /// Appends a block holding every pending transaction.
    ///
    /// Without an explicit `previous_hash` the block links to the digest of
    /// the current last block.
    pub fn seal_block(
        &mut self,
        proof: u64,
        previous_hash: Option<String>,
    ) -> Result<Block, ChainError> {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self.last_block()?.hash(),
        };

        let block = Block {
            index: self.blocks.len() as u64 + 1,
            timestamp: chrono::Utc::now().timestamp(),
            transactions: self.mempool.drain(),
            proof,
            previous_hash,
        };

        info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "Block sealed"
        );

        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Credits the mining reward to `node_id` and seals the next block with
    /// an already-found `proof`, linked to the digest of the last block.
    ///
    /// `proof` must solve the puzzle of the current last block; callers that
    /// searched outside a lock must re-check the tip first.
    pub fn forge_block(&mut self, proof: u64, node_id: &str) -> Result<Block, ChainError> {
        self.add_transaction(Transaction::reward(node_id, self.mining_reward))?;
        let previous_hash = self.last_block()?.hash();
        self.seal_block(proof, Some(previous_hash))
    }

    /// Finds a proof for the last block and forges the next block.
    /// Holds `&mut self` for the whole search.
    pub fn mine(&mut self, node_id: &str) -> Result<Block, ChainError> {
        let last_proof = self.last_block()?.proof;
        let proof = self.pow.find(last_proof);
        self.forge_block(proof, node_id)
    }

    /// Checks every structural invariant of the chain.
    pub fn validate(&self) -> Result<(), ChainError> {
        validate_chain(&self.blocks, &self.pow)
    }
}
