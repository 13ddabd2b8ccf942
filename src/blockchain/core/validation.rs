use crate::error::ChainError;
use crate::miner::ProofOfWork;

use super::chain::{Block, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};

/// Walks `blocks` and checks the chain invariants: a well-formed genesis,
/// contiguous 1-based indices, hash linkage, and a valid proof on every
/// block after genesis.
pub fn validate_chain(blocks: &[Block], pow: &ProofOfWork) -> Result<(), ChainError> {
    let genesis = blocks.first().ok_or(ChainError::EmptyChain)?;
    if genesis.index != 1
        || genesis.proof != GENESIS_PROOF
        || genesis.previous_hash != GENESIS_PREVIOUS_HASH
    {
        return Err(ChainError::InvalidBlock(format!(
            "Malformed genesis block (index {}, proof {}, previous hash {}).",
            genesis.index, genesis.proof, genesis.previous_hash
        )));
    }

    for pair in blocks.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);

        if block.index != prev.index + 1 {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid block index. Expected {}, but got {}.",
                prev.index + 1,
                block.index
            )));
        }

        let expected_hash = prev.hash();
        if block.previous_hash != expected_hash {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid previous block hash at index {}. Expected {}, but got {}.",
                block.index, expected_hash, block.previous_hash
            )));
        }

        if !pow.valid(prev.proof, block.proof) {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid proof {} at index {} for last proof {}.",
                block.proof, block.index, prev.proof
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;

    fn mined_chain() -> Blockchain {
        let mut chain = Blockchain::with_proof_of_work(ProofOfWork::new(2), 1);
        chain.submit_transaction("A", "B", 5u64).unwrap();
        chain.mine("node").unwrap();
        chain.mine("node").unwrap();
        chain
    }

    #[test]
    fn test_valid_chain_passes() {
        let chain = mined_chain();
        assert!(validate_chain(chain.blocks(), chain.proof_of_work()).is_ok());
    }

    #[test]
    fn test_empty_chain_fails() {
        assert!(matches!(
            validate_chain(&[], &ProofOfWork::default()),
            Err(ChainError::EmptyChain)
        ));
    }

    #[test]
    fn test_tampered_transaction_breaks_linkage() {
        let chain = mined_chain();
        let mut blocks = chain.blocks().to_vec();
        blocks[1].transactions[0].recipient = "mallory".into();
        let err = validate_chain(&blocks, chain.proof_of_work()).unwrap_err();
        assert!(err.to_string().contains("previous block hash"));
    }

    #[test]
    fn test_bad_proof_detected() {
        let mut chain = Blockchain::with_proof_of_work(ProofOfWork::new(2), 1);
        // 0 is never a solution: sha256("0") does not end in "00"
        chain.seal_block(0, None).unwrap();
        let err = chain.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid proof"));
    }

    #[test]
    fn test_index_gap_detected() {
        let chain = mined_chain();
        let mut blocks = chain.blocks().to_vec();
        blocks.remove(1);
        assert!(validate_chain(&blocks, chain.proof_of_work()).is_err());
    }
}
