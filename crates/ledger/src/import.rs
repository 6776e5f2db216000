//! Block import from a `.acc`/`.acc.zip` snapshot (spec §4.5): a stream of
//! length-prefixed serialized blocks, replayed through the same
//! persistence pipeline `persist_block` uses for synced blocks.

use neo_core::Block;
use neo_io::{MemoryReader, Serializable};

use crate::blockchain::Blockchain;
use crate::error::{LedgerError, LedgerResult};

/// Largest single block payload an import stream may declare.
pub const MAX_IMPORT_RECORD_SIZE: usize = 10 * 1024 * 1024;

/// Imports a raw (already decompressed) `.acc` stream: `{blockCount:u32}`
/// followed by `blockCount` `{size:i32, payload[size]}` records. Returns
/// the number of blocks actually persisted (already-present blocks, by
/// index, are skipped rather than re-verified).
pub fn import_acc(chain: &Blockchain, bytes: &[u8]) -> LedgerResult<u32> {
    let mut reader = MemoryReader::new(bytes);
    let block_count = reader.read_u32()?;
    let mut imported = 0;
    for _ in 0..block_count {
        let size = reader.read_i32()?;
        if size <= 0 || size as usize > MAX_IMPORT_RECORD_SIZE {
            return Err(LedgerError::ImportRecordTooLarge);
        }
        let payload = reader.read_bytes(size as usize)?;
        let mut block_reader = MemoryReader::new(&payload);
        let block = Block::deserialize(&mut block_reader)?;

        if chain.get_block_hash(block.index()).is_some() {
            continue;
        }
        chain.persist_block(block)?;
        imported += 1;
    }
    Ok(imported)
}

/// Imports every `.acc` entry inside a `.acc.zip` archive, in archive
/// order.
pub fn import_acc_zip(chain: &Blockchain, zip_bytes: &[u8]) -> LedgerResult<u32> {
    let cursor = std::io::Cursor::new(zip_bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|e| LedgerError::Zip(e.to_string()))?;
    let mut imported = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| LedgerError::Zip(e.to_string()))?;
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut bytes).map_err(|e| LedgerError::Zip(e.to_string()))?;
        imported += import_acc(chain, &bytes)?;
    }
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_adapter::ChainStore;
    use neo_core::{BlockHeader, UInt256, Witness};
    use neo_io::BinaryWriter;
    use neo_persistence::MemoryStore;
    use std::sync::Arc;

    fn chain() -> Blockchain {
        let store: ChainStore = Arc::new(MemoryStore::new());
        Blockchain::open(store, neo_config::ProtocolSettings::private_net()).unwrap()
    }

    fn authorized_child_block(chain: &Blockchain) -> Block {
        let tip_hash = chain.current_hash();
        let next_consensus = crate::blockchain::genesis_authority();
        let mut header = BlockHeader {
            version: 0,
            previous_hash: tip_hash,
            merkle_root: UInt256::ZERO,
            timestamp: 1,
            nonce: 0,
            index: chain.height() + 1,
            primary_index: 0,
            next_consensus,
            witness: Witness::new(vec![], crate::blockchain::genesis_authority_script()),
        };
        let block = Block { header: header.clone(), transactions: vec![] };
        header.merkle_root = block.compute_merkle_root();
        Block { header, transactions: vec![] }
    }

    fn encode_acc_stream(blocks: &[Block]) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        writer.write_u32(blocks.len() as u32).unwrap();
        for block in blocks {
            let mut block_writer = BinaryWriter::new();
            block.serialize(&mut block_writer).unwrap();
            let payload = block_writer.to_bytes();
            writer.write_i32(payload.len() as i32).unwrap();
            writer.write_bytes(&payload).unwrap();
        }
        writer.to_bytes()
    }

    #[test]
    fn imports_a_single_block_from_an_acc_stream() {
        let chain = chain();
        let block = authorized_child_block(&chain);
        let hash = block.hash();
        let stream = encode_acc_stream(&[block]);

        let imported = import_acc(&chain, &stream).unwrap();
        assert_eq!(imported, 1);
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.current_hash(), hash);
    }

    #[test]
    fn skips_blocks_already_present() {
        let chain = chain();
        let block = authorized_child_block(&chain);
        chain.persist_block(block.clone()).unwrap();

        let stream = encode_acc_stream(&[block]);
        let imported = import_acc(&chain, &stream).unwrap();
        assert_eq!(imported, 0);
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn rejects_a_declared_size_of_zero() {
        let chain = chain();
        let mut writer = BinaryWriter::new();
        writer.write_u32(1).unwrap();
        writer.write_i32(0).unwrap();
        let stream = writer.to_bytes();
        assert!(matches!(import_acc(&chain, &stream), Err(LedgerError::ImportRecordTooLarge)));
    }
}
