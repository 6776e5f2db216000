//! Blocks: a header plus the ordered transactions it commits.

use crate::transaction::Transaction;
use crate::uint::{UInt160, UInt256};
use crate::witness::Witness;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub previous_hash: UInt256,
    pub merkle_root: UInt256,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub nonce: u64,
    pub index: u32,
    /// Index, within the current validator set, of the speaker that proposed
    /// this block.
    pub primary_index: u8,
    /// Script hash of the next block's multi-signature validator committee.
    pub next_consensus: UInt160,
    pub witness: Witness,
}

impl BlockHeader {
    fn write_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.version)?;
        writer.write_bytes(self.previous_hash.as_bytes())?;
        writer.write_bytes(self.merkle_root.as_bytes())?;
        writer.write_u64(self.timestamp)?;
        writer.write_u64(self.nonce)?;
        writer.write_u32(self.index)?;
        writer.write_u8(self.primary_index)?;
        writer.write_bytes(self.next_consensus.as_bytes())
    }

    pub fn hash(&self) -> UInt256 {
        let mut writer = BinaryWriter::new();
        self.write_unsigned(&mut writer)
            .expect("serializing an in-memory header cannot fail");
        UInt256::new(neo_cryptography::hash256(&writer.to_bytes()))
    }
}

impl Serializable for BlockHeader {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.write_unsigned(writer)?;
        // A header carries exactly one witness, but the wire form uses the
        // same var-length array encoding as a transaction's witness list.
        writer.write_var_int(1)?;
        self.witness.serialize(writer)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let version = reader.read_u32()?;
        let previous_hash = UInt256::deserialize(reader)?;
        let merkle_root = UInt256::deserialize(reader)?;
        let timestamp = reader.read_u64()?;
        let nonce = reader.read_u64()?;
        let index = reader.read_u32()?;
        let primary_index = reader.read_u8()?;
        let next_consensus = UInt160::deserialize(reader)?;
        let witness_count = reader.read_var_int(1)?;
        if witness_count != 1 {
            return Err(neo_io::IoError::format(
                reader.position(),
                "block header must carry exactly one witness",
            ));
        }
        let witness = Witness::deserialize(reader)?;

        Ok(Self {
            version,
            previous_hash,
            merkle_root,
            timestamp,
            nonce,
            index,
            primary_index,
            next_consensus,
            witness,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> UInt256 {
        self.header.hash()
    }

    pub fn index(&self) -> u32 {
        self.header.index
    }

    /// Recomputes the Merkle root over this block's transaction hashes.
    pub fn compute_merkle_root(&self) -> UInt256 {
        let leaves: Vec<[u8; 32]> = self
            .transactions
            .iter()
            .map(|tx| tx.hash().0)
            .collect();
        UInt256::new(neo_cryptography::merkle_root(&leaves))
    }
}

impl Serializable for Block {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.header.serialize(writer)?;
        writer.write_serializable_list(&self.transactions)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let header = BlockHeader::deserialize(reader)?;
        let transactions =
            reader.read_serializable_list::<Transaction>(MAX_TRANSACTIONS_PER_BLOCK as u64)?;
        Ok(Self {
            header,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 0,
            previous_hash: UInt256::ZERO,
            merkle_root: UInt256::ZERO,
            timestamp: 1_600_000_000_000,
            nonce: 42,
            index: 7,
            primary_index: 0,
            next_consensus: UInt160::ZERO,
            witness: Witness::new(vec![], vec![0x51]),
        }
    }

    #[test]
    fn header_round_trips() {
        let header = sample_header();
        let bytes = header.to_bytes();
        let decoded = BlockHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn block_with_no_transactions_merkle_root_is_zero() {
        let block = Block {
            header: sample_header(),
            transactions: vec![],
        };
        assert_eq!(block.compute_merkle_root(), UInt256::ZERO);
    }

    #[test]
    fn block_round_trips() {
        let block = Block {
            header: sample_header(),
            transactions: vec![],
        };
        let bytes = block.to_bytes();
        let decoded = Block::from_bytes(&bytes).unwrap();
        assert_eq!(block, decoded);
    }
}
