//! P2P payload types (spec §4.7): the deterministic binary form each
//! `MessageCommand` carries, following the codec conventions of §4.1.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use neo_core::{Block, BlockHeader, Transaction, UInt160, UInt256, Witness};
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};

use crate::command::InventoryType;

/// Maximum hashes an `inv`/`getdata`/`notfound` payload may carry in one
/// message.
pub const MAX_INVENTORY_HASHES: u64 = 500;
/// Maximum headers returned by a single `headers` payload.
pub const MAX_HEADERS: u64 = 2_000;
/// Maximum addresses carried by one `addr` payload.
pub const MAX_ADDRESSES: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPayload {
    pub network: u32,
    pub version: u32,
    pub timestamp: u32,
    pub nonce: u32,
    pub user_agent: String,
    pub start_height: u32,
    pub relay: bool,
}

impl Serializable for VersionPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.network)?;
        writer.write_u32(self.version)?;
        writer.write_u32(self.timestamp)?;
        writer.write_u32(self.nonce)?;
        writer.write_var_string(&self.user_agent)?;
        writer.write_u32(self.start_height)?;
        writer.write_bool(self.relay)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self {
            network: reader.read_u32()?,
            version: reader.read_u32()?,
            timestamp: reader.read_u32()?,
            nonce: reader.read_u32()?,
            user_agent: reader.read_var_string(256)?,
            start_height: reader.read_u32()?,
            relay: reader.read_bool()?,
        })
    }
}

/// A single advertised peer address, IPv6-mapped per the Bitcoin-style
/// convention the reference client also uses for its `addr` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAddress {
    pub timestamp: u32,
    pub ip: IpAddr,
    pub port: u16,
}

impl Serializable for NetworkAddress {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.timestamp)?;
        let mapped: Ipv6Addr = match self.ip {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        writer.write_bytes(&mapped.octets())?;
        writer.write_u16(self.port)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let timestamp = reader.read_u32()?;
        let octets = reader.read_bytes(16)?;
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&octets);
        let v6 = Ipv6Addr::from(buf);
        let ip = v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6));
        let port = reader.read_u16()?;
        Ok(Self { timestamp, ip, port })
    }
}

impl NetworkAddress {
    pub fn new(ip: Ipv4Addr, port: u16, timestamp: u32) -> Self {
        Self { timestamp, ip: IpAddr::V4(ip), port }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrPayload {
    pub addresses: Vec<NetworkAddress>,
}

impl Serializable for AddrPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_int(self.addresses.len() as u64)?;
        for addr in &self.addresses {
            addr.serialize(writer)?;
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let count = reader.read_var_int(MAX_ADDRESSES)?;
        let mut addresses = Vec::with_capacity(count as usize);
        for _ in 0..count {
            addresses.push(NetworkAddress::deserialize(reader)?);
        }
        Ok(Self { addresses })
    }
}

/// Shared shape for `inv`, `getdata`, and `notfound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryPayload {
    pub inventory_type: InventoryType,
    pub hashes: Vec<UInt256>,
}

impl Serializable for InventoryPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.inventory_type.to_byte())?;
        writer.write_serializable_list(&self.hashes)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let inventory_type = InventoryType::from_byte(reader.read_u8()?)
            .map_err(|e| IoError::format(reader.position(), e.to_string()))?;
        let hashes = reader.read_serializable_list(MAX_INVENTORY_HASHES)?;
        Ok(Self { inventory_type, hashes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlocksPayload {
    pub hash_start: UInt256,
    pub count: i16,
}

impl Serializable for GetBlocksPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.hash_start.serialize(writer)?;
        writer.write_i16(self.count)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self { hash_start: UInt256::deserialize(reader)?, count: reader.read_i16()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedRangePayload {
    pub index_start: u32,
    pub count: i16,
}

impl Serializable for IndexedRangePayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.index_start)?;
        writer.write_i16(self.count)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self { index_start: reader.read_u32()?, count: reader.read_i16()? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersPayload {
    pub headers: Vec<BlockHeader>,
}

impl Serializable for HeadersPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_serializable_list(&self.headers)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self { headers: reader.read_serializable_list(MAX_HEADERS)? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPayload {
    pub block: Block,
}

impl Serializable for BlockPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.block.serialize(writer)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self { block: Block::deserialize(reader)? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPayload {
    pub transaction: Transaction,
}

impl Serializable for TransactionPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.transaction.serialize(writer)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self { transaction: Transaction::deserialize(reader)? })
    }
}

/// `(lastBlockIndex, timestamp, nonce)` heartbeat carried by both `ping`
/// and `pong` — the listener echoes the dialer's `nonce` so RTT can be
/// measured from the `timestamp` round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPayload {
    pub last_block_index: u32,
    pub timestamp: u32,
    pub nonce: u32,
}

impl Serializable for PingPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.last_block_index)?;
        writer.write_u32(self.timestamp)?;
        writer.write_u32(self.nonce)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self {
            last_block_index: reader.read_u32()?,
            timestamp: reader.read_u32()?,
            nonce: reader.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlockPayload {
    pub header: BlockHeader,
    pub transaction_count: u32,
    pub hashes: Vec<UInt256>,
    pub flags: Vec<u8>,
}

impl Serializable for MerkleBlockPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.header.serialize(writer)?;
        writer.write_u32(self.transaction_count)?;
        writer.write_serializable_list(&self.hashes)?;
        writer.write_var_bytes(&self.flags)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self {
            header: BlockHeader::deserialize(reader)?,
            transaction_count: reader.read_u32()?,
            hashes: reader.read_serializable_list(MAX_INVENTORY_HASHES)?,
            flags: reader.read_var_bytes(neo_core::MAX_TRANSACTIONS_PER_BLOCK as u64 / 8 + 1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLoadPayload {
    pub filter: Vec<u8>,
    pub k: u8,
    pub tweak: u32,
}

impl Serializable for FilterLoadPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.filter)?;
        writer.write_u8(self.k)?;
        writer.write_u32(self.tweak)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self { filter: reader.read_var_bytes(36_000)?, k: reader.read_u8()?, tweak: reader.read_u32()? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterAddPayload {
    pub data: Vec<u8>,
}

impl Serializable for FilterAddPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.data)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self { data: reader.read_var_bytes(520)? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectPayload {
    pub rejected_command: u8,
    pub reason_code: u8,
    pub message: String,
}

impl Serializable for RejectPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.rejected_command)?;
        writer.write_u8(self.reason_code)?;
        writer.write_var_string(&self.message)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        Ok(Self {
            rejected_command: reader.read_u8()?,
            reason_code: reader.read_u8()?,
            message: reader.read_var_string(256)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensiblePayload {
    pub category: String,
    pub valid_block_start: u32,
    pub valid_block_end: u32,
    pub sender: UInt160,
    pub data: Vec<u8>,
    pub witness: Witness,
}

impl Serializable for ExtensiblePayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_string(&self.category)?;
        writer.write_u32(self.valid_block_start)?;
        writer.write_u32(self.valid_block_end)?;
        self.sender.serialize(writer)?;
        writer.write_var_bytes(&self.data)?;
        writer.write_var_int(1)?;
        self.witness.serialize(writer)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let category = reader.read_var_string(32)?;
        let valid_block_start = reader.read_u32()?;
        let valid_block_end = reader.read_u32()?;
        let sender = UInt160::deserialize(reader)?;
        let data = reader.read_var_bytes(neo_core::transaction::MAX_SCRIPT_LENGTH as u64)?;
        let witness_count = reader.read_var_int(1)?;
        if witness_count != 1 {
            return Err(IoError::format(reader.position(), "extensible payload must carry exactly one witness"));
        }
        let witness = Witness::deserialize(reader)?;
        Ok(Self { category, valid_block_start, valid_block_end, sender, data, witness })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_payload_round_trips() {
        let payload = VersionPayload {
            network: 0x334F_454E,
            version: 0,
            timestamp: 123,
            nonce: 456,
            user_agent: "/neo:3.7.0/".to_string(),
            start_height: 10,
            relay: true,
        };
        let bytes = payload.to_bytes();
        assert_eq!(VersionPayload::from_bytes(&bytes).unwrap(), payload);
    }

    #[test]
    fn network_address_round_trips_an_ipv4() {
        let addr = NetworkAddress::new(Ipv4Addr::new(127, 0, 0, 1), 10333, 0);
        let bytes = addr.to_bytes();
        let decoded = NetworkAddress::deserialize(&mut MemoryReader::new(&bytes)).unwrap();
        assert_eq!(decoded.ip, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(decoded.port, 10333);
    }

    #[test]
    fn inventory_payload_round_trips() {
        let payload = InventoryPayload { inventory_type: InventoryType::Block, hashes: vec![UInt256::ZERO] };
        let bytes = payload.to_bytes();
        assert_eq!(InventoryPayload::from_bytes(&bytes).unwrap(), payload);
    }

    #[test]
    fn ping_payload_round_trips() {
        let payload = PingPayload { last_block_index: 7, timestamp: 99, nonce: 1 };
        let bytes = payload.to_bytes();
        assert_eq!(PingPayload::from_bytes(&bytes).unwrap(), payload);
    }
}
