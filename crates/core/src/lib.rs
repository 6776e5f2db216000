//! Neo N3 protocol data model: fixed hashes, transactions, blocks, signers,
//! witnesses, attributes, and storage keys/items (spec §3).
//!
//! Every type here implements [`neo_io::Serializable`] against the byte-exact
//! wire format; hashing and validation invariants live alongside the type
//! they govern rather than in a separate validation layer.

pub mod attribute;
pub mod block;
pub mod error;
pub mod signer;
pub mod storage;
pub mod transaction;
pub mod uint;
pub mod witness;
pub mod witness_rule;
pub mod witness_scope;

pub use attribute::{OracleResponseCode, TransactionAttribute};
pub use block::{Block, BlockHeader, MAX_TRANSACTIONS_PER_BLOCK};
pub use error::{CoreError, CoreResult};
pub use signer::Signer;
pub use storage::{StorageItem, StorageKey};
pub use transaction::{Transaction, MAX_SCRIPT_LENGTH, MAX_TRANSACTION_ATTRIBUTES, MAX_TRANSACTION_SIZE};
pub use uint::{UInt160, UInt256};
pub use witness::{Witness, MAX_INVOCATION_SCRIPT, MAX_VERIFICATION_SCRIPT};
pub use witness_rule::{WitnessCondition, WitnessRule, WitnessRuleAction, MAX_NESTING_DEPTH, MAX_SUBITEMS};
pub use witness_scope::WitnessScope;
