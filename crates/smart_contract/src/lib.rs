//! Contract execution: the application engine that runs NEF scripts
//! against a ledger snapshot, the `System.*` syscall table, and the
//! built-in native contracts (spec §4.4/§4.5).

pub mod application_engine;
pub mod contract_state;
pub mod error;
pub mod interop;
pub mod manifest;
pub mod native;
pub mod nef;
pub mod trigger;

pub use application_engine::{AppContext, ApplicationEngine, Container, LogEvent, NotifyEvent};
pub use contract_state::ContractState;
pub use error::{ScError, ScResult};
pub use manifest::ContractManifest;
pub use native::{NativeContract, NativeMethod, NativeRegistry, Oracle};
pub use nef::NefFile;
pub use trigger::TriggerType;
