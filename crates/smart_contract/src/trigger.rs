//! `TriggerType` (spec §4.5): which stage of block/transaction processing an
//! `ApplicationEngine` run serves.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerType {
    OnPersist,
    PostPersist,
    Verification,
    Application,
}
