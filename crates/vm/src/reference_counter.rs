//! Arena owning every compound (`Array`/`Struct`/`Map`/`Buffer`) stack item
//! for a single VM instance, plus the mark-and-sweep pass that reclaims
//! reference cycles a plain refcount can't (spec §4.3, §9 design note).
//!
//! Rather than shared pointers with cycle-breaking GC (the source
//! implementation's approach), compound items are stored by integer handle
//! in an arena owned by the `ReferenceCounter`. A handle's `stack_refs`
//! counts how many evaluation-stack slots / static fields / locals /
//! arguments directly hold it; when that count reaches zero the handle
//! becomes a sweep candidate. `sweep()` computes reachability from every
//! handle still directly on a stack and frees sweep candidates that are not
//! reachable — this is what reclaims cycles (two compounds referencing only
//! each other, held nowhere else).

use crate::stack_item::{CompoundData, StackItem};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub usize);

struct Slot {
    stack_refs: u32,
    data: CompoundData,
}

pub struct ReferenceCounter {
    arena: Vec<Option<Slot>>,
    free_list: Vec<usize>,
    zero_referred: HashSet<Handle>,
    /// Sweep runs automatically once this many candidates accumulate.
    sweep_threshold: usize,
}

impl ReferenceCounter {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            free_list: Vec::new(),
            zero_referred: HashSet::new(),
            sweep_threshold: 64,
        }
    }

    pub fn count(&self) -> usize {
        self.arena.iter().filter(|s| s.is_some()).count()
    }

    /// Allocates a new compound with zero on-stack references; the caller
    /// must call [`Self::add_stack_ref`] once it is placed somewhere.
    pub fn alloc(&mut self, data: CompoundData) -> Handle {
        let slot = Slot { stack_refs: 0, data };
        if let Some(idx) = self.free_list.pop() {
            self.arena[idx] = Some(slot);
            Handle(idx)
        } else {
            self.arena.push(Some(slot));
            Handle(self.arena.len() - 1)
        }
    }

    pub fn data(&self, handle: Handle) -> &CompoundData {
        &self.arena[handle.0].as_ref().expect("dangling handle").data
    }

    pub fn data_mut(&mut self, handle: Handle) -> &mut CompoundData {
        &mut self.arena[handle.0].as_mut().expect("dangling handle").data
    }

    pub fn add_stack_ref(&mut self, handle: Handle) {
        if let Some(slot) = self.arena[handle.0].as_mut() {
            slot.stack_refs += 1;
            self.zero_referred.remove(&handle);
        }
    }

    pub fn remove_stack_ref(&mut self, handle: Handle) {
        if let Some(slot) = self.arena[handle.0].as_mut() {
            debug_assert!(slot.stack_refs > 0, "refcount underflow on {:?}", handle);
            slot.stack_refs = slot.stack_refs.saturating_sub(1);
            if slot.stack_refs == 0 {
                self.zero_referred.insert(handle);
            }
        }
        if self.zero_referred.len() >= self.sweep_threshold {
            self.sweep();
        }
    }

    pub fn pending_sweep_count(&self) -> usize {
        self.zero_referred.len()
    }

    /// Reclaims every zero-referred handle unreachable from a currently
    /// live (`stack_refs > 0`) handle, including cyclic subgraphs.
    pub fn sweep(&mut self) {
        if self.zero_referred.is_empty() {
            return;
        }
        let mut visited: HashSet<Handle> = HashSet::new();
        let mut worklist: Vec<Handle> = (0..self.arena.len())
            .filter_map(|i| {
                self.arena[i]
                    .as_ref()
                    .filter(|s| s.stack_refs > 0)
                    .map(|_| Handle(i))
            })
            .collect();

        while let Some(handle) = worklist.pop() {
            if !visited.insert(handle) {
                continue;
            }
            if let Some(slot) = &self.arena[handle.0] {
                for child in slot.data.child_handles() {
                    worklist.push(child);
                }
            }
        }

        let garbage: Vec<Handle> = self
            .zero_referred
            .iter()
            .copied()
            .filter(|h| !visited.contains(h))
            .collect();
        for handle in garbage {
            self.zero_referred.remove(&handle);
            self.arena[handle.0] = None;
            self.free_list.push(handle.0);
        }
    }

    /// Structural equality for `Struct` items (spec §3.5): recursively
    /// compares contents up to `max_depth`, returning `false` (not an
    /// error) if the depth limit is exhausted, matching the reference
    /// engine's fail-closed behavior on pathological nesting.
    pub fn structural_equals(&self, a: &StackItem, b: &StackItem, max_depth: u32) -> bool {
        self.equals_inner(a, b, max_depth)
    }

    fn equals_inner(&self, a: &StackItem, b: &StackItem, depth: u32) -> bool {
        if depth == 0 {
            return false;
        }
        match (a, b) {
            (StackItem::Null, StackItem::Null) => true,
            (StackItem::Boolean(x), StackItem::Boolean(y)) => x == y,
            (StackItem::Integer(x), StackItem::Integer(y)) => x == y,
            (StackItem::ByteString(x), StackItem::ByteString(y)) => x == y,
            (StackItem::Buffer(x), StackItem::Buffer(y)) => x == y,
            (StackItem::Array(x), StackItem::Array(y)) => x == y,
            (StackItem::Map(x), StackItem::Map(y)) => x == y,
            (StackItem::Struct(x), StackItem::Struct(y)) => {
                if x == y {
                    return true;
                }
                let (CompoundData::Struct(xs), CompoundData::Struct(ys)) =
                    (self.data(*x), self.data(*y))
                else {
                    return false;
                };
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys.iter())
                        .all(|(l, r)| self.equals_inner(l, r, depth - 1))
            }
            _ => false,
        }
    }
}

impl Default for ReferenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn alloc_and_free_reuses_slots() {
        let mut rc = ReferenceCounter::new();
        let h = rc.alloc(CompoundData::Array(vec![]));
        rc.add_stack_ref(h);
        rc.remove_stack_ref(h);
        rc.sweep();
        assert_eq!(rc.count(), 0);
        let h2 = rc.alloc(CompoundData::Array(vec![]));
        assert_eq!(h2.0, h.0);
    }

    #[test]
    fn reachable_child_survives_parent_sweep_trigger() {
        let mut rc = ReferenceCounter::new();
        let child = rc.alloc(CompoundData::Array(vec![]));
        rc.add_stack_ref(child);
        let parent = rc.alloc(CompoundData::Array(vec![StackItem::Array(child)]));
        rc.add_stack_ref(parent);
        // child is referenced both on-stack and as parent's element.
        rc.remove_stack_ref(child);
        rc.sweep();
        assert_eq!(rc.count(), 2, "child reachable via parent must survive");
    }

    #[test]
    fn two_item_cycle_is_collected_once_unreachable() {
        let mut rc = ReferenceCounter::new();
        let a = rc.alloc(CompoundData::Array(vec![]));
        let b = rc.alloc(CompoundData::Array(vec![StackItem::Array(a)]));
        *rc.data_mut(a) = CompoundData::Array(vec![StackItem::Array(b)]);
        // Both items briefly sat on the evaluation stack while being built,
        // same as real VM construction, so both enter `zero_referred` once
        // popped — not just `a`.
        rc.add_stack_ref(b);
        rc.remove_stack_ref(b);
        rc.add_stack_ref(a);
        rc.remove_stack_ref(a);
        rc.sweep();
        assert_eq!(rc.count(), 0, "a<->b cycle with no external refs must be collected");
    }

    #[test]
    fn struct_equality_is_structural() {
        let mut rc = ReferenceCounter::new();
        let a = rc.alloc(CompoundData::Struct(vec![StackItem::Integer(BigInt::from(1))]));
        let b = rc.alloc(CompoundData::Struct(vec![StackItem::Integer(BigInt::from(1))]));
        assert!(rc.structural_equals(&StackItem::Struct(a), &StackItem::Struct(b), 8));
    }

    #[test]
    fn array_equality_is_by_identity_not_structure() {
        let mut rc = ReferenceCounter::new();
        let a = rc.alloc(CompoundData::Array(vec![StackItem::Integer(BigInt::from(1))]));
        let b = rc.alloc(CompoundData::Array(vec![StackItem::Integer(BigInt::from(1))]));
        assert!(!rc.structural_equals(&StackItem::Array(a), &StackItem::Array(b), 8));
    }
}
