//! Fixed-size slot storage backing static fields, local variables, and
//! arguments (`INITSSLOT`/`INITSLOT` + `LDLOC`/`STLOC`/`LDARG`/`STARG`/
//! `LDSFLD`/`STSFLD`). Every slot starts `Null` and keeps the reference
//! counter in sync on overwrite, same as the evaluation stack.

use crate::error::{VmError, VmResult};
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;

pub struct Slots {
    items: Vec<StackItem>,
}

impl Slots {
    pub fn new(count: usize) -> Self {
        Self { items: vec![StackItem::Null; count] }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> VmResult<StackItem> {
        self.items
            .get(index)
            .cloned()
            .ok_or_else(|| VmError::InvalidOperation(format!("slot index {index} out of range")))
    }

    pub fn set(&mut self, index: usize, value: StackItem, rc: &mut ReferenceCounter) -> VmResult<()> {
        if index >= self.items.len() {
            return Err(VmError::InvalidOperation(format!("slot index {index} out of range")));
        }
        if let Some(h) = value.compound_handle() {
            rc.add_stack_ref(h);
        }
        let old = std::mem::replace(&mut self.items[index], value);
        if let Some(h) = old.compound_handle() {
            rc.remove_stack_ref(h);
        }
        Ok(())
    }

    pub fn clear(&mut self, rc: &mut ReferenceCounter) {
        for item in self.items.drain(..) {
            if let Some(h) = item.compound_handle() {
                rc.remove_stack_ref(h);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slots_are_null() {
        let slots = Slots::new(3);
        assert!(matches!(slots.get(0).unwrap(), StackItem::Null));
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut rc = ReferenceCounter::new();
        let mut slots = Slots::new(2);
        slots.set(0, StackItem::Boolean(true), &mut rc).unwrap();
        assert!(matches!(slots.get(0).unwrap(), StackItem::Boolean(true)));
    }
}
