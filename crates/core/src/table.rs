//! Open-addressed hash table
//!
//! Linear probing with tombstones, keyed by interned string objects. Keys
//! hash with the hash stored in the object and compare by reference identity,
//! so lookups never touch string bytes. The one exception is
//! [`Table::find_string`], the content-comparing probe the intern set uses to
//! decide whether a string already exists.
//!
//! `count` includes tombstones. That keeps the load factor honest under
//! delete/insert churn; without it a probe chain can grow without bound while
//! the table looks half empty. Growth discards tombstones and re-inserts the
//! live entries.

use crate::object::Obj;
use std::rc::Rc;

const MIN_CAPACITY: usize = 8;

enum Slot<V> {
    Empty,
    Tombstone,
    Occupied { key: Rc<Obj>, value: V },
}

/// Hash table from interned strings to `V`.
pub struct Table<V> {
    slots: Vec<Slot<V>>,
    /// Occupied slots plus tombstones.
    count: usize,
    tombstones: usize,
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Table {
            slots: Vec::new(),
            count: 0,
            tombstones: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.count - self.tombstones
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Probe for `key`. Returns the slot holding it, or the slot an insert
    /// should use: the first tombstone crossed if any, else the terminating
    /// empty slot. Capacity must be non-zero.
    fn find_slot(slots: &[Slot<V>], key: &Rc<Obj>) -> usize {
        let mask = slots.len() - 1;
        let mut index = key.hash() as usize & mask;
        let mut tombstone = None;
        loop {
            match &slots[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied { key: existing, .. } => {
                    if Rc::ptr_eq(existing, key) {
                        return index;
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    pub fn get(&self, key: &Rc<Obj>) -> Option<&V> {
        if self.is_empty() {
            return None;
        }
        match &self.slots[Self::find_slot(&self.slots, key)] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Insert or overwrite. Returns true when the key was not present.
    pub fn set(&mut self, key: Rc<Obj>, value: V) -> bool {
        // count + 1 > capacity * 3/4, in integer arithmetic
        if (self.count + 1) * 4 > self.slots.len() * 3 {
            self.grow();
        }
        let index = Self::find_slot(&self.slots, &key);
        let is_new = match &self.slots[index] {
            Slot::Occupied { .. } => false,
            Slot::Empty => {
                self.count += 1;
                true
            }
            // A reused tombstone is already counted
            Slot::Tombstone => {
                self.tombstones -= 1;
                true
            }
        };
        self.slots[index] = Slot::Occupied { key, value };
        is_new
    }

    /// Assign only if the key is already present. Returns false on a miss;
    /// backs the strict assignment check for `SET_GLOBAL`.
    pub fn set_existing(&mut self, key: &Rc<Obj>, value: V) -> bool {
        if self.is_empty() {
            return false;
        }
        let index = Self::find_slot(&self.slots, key);
        match &mut self.slots[index] {
            Slot::Occupied { value: slot, .. } => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Remove a key by writing a tombstone. Probe chains through the slot
    /// stay intact.
    pub fn delete(&mut self, key: &Rc<Obj>) -> bool {
        if self.is_empty() {
            return false;
        }
        let index = Self::find_slot(&self.slots, key);
        match self.slots[index] {
            Slot::Occupied { .. } => {
                self.slots[index] = Slot::Tombstone;
                self.tombstones += 1;
                true
            }
            _ => false,
        }
    }

    /// Copy every live entry of `other` into `self`; existing keys are
    /// overwritten.
    pub fn add_all(&mut self, other: &Table<V>)
    where
        V: Clone,
    {
        for slot in &other.slots {
            if let Slot::Occupied { key, value } = slot {
                self.set(key.clone(), value.clone());
            }
        }
    }

    /// Content-based probe for the intern set: finds the key whose string
    /// payload equals `text`, comparing bytes only on hash collision.
    pub fn find_string(&self, text: &str, hash: u32) -> Option<Rc<Obj>> {
        if self.is_empty() {
            return None;
        }
        let mask = self.slots.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied { key, .. } => {
                    let Obj::String(s) = key.as_ref();
                    if s.hash() == hash && s.as_str() == text {
                        return Some(key.clone());
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    fn grow(&mut self) {
        let new_capacity = (self.slots.len() * 2).max(MIN_CAPACITY);
        let old = std::mem::replace(
            &mut self.slots,
            (0..new_capacity).map(|_| Slot::Empty).collect(),
        );
        self.count = 0;
        self.tombstones = 0;
        for slot in old {
            if let Slot::Occupied { key, value } = slot {
                let index = Self::find_slot(&self.slots, &key);
                self.slots[index] = Slot::Occupied { key, value };
                self.count += 1;
            }
        }
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Table::new()
    }
}
