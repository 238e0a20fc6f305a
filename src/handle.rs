// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation-tagged handle table
//!
//! Hosts only ever see an opaque non-zero `u64`. The low 32 bits hold the slot
//! index plus one, the high 32 bits the slot generation. Removing an entry bumps
//! its slot's generation, so a released handle can never resolve again, even
//! after the slot is reused.

use std::num::NonZeroU64;

/// Opaque identifier of one live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineHandle(NonZeroU64);

impl EngineHandle {
    /// `None` for the reserved null value 0
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn into_raw(self) -> u64 {
        self.0.get()
    }

    fn new(index: usize, generation: u32) -> Self {
        let low = index as u64 + 1;
        let raw = (u64::from(generation) << 32) | low;
        // low >= 1, so raw is never zero
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    fn index(self) -> Option<usize> {
        let low = self.0.get() & u64::from(u32::MAX);
        (low as usize).checked_sub(1)
    }

    fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }
}

impl std::fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Owning map from handles to values
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> EngineHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.value = Some(value);
            return EngineHandle::new(index, slot.generation);
        }
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        EngineHandle::new(self.slots.len() - 1, 0)
    }

    pub fn get(&self, handle: EngineHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Take the value out; the handle is dead afterwards
    pub fn remove(&mut self, handle: EngineHandle) -> Option<T> {
        let index = handle.index()?;
        let slot = self.slots.get_mut(index)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
