// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory register store of a slave.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::frame::{Address, Coil, Exception, Word};

/// Capacity of each address space if nothing else is configured.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Number of addresses that receive the seed pattern.
const SEED_LEN: usize = 20;

#[derive(Debug)]
struct Tables {
    coils: Vec<Coil>,
    discrete_inputs: Vec<Coil>,
    input_registers: Vec<Word>,
    holding_registers: Vec<Word>,
}

/// Four independent, fixed-size address spaces.
///
/// The store is a cheap handle; clones share the same tables. Every
/// access locks all four spaces so a multi-item write is never observed
/// half-applied.
#[derive(Debug, Clone)]
pub struct RegisterStore {
    tables: Arc<Mutex<Tables>>,
    capacity: usize,
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::seeded(DEFAULT_CAPACITY)
    }
}

impl RegisterStore {
    /// Zero-initialised store with `capacity` items per space.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let tables = Tables {
            coils: vec![false; capacity],
            discrete_inputs: vec![false; capacity],
            input_registers: vec![0; capacity],
            holding_registers: vec![0; capacity],
        };
        Self {
            tables: Arc::new(Mutex::new(tables)),
            capacity,
        }
    }

    /// Store pre-populated with the interoperability test pattern:
    ///
    /// - coil `i` is on for even `i`
    /// - discrete input `i` is on for every third `i`
    /// - input register `i` is `100 + 10 * i`
    /// - holding register `i` is `1000 + 100 * i`
    ///
    /// for the first 20 addresses.
    #[must_use]
    pub fn seeded(capacity: usize) -> Self {
        let store = Self::new(capacity);
        {
            let mut tables = store.lock();
            for i in 0..SEED_LEN.min(capacity) {
                // SEED_LEN keeps the arithmetic below u16::MAX
                let n = i as u16;
                tables.coils[i] = i % 2 == 0;
                tables.discrete_inputs[i] = i % 3 == 0;
                tables.input_registers[i] = 100 + 10 * n;
                tables.holding_registers[i] = 1000 + 100 * n;
            }
        }
        store
    }

    /// Number of items in each address space.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn read_coils(&self, address: Address, quantity: u16) -> Result<Vec<Coil>, Exception> {
        let tables = self.lock();
        read(&tables.coils, address, quantity)
    }

    pub fn read_discrete_inputs(
        &self,
        address: Address,
        quantity: u16,
    ) -> Result<Vec<Coil>, Exception> {
        let tables = self.lock();
        read(&tables.discrete_inputs, address, quantity)
    }

    pub fn read_input_registers(
        &self,
        address: Address,
        quantity: u16,
    ) -> Result<Vec<Word>, Exception> {
        let tables = self.lock();
        read(&tables.input_registers, address, quantity)
    }

    pub fn read_holding_registers(
        &self,
        address: Address,
        quantity: u16,
    ) -> Result<Vec<Word>, Exception> {
        let tables = self.lock();
        read(&tables.holding_registers, address, quantity)
    }

    pub fn write_coil(&self, address: Address, value: Coil) -> Result<(), Exception> {
        let mut tables = self.lock();
        write(&mut tables.coils, address, &[value])
    }

    pub fn write_coils(&self, address: Address, values: &[Coil]) -> Result<(), Exception> {
        let mut tables = self.lock();
        write(&mut tables.coils, address, values)
    }

    pub fn write_register(&self, address: Address, value: Word) -> Result<(), Exception> {
        let mut tables = self.lock();
        write(&mut tables.holding_registers, address, &[value])
    }

    pub fn write_registers(&self, address: Address, values: &[Word]) -> Result<(), Exception> {
        let mut tables = self.lock();
        write(&mut tables.holding_registers, address, values)
    }

    /// Preset discrete inputs.
    ///
    /// Masters cannot write this space; this is for the embedding application.
    pub fn set_discrete_inputs(&self, address: Address, values: &[Coil]) -> Result<(), Exception> {
        let mut tables = self.lock();
        write(&mut tables.discrete_inputs, address, values)
    }

    /// Preset input registers.
    ///
    /// Masters cannot write this space; this is for the embedding application.
    pub fn set_input_registers(&self, address: Address, values: &[Word]) -> Result<(), Exception> {
        let mut tables = self.lock();
        write(&mut tables.input_registers, address, values)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Every write is validated before it mutates, so the tables are
        // consistent even if a holder panicked.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn range(len: usize, address: Address, quantity: usize) -> Result<std::ops::Range<usize>, Exception> {
    let start = usize::from(address);
    let end = start + quantity;
    if start >= len || end > len {
        return Err(Exception::IllegalDataAddress);
    }
    Ok(start..end)
}

fn read<T: Copy>(space: &[T], address: Address, quantity: u16) -> Result<Vec<T>, Exception> {
    let range = range(space.len(), address, usize::from(quantity))?;
    Ok(space[range].to_vec())
}

fn write<T: Copy>(space: &mut [T], address: Address, values: &[T]) -> Result<(), Exception> {
    let range = range(space.len(), address, values.len())?;
    space[range].copy_from_slice(values);
    Ok(())
}
