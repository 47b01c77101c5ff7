// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use crate::{error::*, util::*};

/// Packed coils
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coils<'c> {
    pub(crate) data: RawData<'c>,
    pub(crate) quantity: usize,
}

impl<'c> Coils<'c> {
    /// Pack coils defined by an bool slice into a byte buffer.
    pub fn from_bools(bools: &[bool], target: &'c mut [u8]) -> Result<Self, Error> {
        let packed_len = pack_coils(bools, target)?;
        Ok(Coils {
            data: &target[..packed_len],
            quantity: bools.len(),
        })
    }

    /// Wrap already packed coils.
    ///
    /// Fails if `data` holds fewer bytes than `quantity` coils need.
    pub fn from_packed(data: &'c [u8], quantity: usize) -> Result<Self, Error> {
        if data.len() < packed_coils_len(quantity) {
            return Err(Error::BufferSize);
        }
        Ok(Coils { data, quantity })
    }

    /// Quantity of coils
    #[must_use]
    pub const fn len(&self) -> usize {
        self.quantity
    }

    ///  Returns `true` if the container has no items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Number of bytes the packed coils occupy on the wire.
    #[must_use]
    pub const fn packed_len(&self) -> usize {
        packed_coils_len(self.quantity)
    }

    /// The packed bytes without any trailing buffer space.
    #[must_use]
    pub fn packed(&self) -> &[u8] {
        &self.data[..self.packed_len()]
    }

    /// Get a specific coil.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Coil> {
        if idx + 1 > self.quantity {
            return None;
        }
        Some((self.data[idx / 8] >> (idx % 8)) & 0b1 > 0)
    }

    /// Collect all coils.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Coil> {
        self.into_iter().collect()
    }
}

/// Coils iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilsIter<'c> {
    cnt: usize,
    coils: Coils<'c>,
}

impl Iterator for CoilsIter<'_> {
    type Item = Coil;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.coils.get(self.cnt);
        self.cnt += 1;
        result
    }
}

impl<'c> IntoIterator for Coils<'c> {
    type Item = Coil;
    type IntoIter = CoilsIter<'c>;

    fn into_iter(self) -> Self::IntoIter {
        CoilsIter {
            cnt: 0,
            coils: self,
        }
    }
}
