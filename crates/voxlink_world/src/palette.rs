//! # Paletted Array
//!
//! A deduplicated palette of distinct values plus one bit-packed palette
//! index per cell.
//!
//! ## Bit Width
//!
//! The logical index width is the minimum bit count that can address every
//! palette slot: 0 bits for a palette of 0 or 1 entries, otherwise
//! `ceil(log2(len))`. Indices are stored at the next width that keeps them
//! byte-friendly:
//!
//! | logical bits | stored as          | regime |
//! |--------------|--------------------|--------|
//! | 0            | nothing            | -      |
//! | 1, 2         | 1 or 2 bits        | < 8    |
//! | 3, 4         | 4 bits             | < 8    |
//! | 5..=8        | one byte           | == 8   |
//! | 9..=16       | two LE bytes       | > 8    |
//! | 17..=32      | four LE bytes      | > 8    |
//!
//! Sub-byte widths divide 8, so an index never straddles a byte. Growing the
//! palette past a width boundary re-packs every existing index.

use crate::error::{WorldError, WorldResult};

/// Minimum bits needed to index a palette of `palette_len` entries.
///
/// Indices run `0..palette_len`, so a full byte covers 256 entries:
/// `bits_for(256) == 8` and the 257th entry is the first to need 9.
#[inline]
#[must_use]
pub const fn bits_for(palette_len: usize) -> u32 {
    if palette_len <= 1 {
        0
    } else {
        usize::BITS - (palette_len - 1).leading_zeros()
    }
}

/// Storage width used for a logical bit count.
#[inline]
#[must_use]
pub const fn storage_width(bits: u32) -> u32 {
    match bits {
        0 => 0,
        1 => 1,
        2 => 2,
        3 | 4 => 4,
        5..=8 => 8,
        9..=16 => 16,
        _ => 32,
    }
}

/// Bytes needed for `len` indices at `width` bits each.
#[inline]
#[must_use]
pub const fn packed_len(len: usize, width: u32) -> usize {
    (len * width as usize).div_ceil(8)
}

/// Fixed-length array of values stored through a palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PalettedArray<T> {
    palette: Vec<T>,
    bits: u32,
    data: Vec<u8>,
    len: usize,
}

impl<T: Clone + Eq> PalettedArray<T> {
    /// Creates an array of `len` cells, all holding `default`.
    #[must_use]
    pub fn new(len: usize, default: T) -> Self {
        Self {
            palette: vec![default],
            bits: 0,
            data: Vec::new(),
            len,
        }
    }

    /// Rebuilds an array from its parts, validating every index.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidPalette`] if the parts disagree.
    pub fn from_parts(len: usize, palette: Vec<T>, bits: u32, data: Vec<u8>) -> WorldResult<Self> {
        if palette.is_empty() {
            return Err(WorldError::InvalidPalette("empty palette".into()));
        }
        if bits != bits_for(palette.len()) {
            return Err(WorldError::InvalidPalette(format!(
                "{bits} bits for a palette of {}",
                palette.len()
            )));
        }
        let expected = packed_len(len, storage_width(bits));
        if data.len() != expected {
            return Err(WorldError::InvalidPalette(format!(
                "{} data bytes, expected {expected}",
                data.len()
            )));
        }
        let array = Self {
            palette,
            bits,
            data,
            len,
        };
        if let Some(bad) = (0..len).map(|i| array.get_index(i)).find(|&e| e as usize >= array.palette.len()) {
            return Err(WorldError::InvalidPalette(format!("index {bad} past palette end")));
        }
        Ok(array)
    }

    /// Number of cells.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true for a zero-cell array.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Logical bits per index.
    #[inline]
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// The distinct values, in first-seen order.
    #[inline]
    #[must_use]
    pub fn palette(&self) -> &[T] {
        &self.palette
    }

    /// The packed index bytes.
    #[inline]
    #[must_use]
    pub fn packed(&self) -> &[u8] {
        &self.data
    }

    /// Reads the palette index stored for a cell.
    ///
    /// # Panics
    ///
    /// If `index >= len`.
    #[must_use]
    pub fn get_index(&self, index: usize) -> u32 {
        assert!(index < self.len, "cell {index} out of range");
        let width = storage_width(self.bits);
        match width {
            0 => 0,
            w if w < 8 => {
                let per_byte = (8 / w) as usize;
                let shift = (index % per_byte) as u32 * w;
                u32::from(self.data[index / per_byte] >> shift) & ((1 << w) - 1)
            }
            8 => u32::from(self.data[index]),
            w => {
                let bytes = (w / 8) as usize;
                let start = index * bytes;
                self.data[start..start + bytes]
                    .iter()
                    .rev()
                    .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
            }
        }
    }

    fn set_index(&mut self, index: usize, entry: u32) {
        assert!(index < self.len, "cell {index} out of range");
        let width = storage_width(self.bits);
        match width {
            0 => {}
            w if w < 8 => {
                let per_byte = (8 / w) as usize;
                let shift = (index % per_byte) as u32 * w;
                let mask = (((1u32 << w) - 1) << shift) as u8;
                let byte = &mut self.data[index / per_byte];
                *byte = (*byte & !mask) | (((entry << shift) as u8) & mask);
            }
            8 => self.data[index] = entry as u8,
            w => {
                let bytes = (w / 8) as usize;
                let start = index * bytes;
                for (i, slot) in self.data[start..start + bytes].iter_mut().enumerate() {
                    *slot = (entry >> (8 * i)) as u8;
                }
            }
        }
    }

    /// Returns the value held by a cell.
    #[must_use]
    pub fn get_value(&self, index: usize) -> &T {
        &self.palette[self.get_index(index) as usize]
    }

    /// Returns the palette slot for `value`, adding it if needed.
    ///
    /// Adding a value that crosses a width boundary re-packs every cell.
    pub fn get_or_create_entry(&mut self, value: T) -> u32 {
        if let Some(found) = self.palette.iter().position(|v| *v == value) {
            return found as u32;
        }
        self.palette.push(value);
        let needed = bits_for(self.palette.len());
        if needed != self.bits {
            self.upgrade(needed);
        }
        (self.palette.len() - 1) as u32
    }

    /// Stores `value` in a cell.
    pub fn set_value(&mut self, index: usize, value: T) {
        let entry = self.get_or_create_entry(value);
        self.set_index(index, entry);
    }

    /// Re-packs every index at a wider width.
    fn upgrade(&mut self, bits: u32) {
        let old_width = storage_width(self.bits);
        let new_width = storage_width(bits);
        if old_width == new_width {
            self.bits = bits;
            return;
        }
        let indices: Vec<u32> = (0..self.len).map(|i| self.get_index(i)).collect();
        self.bits = bits;
        self.data = vec![0u8; packed_len(self.len, new_width)];
        for (i, entry) in indices.into_iter().enumerate() {
            self.set_index(i, entry);
        }
        tracing::trace!(bits, width = new_width, "palette upgraded");
    }

    /// Returns the single value if every cell holds the same one.
    #[must_use]
    pub fn uniform_value(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let first = self.get_index(0);
        (1..self.len)
            .all(|i| self.get_index(i) == first)
            .then(|| &self.palette[first as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_lengths() {
        assert_eq!(bits_for(0), 0);
        assert_eq!(bits_for(1), 0);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(4), 2);
        assert_eq!(bits_for(5), 3);
        assert_eq!(bits_for(256), 8);
        assert_eq!(bits_for(257), 9);
    }

    #[test]
    fn test_single_entry_uses_no_storage() {
        let array = PalettedArray::new(4096, 7u32);
        assert_eq!(array.bits(), 0);
        assert!(array.packed().is_empty());
        assert_eq!(*array.get_value(4095), 7);
    }

    #[test]
    fn test_existing_entry_is_idempotent() {
        let mut array = PalettedArray::new(64, 0u32);
        array.set_value(3, 5);
        let bits = array.bits();
        let entry = array.get_or_create_entry(5);
        assert_eq!(array.get_or_create_entry(5), entry);
        assert_eq!(array.get_or_create_entry(0), 0);
        assert_eq!(array.bits(), bits);
        assert_eq!(array.palette().len(), 2);
        assert_eq!(*array.get_value(3), 5);
    }

    fn check_upgrade_to(distinct: u32, expected_bits: u32) {
        let len = 1024;
        let mut array = PalettedArray::new(len, 0u32);
        for value in 1..distinct {
            array.set_value(value as usize % len, value);
        }
        assert_eq!(array.palette().len(), distinct as usize);
        assert_eq!(array.bits(), expected_bits);

        // Every cell survives the upgrades and can be rewritten.
        for i in 0..len {
            let expected = if (i as u32) < distinct { i as u32 } else { 0 };
            assert_eq!(*array.get_value(i), expected, "cell {i}");
        }
        for i in 0..len {
            array.set_value(i, (i as u32 * 31) % distinct);
        }
        for i in 0..len {
            assert_eq!(*array.get_value(i), (i as u32 * 31) % distinct);
        }
        assert_eq!(array.bits(), expected_bits);
    }

    #[test]
    fn test_upgrade_sizes() {
        check_upgrade_to(1, 0);
        check_upgrade_to(2, 1);
        check_upgrade_to(3, 2);
        check_upgrade_to(5, 3);
        check_upgrade_to(17, 5);
        check_upgrade_to(256, 8);
        check_upgrade_to(257, 9);
        check_upgrade_to(700, 10);
    }

    #[test]
    fn test_wide_indices() {
        let mut array = PalettedArray::new(70_000, 0u32);
        for value in 0..70_000u32 {
            array.set_value(value as usize, value);
        }
        assert_eq!(array.bits(), 17);
        assert_eq!(array.packed().len(), 70_000 * 4);
        assert_eq!(*array.get_value(69_999), 69_999);
    }

    #[test]
    fn test_from_parts_validation() {
        let mut array = PalettedArray::new(16, 1u32);
        array.set_value(0, 2);
        array.set_value(1, 3);
        let rebuilt = PalettedArray::from_parts(
            16,
            array.palette().to_vec(),
            array.bits(),
            array.packed().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt, array);

        assert!(PalettedArray::from_parts(16, vec![1u32, 2], 2, vec![0; 4]).is_err());
        assert!(PalettedArray::from_parts(16, vec![1u32, 2, 3], 2, vec![0; 3]).is_err());
        // Index 3 with only three palette entries.
        assert!(PalettedArray::from_parts(16, vec![1u32, 2, 3], 2, vec![0xFF; 4]).is_err());
        assert!(PalettedArray::<u32>::from_parts(16, vec![], 0, vec![]).is_err());
    }

    #[test]
    fn test_uniform_value() {
        let mut array = PalettedArray::new(8, 4u32);
        assert_eq!(array.uniform_value(), Some(&4));
        array.set_value(2, 9);
        assert_eq!(array.uniform_value(), None);
        array.set_value(2, 4);
        assert_eq!(array.uniform_value(), Some(&4));
    }
}
