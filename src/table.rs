// Copyright 2026 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! Portable table-driven CRC computation.
//!
//! These are the fallbacks used whenever the carry-less multiplication
//! kernels cannot or should not run. Both operate on the widened 64-bit
//! reflected register described in [`crate::consts`].

/// Slice-by-1: one table lookup per input byte.
pub fn update_bytewise(mut crc: u64, bytes: &[u8], table: &[u64; 256]) -> u64 {
    for &byte in bytes {
        crc = crc >> 8 ^ table[(crc as u8 ^ byte) as usize];
    }
    crc
}

/// Slice-by-8: eight independent lookups per 8-byte word.
pub fn update_sliced(mut crc: u64, bytes: &[u8], tables: &[[u64; 256]; 8]) -> u64 {
    let (words, tail) = bytes.as_chunks::<8>();
    for word in words {
        let v = crc ^ u64::from_le_bytes(*word);
        crc = tables[7][v as u8 as usize]
            ^ tables[6][(v >> 8) as u8 as usize]
            ^ tables[5][(v >> 16) as u8 as usize]
            ^ tables[4][(v >> 24) as u8 as usize]
            ^ tables[3][(v >> 32) as u8 as usize]
            ^ tables[2][(v >> 40) as u8 as usize]
            ^ tables[1][(v >> 48) as u8 as usize]
            ^ tables[0][(v >> 56) as usize];
    }
    update_bytewise(crc, tail, &tables[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::Constants;
    use proptest::collection::vec;
    use proptest::prelude::*;

    const ECMA: Constants = Constants::new(0x42f0_e1eb_a9ea_3693, 64);
    const CASTAGNOLI: Constants = Constants::new(0x1edc_6f41, 32);

    #[test]
    fn test_bytewise_known_values() {
        assert_eq!(
            !update_bytewise(!0, &[0; 32], &ECMA.tables[0]),
            0xc95a_f861_7cd5_330c
        );
        assert_eq!(
            update_bytewise(0xffff_ffff, b"123456789", &CASTAGNOLI.tables[0]) ^ 0xffff_ffff,
            0xe306_9283
        );
    }

    proptest! {
        #[test]
        fn sliced_equals_bytewise(crc in any::<u32>(), bytes in vec(any::<u8>(), 0..512)) {
            let crc = u64::from(crc);
            prop_assert_eq!(
                update_sliced(crc, &bytes, &CASTAGNOLI.tables),
                update_bytewise(crc, &bytes, &CASTAGNOLI.tables[0])
            );
        }
    }
}
