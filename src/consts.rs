// Copyright 2026 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! Folding constants and lookup tables, built at compile time from the
//! generator polynomial.
//!
//! Every supported CRC is handled as a bit-reflected CRC over a 64-bit
//! register. A `w`-bit generator `x^w + p(x)` is widened to
//! `x^64 + p(x)·x^(64-w)`; the remainder modulo the widened generator is the
//! `w`-bit remainder shifted up, which in reflected form leaves the CRC in the
//! low `w` bits of the register. One set of kernels therefore serves every
//! width.

/// Precomputed constants for one CRC polynomial.
///
/// Coefficient pairs are stored as `[high, low]`, the multipliers of the high
/// and low 64-bit halves of a 128-bit lane when folding it forward by the
/// given distance. All coefficients are `bit_reverse(x^n mod G)`.
#[derive(Clone, Debug)]
#[cfg_attr(
    not(any(target_arch = "x86_64", feature = "fake-simd")),
    allow(dead_code)
)]
pub struct Constants {
    /// Only the 512-bit kernel folds 256-byte blocks.
    #[cfg_attr(feature = "fake-simd", allow(dead_code))]
    pub(crate) fold_256: [u64; 2],
    pub(crate) fold_128: [u64; 2],
    /// Fold by distance of 112, 96, 80, 64, 48, 32 and 16 bytes.
    pub(crate) fold_lanes: [[u64; 2]; 7],
    /// Slice-by-8 tables. `tables[0]` is the plain byte-wise table.
    pub(crate) tables: [[u64; 256]; 8],
}

impl Constants {
    /// Builds the constants for a `width`-bit polynomial given in normal
    /// (MSB-first) form without its leading term.
    pub const fn new(poly: u64, width: u32) -> Self {
        assert!(width >= 8 && width <= 64);
        let generator = poly << (64 - width);

        let mut fold_lanes = [[0; 2]; 7];
        let mut i = 0;
        while i < 7 {
            fold_lanes[i] = fold_pair(generator, 112 - 16 * i as u32);
            i += 1;
        }

        Self {
            fold_256: fold_pair(generator, 256),
            fold_128: fold_pair(generator, 128),
            fold_lanes,
            tables: build_tables(generator.reverse_bits()),
        }
    }

    #[cfg(any(target_arch = "x86_64", feature = "fake-simd"))]
    #[inline]
    pub(crate) fn fold_16(&self) -> [u64; 2] {
        self.fold_lanes[6]
    }
}

/// Coefficients for folding a 128-bit lane forward by `distance` bytes.
const fn fold_pair(generator: u64, distance: u32) -> [u64; 2] {
    [
        x_pow_mod(generator, distance * 8 - 1),
        x_pow_mod(generator, distance * 8 + 63),
    ]
}

/// Computes `bit_reverse(x^n mod (x^64 + generator))`.
const fn x_pow_mod(generator: u64, n: u32) -> u64 {
    let mut value: u64 = 1;
    let mut i = 0;
    while i < n {
        value = value << 1 ^ if value >> 63 != 0 { generator } else { 0 };
        i += 1;
    }
    value.reverse_bits()
}

const fn build_tables(reflected: u64) -> [[u64; 256]; 8] {
    let mut tables = [[0; 256]; 8];
    let mut i = 0;
    while i < 256 {
        let mut value = i as u64;
        let mut bit = 0;
        while bit < 8 {
            value = value >> 1 ^ if value & 1 != 0 { reflected } else { 0 };
            bit += 1;
        }
        tables[0][i] = value;
        i += 1;
    }

    let mut k = 1;
    while k < 8 {
        let mut i = 0;
        while i < 256 {
            let prev = tables[k - 1][i];
            tables[k][i] = prev >> 8 ^ tables[0][prev as u8 as usize];
            i += 1;
        }
        k += 1;
    }
    tables
}
