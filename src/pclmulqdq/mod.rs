// Copyright 2019 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! PCLMULQDQ-based CRC computers.
//!
//! The implementation is based on Intel's "Fast CRC Computation for Generic
//! Polynomials Using PCLMULQDQ Instruction" [white paper].
//!
//! Every kernel folds the input into 128-bit lanes, collapses the lanes into
//! one, folds any remaining whole 16-byte blocks, and finishes the last lane
//! and the sub-16-byte tail with the lookup table. Wider tiers differ only in
//! how many bytes they fold per step.
//!
//! [white paper]: https://www.intel.com/content/dam/www/public/us/en/documents/white-papers/fast-crc-computation-generic-polynomials-pclmulqdq-paper.pdf

#[cfg(not(feature = "fake-simd"))]
mod x86;
#[cfg(not(feature = "fake-simd"))]
use self::x86 as arch;

#[cfg(feature = "fake-simd")]
mod soft;
#[cfg(feature = "fake-simd")]
use self::soft as arch;

use self::arch::Simd;
use crate::consts::Constants;
use crate::dispatch::Tier;
use crate::table;
use std::{
    fmt::Debug,
    ops::{BitXor, BitXorAssign},
};

/// Signature shared by every tier: register in, bytes, constants, register
/// out. Callers must ensure the tier is supported.
pub(crate) type Kernel = unsafe fn(u64, &[u8], &Constants) -> u64;

/// This trait must be implemented on `self::arch::Simd` to provide the
/// platform-specific SIMD implementations.
trait SimdExt: Copy + Debug + BitXor<Output = Self> {
    /// Creates a new 128-bit integer from the 64-bit parts.
    unsafe fn new(high: u64, low: u64) -> Self;

    /// Loads 16 bytes in little-endian lane order.
    unsafe fn load(bytes: &[u8; 16]) -> Self;

    unsafe fn store(self) -> [u8; 16];

    /// Performs a CRC folding step across 16 bytes.
    ///
    /// Should return `(coeff.low_64 ⊗ self.low_64) ⊕ (coeff.high_64 ⊗ self.high_64)`,
    /// where ⊕ is XOR and ⊗ is carryless multiplication.
    unsafe fn fold_16(self, coeff: Self) -> Self;
}

impl PartialEq for Simd {
    fn eq(&self, other: &Self) -> bool {
        unsafe { self.store() == other.store() }
    }
}

impl Eq for Simd {}

impl BitXorAssign for Simd {
    fn bitxor_assign(&mut self, other: Self) {
        *self = *self ^ other;
    }
}

#[cfg(not(feature = "fake-simd"))]
pub(crate) fn kernel(tier: Tier) -> Kernel {
    match tier {
        Tier::Pclmul => update_simd,
        Tier::VpclmulAvx2 => arch::update_vpclmul_avx2,
        Tier::VpclmulAvx512Ymm => arch::update_vpclmul_avx512_ymm,
        Tier::VpclmulAvx512Zmm => arch::update_vpclmul_avx512_zmm,
    }
}

/// Software folding has no wider registers; every tier shares one kernel.
#[cfg(feature = "fake-simd")]
pub(crate) fn kernel(_tier: Tier) -> Kernel {
    update_simd
}

/// The baseline kernel: eight 128-bit accumulators over 128-byte blocks.
#[cfg_attr(
    not(feature = "fake-simd"),
    target_feature(enable = "pclmulqdq", enable = "sse2", enable = "sse4.1")
)]
pub(crate) unsafe fn update_simd(state: u64, bytes: &[u8], consts: &Constants) -> u64 {
    debug_assert!(bytes.len() >= 16);
    if let Some((first, rest)) = bytes.split_first_chunk::<128>() {
        let mut x = load_x8(first);
        // xor the initial CRC value
        x[0] ^= Simd::new(0, state);
        fold_x8(x, rest, consts)
    } else if let Some((first, rest)) = bytes.split_first_chunk::<16>() {
        fold_x1(Simd::load(first) ^ Simd::new(0, state), rest, consts)
    } else {
        table::update_sliced(state, bytes, &consts.tables)
    }
}

#[inline]
#[cfg_attr(not(feature = "fake-simd"), target_feature(enable = "sse2"))]
unsafe fn load_x8(block: &[u8; 128]) -> [Simd; 8] {
    let (lanes, _) = block.as_chunks::<16>();
    let mut x = [Simd::new(0, 0); 8];
    for (xi, lane) in x.iter_mut().zip(lanes) {
        *xi = Simd::load(lane);
    }
    x
}

/// Continues from eight lanes holding the 128 bytes just before `bytes`.
#[inline]
#[cfg_attr(
    not(feature = "fake-simd"),
    target_feature(enable = "pclmulqdq", enable = "sse2", enable = "sse4.1")
)]
unsafe fn fold_x8(mut x: [Simd; 8], bytes: &[u8], consts: &Constants) -> u64 {
    let [high, low] = consts.fold_128;
    let coeff = Simd::new(high, low);

    // perform 128-byte folding.
    let (blocks, rest) = bytes.as_chunks::<128>();
    for block in blocks {
        let y = load_x8(block);
        for (xi, yi) in x.iter_mut().zip(y) {
            *xi = yi ^ xi.fold_16(coeff);
        }
    }

    // fold by distances of 112, 96, ..., 16 bytes onto the last lane.
    let x = x
        .iter()
        .zip(&consts.fold_lanes)
        .fold(x[7], |acc, (m, &[high, low])| acc ^ m.fold_16(Simd::new(high, low)));
    fold_x1(x, rest, consts)
}

/// Continues from one lane holding the 16 bytes just before `bytes`.
#[inline]
#[cfg_attr(
    not(feature = "fake-simd"),
    target_feature(enable = "pclmulqdq", enable = "sse2", enable = "sse4.1")
)]
unsafe fn fold_x1(mut x: Simd, bytes: &[u8], consts: &Constants) -> u64 {
    let [high, low] = consts.fold_16();
    let coeff = Simd::new(high, low);
    let (blocks, tail) = bytes.as_chunks::<16>();
    for block in blocks {
        x = Simd::load(block) ^ x.fold_16(coeff);
    }

    // The folded lane is congruent to everything before the tail, so its CRC
    // from a zero register continues exactly where the input left off.
    let state = table::update_sliced(0, &x.store(), &consts.tables);
    table::update_sliced(state, tail, &consts.tables)
}
