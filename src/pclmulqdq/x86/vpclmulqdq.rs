// Copyright 2020 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! VPCLMULQDQ kernels.
//!
//! Each 256-bit or 512-bit register holds two or four independent 128-bit
//! lanes, all folded with the same per-lane coefficients. Once the bulk of
//! the input is consumed the registers are split back into 128-bit lanes and
//! handed to the baseline tail.

use std::arch::x86_64::*;

use super::Simd;
use crate::consts::Constants;
use crate::pclmulqdq::{fold_x8, update_simd};

#[derive(Copy, Clone, Debug)]
struct Simd256(__m256i);

impl Simd256 {
    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn load(bytes: &[u8; 32]) -> Self {
        Self(_mm256_loadu_si256(bytes.as_ptr().cast()))
    }

    /// Broadcasts a `[high, low]` coefficient pair to both lanes.
    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn splat(coeff: [u64; 2]) -> Self {
        let [high, low] = coeff.map(|c| c as i64);
        Self(_mm256_set_epi64x(high, low, high, low))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn from_low(value: u64) -> Self {
        Self(_mm256_set_epi64x(0, 0, 0, value as i64))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn xor(self, other: Self) -> Self {
        Self(_mm256_xor_si256(self.0, other.0))
    }

    /// Folds both lanes forward and adds `next`.
    #[inline]
    #[target_feature(enable = "avx2", enable = "vpclmulqdq")]
    unsafe fn fold_32(self, coeff: Self, next: Self) -> Self {
        let h = _mm256_clmulepi64_epi128::<0x11>(self.0, coeff.0);
        let l = _mm256_clmulepi64_epi128::<0x00>(self.0, coeff.0);
        Self(_mm256_xor_si256(_mm256_xor_si256(h, l), next.0))
    }

    /// Same as [`fold_32`](Self::fold_32) with the three-way XOR in one
    /// `vpternlogq`.
    #[inline]
    #[target_feature(enable = "avx512f", enable = "avx512vl", enable = "vpclmulqdq")]
    unsafe fn fold_32_ternlog(self, coeff: Self, next: Self) -> Self {
        let h = _mm256_clmulepi64_epi128::<0x11>(self.0, coeff.0);
        let l = _mm256_clmulepi64_epi128::<0x00>(self.0, coeff.0);
        Self(_mm256_ternarylogic_epi64::<0x96>(h, l, next.0))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn split(self) -> [Simd; 2] {
        [
            Simd(_mm256_castsi256_si128(self.0)),
            Simd(_mm256_extracti128_si256::<1>(self.0)),
        ]
    }
}

#[derive(Copy, Clone, Debug)]
struct Simd512(__m512i);

impl Simd512 {
    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn load(bytes: &[u8; 64]) -> Self {
        Self(_mm512_loadu_si512(bytes.as_ptr().cast()))
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn splat(coeff: [u64; 2]) -> Self {
        let [high, low] = coeff.map(|c| c as i64);
        Self(_mm512_set_epi64(high, low, high, low, high, low, high, low))
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn from_low(value: u64) -> Self {
        Self(_mm512_set_epi64(0, 0, 0, 0, 0, 0, 0, value as i64))
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn xor(self, other: Self) -> Self {
        Self(_mm512_xor_si512(self.0, other.0))
    }

    #[inline]
    #[target_feature(enable = "avx512f", enable = "vpclmulqdq")]
    unsafe fn fold_64(self, coeff: Self, next: Self) -> Self {
        let h = _mm512_clmulepi64_epi128::<0x11>(self.0, coeff.0);
        let l = _mm512_clmulepi64_epi128::<0x00>(self.0, coeff.0);
        Self(_mm512_ternarylogic_epi64::<0x96>(h, l, next.0))
    }

    #[inline]
    #[target_feature(enable = "avx512f")]
    unsafe fn split(self) -> [Simd; 4] {
        [
            Simd(_mm512_extracti32x4_epi32::<0>(self.0)),
            Simd(_mm512_extracti32x4_epi32::<1>(self.0)),
            Simd(_mm512_extracti32x4_epi32::<2>(self.0)),
            Simd(_mm512_extracti32x4_epi32::<3>(self.0)),
        ]
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load_256_x4(block: &[u8; 128]) -> [Simd256; 4] {
    let (lanes, _) = block.as_chunks::<32>();
    [
        Simd256::load(&lanes[0]),
        Simd256::load(&lanes[1]),
        Simd256::load(&lanes[2]),
        Simd256::load(&lanes[3]),
    ]
}

#[inline]
#[target_feature(enable = "avx512f")]
unsafe fn load_512_x4(block: &[u8; 256]) -> [Simd512; 4] {
    let (lanes, _) = block.as_chunks::<64>();
    [
        Simd512::load(&lanes[0]),
        Simd512::load(&lanes[1]),
        Simd512::load(&lanes[2]),
        Simd512::load(&lanes[3]),
    ]
}

/// Four 256-bit accumulators over 128-byte blocks.
///
/// Inlined into each 256-bit kernel so the fold is compiled with that
/// kernel's features; `TERNLOG` selects the AVX-512VL encoding.
#[inline(always)]
unsafe fn update_256<const TERNLOG: bool>(state: u64, bytes: &[u8], consts: &Constants) -> u64 {
    let Some((first, rest)) = bytes.split_first_chunk::<128>() else {
        return update_simd(state, bytes, consts);
    };

    let mut x = load_256_x4(first);
    // xor the initial CRC value
    x[0] = x[0].xor(Simd256::from_low(state));

    let coeff = Simd256::splat(consts.fold_128);
    let (blocks, rest) = rest.as_chunks::<128>();
    for block in blocks {
        let y = load_256_x4(block);
        for (xi, yi) in x.iter_mut().zip(y) {
            *xi = if TERNLOG {
                xi.fold_32_ternlog(coeff, yi)
            } else {
                xi.fold_32(coeff, yi)
            };
        }
    }

    let [a, b] = x[0].split();
    let [c, d] = x[1].split();
    let [e, f] = x[2].split();
    let [g, h] = x[3].split();
    fold_x8([a, b, c, d, e, f, g, h], rest, consts)
}

#[target_feature(
    enable = "avx2",
    enable = "vpclmulqdq",
    enable = "pclmulqdq",
    enable = "sse4.1"
)]
pub(crate) unsafe fn update_vpclmul_avx2(state: u64, bytes: &[u8], consts: &Constants) -> u64 {
    update_256::<false>(state, bytes, consts)
}

#[target_feature(
    enable = "avx2",
    enable = "avx512f",
    enable = "avx512bw",
    enable = "avx512vl",
    enable = "vpclmulqdq",
    enable = "pclmulqdq",
    enable = "sse4.1"
)]
pub(crate) unsafe fn update_vpclmul_avx512_ymm(
    state: u64,
    bytes: &[u8],
    consts: &Constants,
) -> u64 {
    update_256::<true>(state, bytes, consts)
}

/// Four 512-bit accumulators over 256-byte blocks.
#[target_feature(
    enable = "avx2",
    enable = "avx512f",
    enable = "avx512bw",
    enable = "avx512vl",
    enable = "vpclmulqdq",
    enable = "pclmulqdq",
    enable = "sse4.1"
)]
pub(crate) unsafe fn update_vpclmul_avx512_zmm(
    state: u64,
    bytes: &[u8],
    consts: &Constants,
) -> u64 {
    let Some((first, rest)) = bytes.split_first_chunk::<256>() else {
        return update_vpclmul_avx512_ymm(state, bytes, consts);
    };

    let mut x = load_512_x4(first);
    // xor the initial CRC value
    x[0] = x[0].xor(Simd512::from_low(state));

    let coeff = Simd512::splat(consts.fold_256);
    let (blocks, rest) = rest.as_chunks::<256>();
    for block in blocks {
        let y = load_512_x4(block);
        for (xi, yi) in x.iter_mut().zip(y) {
            *xi = xi.fold_64(coeff, yi);
        }
    }

    // fold the first 128 bytes onto the second 128 bytes.
    let coeff = Simd512::splat(consts.fold_128);
    let [a, b, c, d] = x[0].fold_64(coeff, x[2]).split();
    let [e, f, g, h] = x[1].fold_64(coeff, x[3]).split();
    fold_x8([a, b, c, d, e, f, g, h], rest, consts)
}
