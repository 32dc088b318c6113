// Copyright 2020 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! A platform-agnostic rendition of the folding kernels.
//!
//! Enabled by the `fake-simd` feature so the folding logic can be tested on
//! any host. Every tier maps to the baseline kernel built on this type. It is
//! orders of magnitude slower than real carry-less multiplication and should
//! never be used in production code.

use std::ops::BitXor;

#[repr(align(16))]
#[derive(Copy, Clone, Debug)]
pub struct Simd(u128);

impl super::SimdExt for Simd {
    unsafe fn new(high: u64, low: u64) -> Self {
        Simd(u128::from(low) | u128::from(high) << 64)
    }

    unsafe fn load(bytes: &[u8; 16]) -> Self {
        Simd(u128::from_le_bytes(*bytes))
    }

    unsafe fn store(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    unsafe fn fold_16(self, coeff: Self) -> Self {
        let h = poly_mul((coeff.0 >> 64) as u64, (self.0 >> 64) as u64);
        let l = poly_mul(coeff.0 as u64, self.0 as u64);
        Self(h ^ l)
    }
}

impl BitXor for Simd {
    type Output = Self;

    fn bitxor(self, other: Self) -> Self {
        Self(self.0 ^ other.0)
    }
}

fn poly_mul(a: u64, b: u64) -> u128 {
    let mut res = 0;
    for i in 0..64 {
        if a & (1 << i) != 0 {
            res ^= u128::from(b) << i;
        }
    }
    res
}

#[test]
fn test_poly_mul() {
    assert_eq!(
        poly_mul(0x5a2d_8244_0f1e_3e50, 0xcae9_00d5_fed9_262f),
        0x39ca_c5ca_fc66_6bf3_25bc_9dd4_c0f3_6330,
    );
    assert_eq!(poly_mul(0, 0xffff_ffff_ffff_ffff), 0);
    assert_eq!(poly_mul(1 << 63, 1 << 63), 1 << 126);
}
