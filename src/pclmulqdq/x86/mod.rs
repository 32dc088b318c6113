// Copyright 2020 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! x86_64 implementation of the PCLMULQDQ-based CRC calculation.

use std::arch::x86_64::*;
use std::ops::BitXor;

mod vpclmulqdq;

pub(super) use self::vpclmulqdq::{
    update_vpclmul_avx2, update_vpclmul_avx512_ymm, update_vpclmul_avx512_zmm,
};

#[repr(transparent)]
#[derive(Copy, Clone, Debug)]
pub struct Simd(__m128i);

impl super::SimdExt for Simd {
    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn new(high: u64, low: u64) -> Self {
        Self(_mm_set_epi64x(high as i64, low as i64))
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn load(bytes: &[u8; 16]) -> Self {
        Self(_mm_loadu_si128(bytes.as_ptr().cast()))
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn store(self) -> [u8; 16] {
        let mut bytes = [0; 16];
        _mm_storeu_si128(bytes.as_mut_ptr().cast(), self.0);
        bytes
    }

    #[inline]
    #[target_feature(enable = "sse2", enable = "pclmulqdq")]
    unsafe fn fold_16(self, coeff: Self) -> Self {
        let h = Self(_mm_clmulepi64_si128::<0x11>(self.0, coeff.0));
        let l = Self(_mm_clmulepi64_si128::<0x00>(self.0, coeff.0));
        h ^ l
    }
}

impl BitXor for Simd {
    type Output = Self;

    fn bitxor(self, other: Self) -> Self {
        Self(unsafe { _mm_xor_si128(self.0, other.0) })
    }
}
