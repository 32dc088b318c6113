// Copyright 2026 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! Processor capability detection and tier selection.
//!
//! CPUID only reports what the processor implements. Wider register files are
//! usable only if the operating system saves and restores them on context
//! switch, which is advertised through XCR0. Both must agree before a wide tier
//! is considered.

use crate::dispatch::Tier;

/// Raw capability snapshot relevant to carry-less multiplication CRC.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CpuFeatures {
    pub pclmulqdq: bool,
    pub sse41: bool,
    pub avx2: bool,
    pub vpclmulqdq: bool,
    pub avx512f: bool,
    pub avx512bw: bool,
    pub avx512vl: bool,
    /// XMM and YMM state enabled in XCR0.
    pub os_ymm: bool,
    /// Opmask, ZMM_Hi256 and Hi16_ZMM state enabled in XCR0 (implies `os_ymm`).
    pub os_zmm: bool,
    /// 512-bit vectors reduce clock speed enough on this model that 256-bit
    /// vectors are faster in practice.
    pub prefer_ymm: bool,
}

impl CpuFeatures {
    /// Whether the baseline PCLMULQDQ kernel can run.
    pub fn has_pclmulqdq(&self) -> bool {
        self.pclmulqdq && self.sse41
    }

    /// Whether the kernel of `tier` can run, independent of preference.
    pub fn supports(&self, tier: Tier) -> bool {
        let ymm = self.vpclmulqdq && self.avx2 && self.os_ymm;
        let zmm = ymm && self.avx512f && self.avx512bw && self.avx512vl && self.os_zmm;
        if !self.has_pclmulqdq() {
            return false;
        }
        match tier {
            Tier::Pclmul => true,
            Tier::VpclmulAvx2 => ymm,
            Tier::VpclmulAvx512Ymm | Tier::VpclmulAvx512Zmm => zmm,
        }
    }

    #[cfg(all(target_arch = "x86_64", not(feature = "fake-simd")))]
    pub fn detect() -> Self {
        use std::arch::x86_64::{__cpuid, __cpuid_count, _xgetbv};

        const XCR0_YMM_MASK: u64 = 0x6;
        const XCR0_ZMM_MASK: u64 = 0xe0;

        // SAFETY: CPUID is available on every x86_64 processor.
        let leaf0 = unsafe { __cpuid(0) };
        let leaf1 = unsafe { __cpuid(1) };
        let leaf7 = if leaf0.eax >= 7 {
            unsafe { __cpuid_count(7, 0) }
        } else {
            unsafe { std::mem::zeroed() }
        };

        let osxsave = leaf1.ecx & (1 << 27) != 0;
        let xcr0 = if osxsave {
            // SAFETY: XGETBV is enabled whenever OSXSAVE is set.
            unsafe { _xgetbv(0) }
        } else {
            0
        };
        let os_ymm = xcr0 & XCR0_YMM_MASK == XCR0_YMM_MASK;
        let os_zmm = os_ymm && xcr0 & XCR0_ZMM_MASK == XCR0_ZMM_MASK;

        // "GenuineIntel"
        let intel =
            leaf0.ebx == 0x756e_6547 && leaf0.edx == 0x4965_6e69 && leaf0.ecx == 0x6c65_746e;

        Self {
            pclmulqdq: leaf1.ecx & (1 << 1) != 0,
            sse41: leaf1.ecx & (1 << 19) != 0,
            avx2: leaf7.ebx & (1 << 5) != 0,
            vpclmulqdq: leaf7.ecx & (1 << 10) != 0,
            avx512f: leaf7.ebx & (1 << 16) != 0,
            avx512bw: leaf7.ebx & (1 << 30) != 0,
            avx512vl: leaf7.ebx & (1 << 31) != 0,
            os_ymm,
            os_zmm,
            prefer_ymm: intel && throttles_zmm(leaf1.eax),
        }
    }

    /// Every fold is done in software, so pretend the baseline is present.
    #[cfg(feature = "fake-simd")]
    pub fn detect() -> Self {
        Self {
            pclmulqdq: true,
            sse41: true,
            ..Self::default()
        }
    }

    #[cfg(not(any(target_arch = "x86_64", feature = "fake-simd")))]
    pub fn detect() -> Self {
        Self::default()
    }
}

/// Intel family 6 models where 512-bit vector use lowers the core frequency
/// enough to lose against 256-bit vectors: Skylake-X, Ice Lake (client,
/// server, microserver, NNP-I) and Tiger Lake.
#[cfg(all(target_arch = "x86_64", not(feature = "fake-simd")))]
fn throttles_zmm(signature: u32) -> bool {
    let family = (signature >> 8) & 0xf;
    if family != 6 {
        return false;
    }
    let model = ((signature >> 4) & 0xf) | ((signature >> 12) & 0xf0);
    matches!(model, 0x55 | 0x6a | 0x6c | 0x7d | 0x7e | 0x9d | 0x8c | 0x8d)
}

/// Picks the widest tier whose full prerequisite chain holds.
///
/// Contradictory reports (for example VPCLMULQDQ without AVX2, or AVX-512
/// features without the matching XCR0 bits) simply fail the corresponding
/// chain and leave a narrower tier selected.
pub fn select_tier(features: &CpuFeatures) -> Tier {
    if !features.has_pclmulqdq() {
        return Tier::Pclmul;
    }
    if !(features.vpclmulqdq && features.avx2 && features.os_ymm) {
        return Tier::Pclmul;
    }
    if features.avx512f && features.avx512bw && features.avx512vl && features.os_zmm {
        if features.prefer_ymm {
            Tier::VpclmulAvx512Ymm
        } else {
            Tier::VpclmulAvx512Zmm
        }
    } else {
        Tier::VpclmulAvx2
    }
}
