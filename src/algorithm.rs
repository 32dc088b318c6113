// Copyright 2026 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! CRC algorithm descriptions and the streaming [`Digest`].

use std::fmt::{Debug, LowerHex};
use std::ops::BitXor;

use crate::consts::Constants;
use crate::dispatch::Tier;
use crate::guard::{self, Fallback};
use crate::table;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// Accumulator type of a CRC variant.
///
/// Values are carried in the low bits of a 64-bit register while the
/// kernels and tables run.
pub trait Width:
    sealed::Sealed + Copy + Eq + Debug + LowerHex + BitXor<Output = Self> + Send + Sync + 'static
{
    const BITS: u32;

    fn to_register(self) -> u64;

    /// Truncates a register back to the accumulator width.
    fn from_register(register: u64) -> Self;
}

/// A bit-reflected CRC variant.
#[derive(Debug)]
pub struct Algorithm<W: Width> {
    pub name: &'static str,
    /// Generator polynomial in normal (MSB-first) form, without the leading
    /// term.
    pub poly: W,
    pub init: W,
    pub xorout: W,
    /// Checksum of the ASCII string `123456789`.
    pub check: W,
    consts: Constants,
}

macro_rules! impl_width {
    ($($ty:ty),*) => {$(
        impl Width for $ty {
            const BITS: u32 = <$ty>::BITS;

            #[inline]
            fn to_register(self) -> u64 {
                u64::from(self)
            }

            #[inline]
            fn from_register(register: u64) -> Self {
                register as $ty
            }
        }

        impl Algorithm<$ty> {
            pub const fn new(
                name: &'static str,
                poly: $ty,
                init: $ty,
                xorout: $ty,
                check: $ty,
            ) -> Self {
                Self {
                    name,
                    poly,
                    init,
                    xorout,
                    check,
                    consts: Constants::new(poly as u64, <$ty>::BITS),
                }
            }
        }
    )*};
}

impl_width!(u16, u32, u64);

/// CRC-16/ARC, also known as CRC-16/IBM and CRC-16/LHA.
pub static CRC_16_ARC: Algorithm<u16> = Algorithm::<u16>::new("CRC-16/ARC", 0x8005, 0, 0, 0xbb3d);

/// CRC-32/ISO-HDLC, the CRC of zlib, gzip, PNG and Ethernet.
pub static CRC_32_ISO_HDLC: Algorithm<u32> = Algorithm::<u32>::new(
    "CRC-32/ISO-HDLC",
    0x04c1_1db7,
    0xffff_ffff,
    0xffff_ffff,
    0xcbf4_3926,
);

/// CRC-32/ISCSI, better known as CRC-32C (Castagnoli).
pub static CRC_32_ISCSI: Algorithm<u32> = Algorithm::<u32>::new(
    "CRC-32/ISCSI",
    0x1edc_6f41,
    0xffff_ffff,
    0xffff_ffff,
    0xe306_9283,
);

/// CRC-64/XZ, the ECMA-182 polynomial in reflected form.
pub static CRC_64_XZ: Algorithm<u64> = Algorithm::<u64>::new(
    "CRC-64/XZ",
    0x42f0_e1eb_a9ea_3693,
    !0,
    !0,
    0x995d_c9bb_df19_39fa,
);

/// CRC-64/NVME, used by NVMe end-to-end data protection.
pub static CRC_64_NVME: Algorithm<u64> = Algorithm::<u64>::new(
    "CRC-64/NVME",
    0xad93_d235_94c9_3659,
    !0,
    !0,
    0xae8b_1486_0a79_9888,
);

impl<W: Width> Algorithm<W> {
    /// The folding constants and lookup tables of this polynomial.
    pub fn constants(&self) -> &Constants {
        &self.consts
    }

    /// Advances a raw register (no init, no final xor) over `bytes`,
    /// accelerating when worthwhile and falling back to slice-by-8.
    #[inline]
    pub fn update(&self, crc: W, bytes: &[u8]) -> W {
        self.update_with(crc, bytes, Fallback::Sliced)
    }

    /// Like [`update`](Self::update), with an explicit fallback.
    pub fn update_with(&self, crc: W, bytes: &[u8], fallback: Fallback) -> W {
        if let Some(crc) = guard::accelerated(crc, bytes, &self.consts, fallback) {
            return crc;
        }
        self.update_portable(crc, bytes, fallback)
    }

    /// Advances the register without ever touching the vector unit.
    pub fn update_portable(&self, crc: W, bytes: &[u8], fallback: Fallback) -> W {
        let crc = crc.to_register();
        W::from_register(match fallback {
            Fallback::Bytewise => table::update_bytewise(crc, bytes, &self.consts.tables[0]),
            Fallback::Sliced => table::update_sliced(crc, bytes, &self.consts.tables),
        })
    }

    /// Advances the register with the kernel of `tier`.
    ///
    /// Returns `None` if acceleration is disabled, if the processor cannot run
    /// `tier`, if `bytes` is shorter than 16 bytes, or if the calling thread
    /// already holds the vector context.
    pub fn update_with_tier(&self, tier: Tier, crc: W, bytes: &[u8]) -> Option<W> {
        guard::with_tier(tier, crc, bytes, &self.consts)
    }

    /// Computes the finished checksum of `bytes`.
    pub fn checksum(&self, bytes: &[u8]) -> W {
        self.update(self.init, bytes) ^ self.xorout
    }
}

/// Represents an in-progress CRC computation.
#[derive(Clone, Debug)]
pub struct Digest<W: Width> {
    algorithm: &'static Algorithm<W>,
    fallback: Fallback,
    accelerate: bool,
    state: W,
}

impl<W: Width> Digest<W> {
    /// Creates a new `Digest`.
    ///
    /// The first digest in the process performs runtime CPU feature detection
    /// to determine which algorithm to choose.
    pub fn new(algorithm: &'static Algorithm<W>) -> Self {
        Self::with_fallback(algorithm, Fallback::Sliced)
    }

    /// Creates a new `Digest` that falls back to `fallback` for inputs the
    /// kernels do not take.
    pub fn with_fallback(algorithm: &'static Algorithm<W>, fallback: Fallback) -> Self {
        Self {
            algorithm,
            fallback,
            accelerate: true,
            state: algorithm.init,
        }
    }

    /// Creates a new `Digest` using the slice-by-8 table algorithm only.
    pub fn new_table(algorithm: &'static Algorithm<W>) -> Self {
        Self {
            accelerate: false,
            ..Self::new(algorithm)
        }
    }

    pub fn algorithm(&self) -> &'static Algorithm<W> {
        self.algorithm
    }

    /// Writes some data into the digest.
    pub fn write(&mut self, bytes: &[u8]) {
        self.state = if self.accelerate {
            self.algorithm.update_with(self.state, bytes, self.fallback)
        } else {
            self.algorithm
                .update_portable(self.state, bytes, self.fallback)
        };
    }

    /// Computes the current CRC value.
    pub fn sum(&self) -> W {
        self.state ^ self.algorithm.xorout
    }

    pub fn reset(&mut self) {
        self.state = self.algorithm.init;
    }
}

impl Default for Digest<u64> {
    fn default() -> Self {
        Self::new(&CRC_64_XZ)
    }
}
