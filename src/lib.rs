// Copyright 2019 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! `crcfold`
//! =========
//!
//! Runtime-dispatched CRC computation using carry-less multiplication
//! (PCLMULQDQ and VPCLMULQDQ), with table-driven fallback.
//!
//! Any bit-reflected CRC of width 16, 32 or 64 is supported. The processor is
//! probed once per process and the widest usable kernel is selected; short
//! inputs, unsupported processors and re-entrant calls take the portable path.
//!
//! ## Usage
//!
//! ```
//! use crcfold::{Digest, CRC_64_XZ};
//!
//! let mut c = Digest::new(&CRC_64_XZ);
//! c.write(b"hello ");
//! c.write(b"world!");
//! let checksum = c.sum();
//! assert_eq!(checksum, 0x8483_c0fa_3260_7d61);
//! ```
//!
//! One-shot checksums are available on the algorithm itself:
//!
//! ```
//! assert_eq!(crcfold::CRC_32_ISCSI.checksum(b"123456789"), 0xe306_9283);
//! ```
//!
//! ## Configuration
//!
//! The selection can be narrowed through the environment (see [`Config`]) or
//! by calling [`init`] before the first checksum:
//!
//! ```
//! use crcfold::{Config, Tier};
//!
//! let config = Config {
//!     max_tier: Some(Tier::Pclmul),
//!     ..Config::default()
//! };
//! match crcfold::init(config) {
//!     Ok(selection) => assert!(selection.tier <= Tier::Pclmul),
//!     Err(crcfold::Error::AlreadyInitialized) => {}
//!     Err(e) => panic!("{e}"),
//! }
//! ```

mod algorithm;
mod config;
mod consts;
mod detect;
mod dispatch;
mod error;
mod guard;
#[cfg(any(target_arch = "x86_64", feature = "fake-simd"))]
mod pclmulqdq;
mod table;

pub use crate::algorithm::{
    Algorithm, Digest, Width, CRC_16_ARC, CRC_32_ISCSI, CRC_32_ISO_HDLC, CRC_64_NVME, CRC_64_XZ,
};
pub use crate::config::{
    Config, Thresholds, ENV_DISABLE, ENV_MAX_TIER, ENV_THRESHOLD_BYTEWISE, ENV_THRESHOLD_SLICED,
};
pub use crate::consts::Constants;
pub use crate::detect::{select_tier, CpuFeatures};
pub use crate::dispatch::{current_tier, detect_and_select, have_pclmulqdq, init, Selection, Tier};
pub use crate::error::{Error, Result};
pub use crate::guard::{
    accelerated, try_accelerated, with_context, ContextGuard, Fallback, ThreadContext,
    VectorContext, MIN_KERNEL_LEN,
};
