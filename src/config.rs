// Copyright 2026 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! Dispatch configuration.
//!
//! The defaults are right for almost everyone. The knobs exist for
//! benchmarking, for working around a misbehaving CPU, and for tuning the
//! short-input cut-over against a particular fallback.
//!
//! | Variable                     | Meaning                                        |
//! |------------------------------|------------------------------------------------|
//! | `CRCFOLD_MAX_TIER`           | widest tier allowed (`pclmul`, `avx2`, `avx512-ymm`, `avx512-zmm`) |
//! | `CRCFOLD_DISABLE`            | `1`/`true` turns acceleration off entirely     |
//! | `CRCFOLD_THRESHOLD_BYTEWISE` | minimum length accelerated over slice-by-1    |
//! | `CRCFOLD_THRESHOLD_SLICED`   | minimum length accelerated over slice-by-8    |

use std::env;

use crate::dispatch::Tier;
use crate::error::{Error, Result};
use crate::guard::{Fallback, MIN_KERNEL_LEN};

pub const ENV_MAX_TIER: &str = "CRCFOLD_MAX_TIER";
pub const ENV_DISABLE: &str = "CRCFOLD_DISABLE";
pub const ENV_THRESHOLD_BYTEWISE: &str = "CRCFOLD_THRESHOLD_BYTEWISE";
pub const ENV_THRESHOLD_SLICED: &str = "CRCFOLD_THRESHOLD_SLICED";

/// Shortest input worth accelerating, per fallback class.
///
/// Entering and leaving the vector context has a fixed cost. Against a
/// byte-at-a-time fallback that cost is recovered almost immediately, so only
/// the kernels' own 16-byte minimum applies. Slice-by-8 is fast enough that
/// roughly 64 bytes are needed before acceleration wins. The exact break-even
/// point depends on the CPU model.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Thresholds {
    pub bytewise: usize,
    pub sliced: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            bytewise: Fallback::Bytewise.default_threshold(),
            sliced: Fallback::Sliced.default_threshold(),
        }
    }
}

impl Thresholds {
    #[inline]
    pub fn min_len(&self, fallback: Fallback) -> usize {
        match fallback {
            Fallback::Bytewise => self.bytewise,
            Fallback::Sliced => self.sliced,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("bytewise", self.bytewise), ("sliced", self.sliced)] {
            if value < MIN_KERNEL_LEN {
                return Err(Error::config(format!(
                    "{name} threshold {value} is below the kernel minimum of {MIN_KERNEL_LEN} bytes"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Caps the selected tier. `None` uses the widest supported tier.
    pub max_tier: Option<Tier>,
    /// Forces every call onto the portable fallback, including calls that
    /// name a tier explicitly.
    pub disabled: bool,
    pub thresholds: Thresholds,
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// Malformed values are logged and ignored so that a typo can never take
    /// down the process or disable checksumming.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(tier) = parse_var(&lookup, ENV_MAX_TIER, str::parse::<Tier>) {
            config.max_tier = Some(tier);
        }
        if let Some(disabled) = parse_var(&lookup, ENV_DISABLE, parse_bool) {
            config.disabled = disabled;
        }
        if let Some(len) = parse_var(&lookup, ENV_THRESHOLD_BYTEWISE, parse_threshold) {
            config.thresholds.bytewise = len;
        }
        if let Some(len) = parse_var(&lookup, ENV_THRESHOLD_SLICED, parse_threshold) {
            config.thresholds.sliced = len;
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl FnOnce(&str) -> Result<T>,
) -> Option<T> {
    let raw = lookup(name)?;
    match parse(raw.trim()) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                variable = name,
                value = %raw,
                error = %err,
                "ignoring malformed override"
            );
            None
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::config(format!("expected a boolean, got {value:?}")))
    }
}

fn parse_threshold(value: &str) -> Result<usize> {
    let len = value
        .parse::<usize>()
        .map_err(|err| Error::config(format!("expected a byte count, got {value:?}: {err}")))?;
    if len < MIN_KERNEL_LEN {
        return Err(Error::config(format!(
            "threshold {len} is below the kernel minimum of {MIN_KERNEL_LEN} bytes"
        )));
    }
    Ok(len)
}
