// Copyright 2026 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! The process-wide dispatch target.
//!
//! Detection runs once, on first use or through [`init`]. The resulting
//! [`Selection`] is never replaced, so every later reader observes the same
//! tier and availability flag, and the hot path only pays for the
//! already-initialized check.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::OnceCell;

use crate::config::{Config, Thresholds};
use crate::detect::{select_tier, CpuFeatures};
use crate::error::{Error, Result};
#[cfg(any(target_arch = "x86_64", feature = "fake-simd"))]
use crate::pclmulqdq::{self, Kernel};

/// One selectable implementation, ordered from narrowest to widest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// 128-bit PCLMULQDQ. Requires only the base carry-less multiply.
    Pclmul,
    /// 256-bit VPCLMULQDQ with AVX2.
    VpclmulAvx2,
    /// 256-bit VPCLMULQDQ using AVX-512VL instructions, for processors that
    /// prefer not to use 512-bit registers.
    VpclmulAvx512Ymm,
    /// 512-bit VPCLMULQDQ with AVX-512.
    VpclmulAvx512Zmm,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::Pclmul,
        Tier::VpclmulAvx2,
        Tier::VpclmulAvx512Ymm,
        Tier::VpclmulAvx512Zmm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Pclmul => "pclmul",
            Tier::VpclmulAvx2 => "avx2",
            Tier::VpclmulAvx512Ymm => "avx512-ymm",
            Tier::VpclmulAvx512Zmm => "avx512-zmm",
        }
    }

    /// Whether this processor can run the tier's kernel, regardless of the
    /// tier that was selected.
    pub fn is_supported(self) -> bool {
        selection().features.supports(self)
    }

    #[cfg(any(target_arch = "x86_64", feature = "fake-simd"))]
    pub(crate) fn kernel(self) -> Kernel {
        pclmulqdq::kernel(self)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Tier::ALL
            .into_iter()
            .find(|tier| tier.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::config(format!("unknown tier {s:?}")))
    }
}

/// The outcome of capability detection.
#[derive(Copy, Clone, Debug)]
pub struct Selection {
    pub tier: Tier,
    /// Whether any accelerated path may run at all.
    pub have_pclmulqdq: bool,
    pub features: CpuFeatures,
    pub thresholds: Thresholds,
    #[cfg(any(target_arch = "x86_64", feature = "fake-simd"))]
    pub(crate) kernel: Kernel,
}

impl Selection {
    pub(crate) fn new(features: CpuFeatures, config: &Config) -> Self {
        let detected = select_tier(&features);
        let tier = match config.max_tier {
            Some(cap) if cap < detected => {
                tracing::info!(%detected, %cap, "CRC folding tier capped by configuration");
                cap
            }
            _ => detected,
        };
        let have_pclmulqdq = features.has_pclmulqdq() && !config.disabled;
        tracing::debug!(
            %tier,
            have_pclmulqdq,
            bytewise_threshold = config.thresholds.bytewise,
            sliced_threshold = config.thresholds.sliced,
            "selected CRC folding tier"
        );
        Self {
            tier,
            have_pclmulqdq,
            features,
            thresholds: config.thresholds,
            #[cfg(any(target_arch = "x86_64", feature = "fake-simd"))]
            kernel: tier.kernel(),
        }
    }
}

static SELECTION: OnceCell<Selection> = OnceCell::new();

#[inline]
pub(crate) fn selection() -> &'static Selection {
    SELECTION.get_or_init(|| {
        let config = Config::from_env();
        Selection::new(CpuFeatures::detect(), &config)
    })
}

/// Runs detection if it has not run yet and returns the selection.
///
/// Every call in the process returns the same value.
pub fn detect_and_select() -> Selection {
    *selection()
}

/// Installs an explicit configuration, replacing the environment lookup.
///
/// Must be called before anything computes a CRC. Once a selection exists it
/// is never changed and this returns [`Error::AlreadyInitialized`].
pub fn init(config: Config) -> Result<Selection> {
    config.validate()?;
    let mut installed = false;
    let selection = SELECTION.get_or_init(|| {
        installed = true;
        Selection::new(CpuFeatures::detect(), &config)
    });
    if installed {
        Ok(*selection)
    } else {
        Err(Error::AlreadyInitialized)
    }
}

pub fn current_tier() -> Tier {
    selection().tier
}

#[inline]
pub fn have_pclmulqdq() -> bool {
    selection().have_pclmulqdq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avx512() -> CpuFeatures {
        CpuFeatures {
            pclmulqdq: true,
            sse41: true,
            avx2: true,
            vpclmulqdq: true,
            avx512f: true,
            avx512bw: true,
            avx512vl: true,
            os_ymm: true,
            os_zmm: true,
            prefer_ymm: false,
        }
    }

    #[test]
    fn test_tier_names_round_trip() {
        for tier in Tier::ALL {
            assert_eq!(tier.name().parse::<Tier>().unwrap(), tier);
        }
        assert_eq!("AVX2".parse::<Tier>().unwrap(), Tier::VpclmulAvx2);
        assert!("sse".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tiers_are_ordered() {
        assert!(Tier::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_selection_cap() {
        let config = Config {
            max_tier: Some(Tier::VpclmulAvx2),
            ..Config::default()
        };
        let selection = Selection::new(avx512(), &config);
        assert_eq!(selection.tier, Tier::VpclmulAvx2);
        assert!(selection.have_pclmulqdq);

        // A cap above the detected tier changes nothing.
        let config = Config {
            max_tier: Some(Tier::VpclmulAvx512Zmm),
            ..Config::default()
        };
        let features = CpuFeatures {
            avx512bw: false,
            ..avx512()
        };
        assert_eq!(Selection::new(features, &config).tier, Tier::VpclmulAvx2);
    }

    #[test]
    fn test_selection_disabled() {
        let config = Config {
            disabled: true,
            ..Config::default()
        };
        let selection = Selection::new(avx512(), &config);
        assert!(!selection.have_pclmulqdq);
        let undetected = Selection::new(CpuFeatures::default(), &Config::default());
        assert!(!undetected.have_pclmulqdq);
    }

    #[test]
    fn test_supports() {
        let features = avx512();
        assert!(Tier::ALL.into_iter().all(|tier| features.supports(tier)));
        let none = CpuFeatures::default();
        assert!(Tier::ALL.into_iter().all(|tier| !none.supports(tier)));
        let avx2_only = CpuFeatures {
            os_zmm: false,
            ..features
        };
        assert!(avx2_only.supports(Tier::VpclmulAvx2));
        assert!(!avx2_only.supports(Tier::VpclmulAvx512Ymm));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let first = detect_and_select();
        let second = detect_and_select();
        assert_eq!(first.tier, second.tier);
        assert_eq!(first.have_pclmulqdq, second.have_pclmulqdq);
        assert_eq!(first.features, second.features);
        assert_eq!(current_tier(), first.tier);
    }

    #[test]
    fn test_init_after_selection_fails() {
        detect_and_select();
        assert_eq!(
            init(Config::default()).unwrap_err(),
            Error::AlreadyInitialized
        );
        let bad = Config {
            thresholds: Thresholds {
                bytewise: 4,
                sliced: 64,
            },
            ..Config::default()
        };
        assert!(matches!(init(bad), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_selected_tier_is_supported() {
        let selection = detect_and_select();
        if selection.features.has_pclmulqdq() {
            assert!(selection.tier.is_supported());
        }
    }
}
