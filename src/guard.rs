// Copyright 2026 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! The per-call decision whether to take the accelerated path.
//!
//! A call is accelerated only when the input is long enough to pay for
//! entering the vector context, the processor has carry-less multiplication,
//! and the vector context can be acquired right now. Any gate failing is an
//! ordinary outcome: the guard returns `None` and the caller runs its own
//! portable code.

use std::cell::Cell;

use crate::algorithm::Width;
use crate::consts::Constants;
use crate::dispatch::{self, Selection, Tier};

/// The kernels fold at least one full 128-bit lane.
pub const MIN_KERNEL_LEN: usize = 16;

/// Speed class of the portable code the caller falls back to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Fallback {
    /// Slice-by-1, one table lookup per byte.
    Bytewise,
    /// Slice-by-8.
    #[default]
    Sliced,
}

impl Fallback {
    pub const fn default_threshold(self) -> usize {
        match self {
            Fallback::Bytewise => MIN_KERNEL_LEN,
            Fallback::Sliced => 64,
        }
    }
}

/// Exclusive access to the vector register file.
///
/// `try_acquire` must never block. A `false` return means the vector unit
/// cannot be used from this context at the moment.
pub trait VectorContext {
    fn try_acquire(&self) -> bool;
    fn release(&self);
}

thread_local! {
    static VECTOR_IN_USE: Cell<bool> = const { Cell::new(false) };
}

/// Per-thread vector context. Acquisition fails while the same thread already
/// holds it, e.g. when a kernel is re-entered from a callback.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadContext;

impl VectorContext for ThreadContext {
    fn try_acquire(&self) -> bool {
        // During thread teardown the flag may already be gone; treat that as
        // unavailable.
        VECTOR_IN_USE
            .try_with(|in_use| !in_use.replace(true))
            .unwrap_or(false)
    }

    fn release(&self) {
        let _ = VECTOR_IN_USE.try_with(|in_use| in_use.set(false));
    }
}

/// Holds a [`VectorContext`] until dropped.
#[must_use = "the vector context is released as soon as the guard is dropped"]
pub struct ContextGuard<'a, C: VectorContext + ?Sized> {
    ctx: &'a C,
}

impl<'a, C: VectorContext + ?Sized> ContextGuard<'a, C> {
    pub fn try_acquire(ctx: &'a C) -> Option<Self> {
        if ctx.try_acquire() {
            Some(Self { ctx })
        } else {
            None
        }
    }
}

impl<C: VectorContext + ?Sized> Drop for ContextGuard<'_, C> {
    fn drop(&mut self) {
        self.ctx.release();
    }
}

/// Runs `f` while holding `ctx`. The context is released on every exit path,
/// including unwinding out of `f`.
pub fn with_context<C, R>(ctx: &C, f: impl FnOnce() -> R) -> Option<R>
where
    C: VectorContext + ?Sized,
{
    let _guard = ContextGuard::try_acquire(ctx)?;
    Some(f())
}

/// Attempts the accelerated path with the currently selected kernel.
///
/// Returns `None`, leaving `crc` untouched, when `bytes` is shorter than the
/// threshold for `fallback`, when `available` is false, or when `ctx` cannot
/// be acquired. `Some` is final: the caller must not run its fallback as well.
///
/// # Safety
///
/// `available` may only be true if the processor supports the baseline tier,
/// as reported by [`dispatch::have_pclmulqdq`].
pub unsafe fn try_accelerated<W, C>(
    crc: W,
    bytes: &[u8],
    consts: &Constants,
    available: bool,
    fallback: Fallback,
    ctx: &C,
) -> Option<W>
where
    W: Width,
    C: VectorContext + ?Sized,
{
    let selection = dispatch::selection();
    try_accelerated_with(selection, crc, bytes, consts, available, fallback, ctx)
}

/// [`try_accelerated`] against an explicit selection.
///
/// # Safety
///
/// As for [`try_accelerated`]. In addition, `selection` must come from
/// [`Selection::new`] with the features of this processor.
pub(crate) unsafe fn try_accelerated_with<W, C>(
    selection: &Selection,
    crc: W,
    bytes: &[u8],
    consts: &Constants,
    available: bool,
    fallback: Fallback,
    ctx: &C,
) -> Option<W>
where
    W: Width,
    C: VectorContext + ?Sized,
{
    if bytes.len() < selection.thresholds.min_len(fallback) {
        return None;
    }
    if !available {
        return None;
    }

    #[cfg(any(target_arch = "x86_64", feature = "fake-simd"))]
    {
        let kernel = selection.kernel;
        with_context(ctx, || {
            W::from_register(unsafe { kernel(crc.to_register(), bytes, consts) })
        })
    }

    #[cfg(not(any(target_arch = "x86_64", feature = "fake-simd")))]
    {
        let _ = (crc, consts, ctx);
        None
    }
}

/// [`try_accelerated`] with the process availability flag and the calling
/// thread's vector context.
#[inline]
pub fn accelerated<W: Width>(
    crc: W,
    bytes: &[u8],
    consts: &Constants,
    fallback: Fallback,
) -> Option<W> {
    let available = dispatch::have_pclmulqdq();
    // SAFETY: the flag comes from detection.
    unsafe { try_accelerated(crc, bytes, consts, available, fallback, &ThreadContext) }
}

/// Runs the kernel of a specific tier, bypassing the length thresholds.
///
/// Returns `None` if acceleration is disabled, if the processor cannot run
/// `tier`, if `bytes` is shorter than [`MIN_KERNEL_LEN`], or if the vector
/// context is busy.
pub(crate) fn with_tier<W: Width>(
    tier: Tier,
    crc: W,
    bytes: &[u8],
    consts: &Constants,
) -> Option<W> {
    with_tier_in(dispatch::selection(), tier, crc, bytes, consts)
}

fn with_tier_in<W: Width>(
    selection: &Selection,
    tier: Tier,
    crc: W,
    bytes: &[u8],
    consts: &Constants,
) -> Option<W> {
    if bytes.len() < MIN_KERNEL_LEN || !selection.have_pclmulqdq || !tier.is_supported() {
        return None;
    }

    #[cfg(any(target_arch = "x86_64", feature = "fake-simd"))]
    {
        let kernel = tier.kernel();
        with_context(&ThreadContext, || {
            // SAFETY: support for `tier` was checked above.
            W::from_register(unsafe { kernel(crc.to_register(), bytes, consts) })
        })
    }

    #[cfg(not(any(target_arch = "x86_64", feature = "fake-simd")))]
    {
        let _ = (crc, consts);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Thresholds};
    use crate::detect::CpuFeatures;
    use crate::table;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    const CRC32: Constants = Constants::new(0x04c1_1db7, 32);

    #[derive(Default)]
    struct CountingContext {
        deny: bool,
        held: Cell<bool>,
        acquired: Cell<usize>,
        released: Cell<usize>,
    }

    impl VectorContext for CountingContext {
        fn try_acquire(&self) -> bool {
            if self.deny || self.held.get() {
                return false;
            }
            self.held.set(true);
            self.acquired.set(self.acquired.get() + 1);
            true
        }

        fn release(&self) {
            assert!(
                self.held.replace(false),
                "released a context that was not held"
            );
            self.released.set(self.released.get() + 1);
        }
    }

    fn portable(crc: u32, bytes: &[u8]) -> u32 {
        table::update_bytewise(u64::from(crc), bytes, &CRC32.tables[0]) as u32
    }

    fn selection_with(config: Config) -> Selection {
        Selection::new(CpuFeatures::detect(), &config)
    }

    #[test]
    fn test_short_inputs_are_not_handled() {
        let ctx = CountingContext::default();
        let bytes = [0u8; 63];
        let short = &bytes[..15];
        for fallback in [Fallback::Sliced, Fallback::Bytewise] {
            let res = unsafe { try_accelerated(!0u32, short, &CRC32, true, fallback, &ctx) };
            assert_eq!(res, None);
        }
        let sliced = Fallback::Sliced;
        let res = unsafe { try_accelerated(!0u32, &bytes, &CRC32, true, sliced, &ctx) };
        assert_eq!(res, None);
        assert_eq!(ctx.acquired.get(), 0);
    }

    #[test]
    fn test_sixteen_bytes_over_bytewise() {
        if !dispatch::have_pclmulqdq() {
            return;
        }
        let ctx = CountingContext::default();
        let bytes = [0u8; 16];
        let bytewise = Fallback::Bytewise;
        let res = unsafe { try_accelerated(!0u32, &bytes, &CRC32, true, bytewise, &ctx) };
        assert_eq!(res, Some(portable(!0, &bytes)));
        assert_eq!(ctx.acquired.get(), 1);
        assert_eq!(ctx.released.get(), 1);
    }

    #[test]
    fn test_configured_thresholds() {
        let selection = selection_with(Config {
            thresholds: Thresholds {
                bytewise: 32,
                sliced: 128,
            },
            ..Config::default()
        });
        if !selection.have_pclmulqdq {
            return;
        }
        let ctx = CountingContext::default();
        let bytes = [0x5au8; 128];
        let cases = [
            (Fallback::Bytewise, 31, false),
            (Fallback::Bytewise, 32, true),
            (Fallback::Sliced, 127, false),
            (Fallback::Sliced, 128, true),
        ];
        for (fallback, len, handled) in cases {
            let bytes = &bytes[..len];
            let res = unsafe {
                try_accelerated_with(&selection, !0u32, bytes, &CRC32, true, fallback, &ctx)
            };
            let expected = handled.then(|| portable(!0, bytes));
            assert_eq!(res, expected, "{fallback:?} length {len}");
        }
        assert_eq!(ctx.acquired.get(), 2);
        assert_eq!(ctx.released.get(), 2);
    }

    #[test]
    fn test_unavailable_is_never_handled() {
        let ctx = CountingContext::default();
        for len in [16, 64, 65, 1024] {
            let bytes = vec![0xa5; len];
            for fallback in [Fallback::Sliced, Fallback::Bytewise] {
                let res = unsafe { try_accelerated(0u32, &bytes, &CRC32, false, fallback, &ctx) };
                assert_eq!(res, None);
            }
        }
        // The cheap flag is checked before the context is touched.
        assert_eq!(ctx.acquired.get(), 0);
    }

    #[test]
    fn test_disabled_refuses_forced_tiers() {
        let bytes = [7u8; 256];
        let disabled = selection_with(Config {
            disabled: true,
            ..Config::default()
        });
        for tier in Tier::ALL {
            assert_eq!(with_tier_in(&disabled, tier, !0u32, &bytes, &CRC32), None);
        }

        let enabled = selection_with(Config::default());
        for tier in Tier::ALL.into_iter().filter(|tier| tier.is_supported()) {
            let res = with_tier_in(&enabled, tier, !0u32, &bytes, &CRC32);
            assert_eq!(res, Some(portable(!0, &bytes)), "tier {tier}");
        }
    }

    #[test]
    fn test_busy_context_is_not_handled() {
        let ctx = CountingContext {
            deny: true,
            ..CountingContext::default()
        };
        let available = dispatch::have_pclmulqdq();
        let bytes = [1u8; 256];
        let sliced = Fallback::Sliced;
        let res = unsafe { try_accelerated(0u32, &bytes, &CRC32, available, sliced, &ctx) };
        assert_eq!(res, None);
        assert_eq!(ctx.released.get(), 0);
    }

    #[test]
    fn test_context_released_on_unwind() {
        let ctx = CountingContext::default();
        let res = catch_unwind(AssertUnwindSafe(|| {
            with_context(&ctx, || -> u32 { panic!("kernel fault") })
        }));
        assert!(res.is_err());
        assert_eq!(ctx.acquired.get(), 1);
        assert_eq!(ctx.released.get(), 1);
        assert!(!ctx.held.get());
    }

    #[test]
    fn test_thread_context_is_not_reentrant() {
        let nested = with_context(&ThreadContext, || with_context(&ThreadContext, || ()));
        assert_eq!(nested, Some(None));
        // Released again once the outer scope ended.
        assert_eq!(with_context(&ThreadContext, || 7), Some(7));
    }

    #[test]
    fn test_thread_context_is_per_thread() {
        let res = with_context(&ThreadContext, || {
            std::thread::spawn(|| with_context(&ThreadContext, || ()).is_some())
                .join()
                .unwrap()
        });
        assert_eq!(res, Some(true));
    }

    #[test]
    fn test_nested_call_falls_back() {
        let bytes = [3u8; 512];
        let inner = with_context(&ThreadContext, || {
            accelerated(0u32, &bytes, &CRC32, Fallback::Bytewise)
        });
        assert_eq!(inner, Some(None));
    }

    #[test]
    fn test_accelerated_matches_portable() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4099).collect();
        for len in [16, 17, 63, 64, 127, 128, 129, 255, 256, 257, 1000, 4099] {
            let bytes = &bytes[..len];
            let expected = portable(0x1234_5678, bytes);
            if let Some(crc) = accelerated(0x1234_5678u32, bytes, &CRC32, Fallback::Bytewise) {
                assert_eq!(crc, expected, "length {len}");
            }
        }
    }
}
