//! Tiered proptest configuration
//!
//! Case counts follow the active test tier, selected with Cargo features:
//!
//! | Tier     | Feature     | Cases |
//! |----------|-------------|-------|
//! | Fast     | `test-fast` | 10    |
//! | Standard | (default)   | 50    |
//! | Full     | `test-full` | 500   |
//!
//! `PROPTEST_CASES` overrides the tier. Async property tests build one
//! runtime per test and drive it from a [`TestRunner`]:
//!
//! ```ignore
//! use inferadb_datastore_test_fixtures::proptest_config::proptest_config;
//! use proptest::{prelude::*, test_runner::TestRunner};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let mut runner = TestRunner::new(proptest_config());
//! runner
//!     .run(&any::<u32>(), |_input| {
//!         rt.block_on(async { /* test */ });
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};

/// Test execution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Fast,
    Standard,
    Full,
}

impl Tier {
    pub const fn proptest_cases(self) -> u32 {
        match self {
            Self::Fast => 10,
            Self::Standard => 50,
            Self::Full => 500,
        }
    }
}

/// The tier selected by Cargo features; `test-full` wins if both are set
pub const fn current_tier() -> Tier {
    if cfg!(feature = "test-full") {
        Tier::Full
    } else if cfg!(feature = "test-fast") {
        Tier::Fast
    } else {
        Tier::Standard
    }
}

/// Case count for the current tier, unless `PROPTEST_CASES` is set
#[must_use]
pub fn test_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(current_tier().proptest_cases())
}

#[must_use]
pub fn proptest_config() -> Config {
    Config::with_cases(test_cases())
}

/// Seed used by [`smoke_runner`]
pub const SMOKE_SEED: [u8; 32] = [0x2a; 32];

/// A runner with five cases and a fixed seed, for quick deterministic checks
#[must_use]
pub fn smoke_runner() -> TestRunner {
    TestRunner::new_with_rng(
        Config { cases: 5, ..Config::default() },
        TestRng::from_seed(RngAlgorithm::ChaCha, &SMOKE_SEED),
    )
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn test_tier_cases() {
        assert_eq!(Tier::Fast.proptest_cases(), 10);
        assert_eq!(Tier::Full.proptest_cases(), 500);
        assert!(proptest_config().cases > 0);
    }

    #[test]
    fn test_smoke_runner_is_deterministic() {
        let sample = || {
            let values = RefCell::new(Vec::new());
            smoke_runner()
                .run(&(0u32..1000), |v| {
                    values.borrow_mut().push(v);
                    Ok(())
                })
                .unwrap();
            values.into_inner()
        };

        let first = sample();
        assert_eq!(first.len(), 5);
        assert_eq!(first, sample());
    }
}
