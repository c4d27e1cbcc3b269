//! Retry delay policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Ceiling on any computed retry delay.
const MAX_RETRY_DELAY_MS: u64 = 10 * 60 * 1000;

/// Exponent cap so the shift never overflows.
const MAX_BACKOFF_EXPONENT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay_ms: u64 },
    /// `base_ms * 2^(failures - 1)`, capped.
    Exponential { base_ms: u64 },
}

impl Backoff {
    /// Delay before the retry that follows the given number of failures.
    pub fn delay(&self, failures: u32) -> Duration {
        let ms = match *self {
            Backoff::Fixed { delay_ms } => delay_ms,
            Backoff::Exponential { base_ms } => {
                let shift = failures.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
                let factor = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
                base_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms.min(MAX_RETRY_DELAY_MS))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential { base_ms: 1000 }
    }
}
