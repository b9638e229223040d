// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily spend cap.
//!
//! Emits a `tracing::warn` once projected spend passes 80% of the cap and
//! fails with `VoleraError::DailyLimitExceeded` when it would pass the cap.

use tracing::warn;
use volera_core::VoleraError;

/// Per-user daily credit cap. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyLimit {
    cap: Option<i64>,
}

impl DailyLimit {
    pub fn new(cap: Option<i64>) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> Option<i64> {
        self.cap
    }

    /// Fails if `spent_today + cost` would exceed the cap.
    pub fn check(&self, user_id: &str, spent_today: i64, cost: i64) -> Result<(), VoleraError> {
        let Some(cap) = self.cap else {
            return Ok(());
        };
        let projected = spent_today.saturating_add(cost);
        if projected > cap {
            return Err(VoleraError::DailyLimitExceeded {
                limit: cap,
                projected,
            });
        }
        if projected * 10 >= cap * 8 {
            warn!(user_id, projected, cap, "approaching daily credit limit (80%+)");
        }
        Ok(())
    }
}
