// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user credit accounting for Volera.
//!
//! Every metered operation is priced by [`CreditPricing`], checked against
//! the balance before it runs, and deducted through [`CreditLedger::track`]
//! once it succeeds. Deductions carry a ledger key so a retried deduction
//! for the same operation is recorded once.

pub mod ledger;
pub mod limits;
pub mod pricing;

pub use ledger::{CreditCheck, CreditLedger, CreditTransaction, TrackOutcome};
pub use limits::DailyLimit;
pub use pricing::CreditPricing;
