// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The research agents, one [`Node`](volera_graph::Node) each.

mod planner;
mod recovery;
mod researcher;
mod responder;
mod reviewer;

pub use planner::PlannerNode;
pub use recovery::{RecoveryNode, RETRY_PROMPT};
pub use researcher::ResearcherNode;
pub use responder::ResponderNode;
pub use reviewer::ReviewerNode;

use volera_core::VoleraError;

/// Error-event key for a user who cannot pay.
pub const INSUFFICIENT_CREDITS_KEY: &str = "insufficient_credits";
pub const DAILY_LIMIT_KEY: &str = "daily_limit";

/// Ledger key of the single research charge of a run.
pub(crate) fn research_charge_key(run_id: &str) -> String {
    format!("research:{run_id}")
}

pub(crate) fn credits_message(required: i64, available: i64) -> String {
    format!(
        "You need {required} credits for this search but have {available}. \
         Please top up your credits to continue."
    )
}

/// User-facing text and event key for a failure the pipeline cannot recover from.
pub(crate) fn user_facing(error: &VoleraError) -> (String, &'static str) {
    match error {
        VoleraError::InsufficientCredits {
            required,
            available,
        } => (credits_message(*required, *available), INSUFFICIENT_CREDITS_KEY),
        VoleraError::DailyLimitExceeded { limit, .. } => (
            format!("You have reached your daily limit of {limit} credits. Please try again tomorrow."),
            DAILY_LIMIT_KEY,
        ),
        VoleraError::Timeout { .. } => (
            "The assistant took too long to answer. Please try again.".to_string(),
            "timeout",
        ),
        _ => (
            "Something went wrong while researching. Please try again.".to_string(),
            "internal",
        ),
    }
}
