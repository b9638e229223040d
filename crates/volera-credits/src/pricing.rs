// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit prices per operation type.

use volera_config::model::CreditsConfig;
use volera_core::Charge;

/// Credits charged for each [`Charge`] category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditPricing {
    pub text: i64,
    pub image: i64,
    pub research: i64,
}

impl CreditPricing {
    pub fn from_config(config: &CreditsConfig) -> Self {
        Self {
            text: config.text_cost,
            image: config.image_cost,
            research: config.research_cost,
        }
    }

    /// Credits for one operation. Explicit amounts are taken as-is.
    pub fn cost(&self, charge: Charge) -> i64 {
        match charge {
            Charge::Text => self.text,
            Charge::Image => self.image,
            Charge::Research => self.research,
            Charge::Amount(n) => n,
        }
    }
}

impl Default for CreditPricing {
    fn default() -> Self {
        Self::from_config(&CreditsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prices() {
        let p = CreditPricing::default();
        assert_eq!(p.cost(Charge::Text), 1);
        assert_eq!(p.cost(Charge::Image), 5);
        assert_eq!(p.cost(Charge::Research), 100);
        assert_eq!(p.cost(Charge::Amount(42)), 42);
    }
}
