//! Savings opportunity detectors
//!
//! Each detector looks at the filtered transaction set and proposes
//! opportunities independently. The analyzer concatenates their output and
//! sorts it; overlapping transactions across detectors are not de-duplicated.
//!
//! - **Recurring subscription** - same payee, near-constant amount
//! - **High-frequency small** - many small purchases in one category
//! - **Unusual spike** - one purchase far above the category mean
//! - **Category overspend** - needs budget data, currently a no-op

use std::collections::BTreeMap;

use crate::models::Transaction;

use super::types::{Confidence, OpportunityKind, SavingsOpportunity};

/// A single savings heuristic
pub trait SavingsDetector: Send + Sync {
    /// Kind of opportunity this detector emits
    fn kind(&self) -> OpportunityKind;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Inspect the transactions and propose opportunities
    fn detect(&self, transactions: &[&Transaction]) -> Vec<SavingsOpportunity>;
}

/// Mean of a non-empty slice, 0 for an empty one
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, 0 for an empty slice
pub(crate) fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Group outflows by resolved category label, keeping input order per group
pub(crate) fn outflows_by_category<'a>(
    transactions: &[&'a Transaction],
) -> BTreeMap<String, Vec<&'a Transaction>> {
    let mut groups: BTreeMap<String, Vec<&'a Transaction>> = BTreeMap::new();
    for tx in transactions.iter().filter(|t| t.is_outflow()) {
        groups
            .entry(tx.category_label().to_string())
            .or_default()
            .push(*tx);
    }
    groups
}

fn owned(transactions: &[&Transaction]) -> Vec<Transaction> {
    transactions.iter().map(|t| (*t).clone()).collect()
}

// =============================================================================
// Recurring subscriptions
// =============================================================================

/// Flags payees charged repeatedly for nearly the same amount
pub struct RecurringSubscriptionDetector {
    /// Minimum charges from the same payee
    min_occurrences: usize,
    /// Variance must stay below this fraction of the mean
    max_variance_ratio: f64,
}

impl RecurringSubscriptionDetector {
    pub fn new() -> Self {
        Self {
            min_occurrences: 2,
            max_variance_ratio: 0.10,
        }
    }

    pub fn with_thresholds(min_occurrences: usize, max_variance_ratio: f64) -> Self {
        Self {
            min_occurrences,
            max_variance_ratio,
        }
    }
}

impl Default for RecurringSubscriptionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SavingsDetector for RecurringSubscriptionDetector {
    fn kind(&self) -> OpportunityKind {
        OpportunityKind::RecurringSubscription
    }

    fn name(&self) -> &'static str {
        "Recurring Subscription"
    }

    fn detect(&self, transactions: &[&Transaction]) -> Vec<SavingsOpportunity> {
        let mut by_payee: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
        for tx in transactions.iter().filter(|t| t.is_outflow()) {
            match tx.payee_name.as_deref() {
                Some(payee) if !payee.is_empty() => by_payee.entry(payee).or_default().push(*tx),
                _ => {}
            }
        }

        let mut opportunities = Vec::new();
        for (payee, charges) in by_payee {
            if charges.len() < self.min_occurrences {
                continue;
            }

            let amounts: Vec<f64> = charges.iter().map(|t| t.amount.abs()).collect();
            let avg = mean(&amounts);
            let variance = population_variance(&amounts);
            if variance >= self.max_variance_ratio * avg {
                continue;
            }

            let annual = avg * 12.0;
            let category = charges[0].category_label().to_string();
            let opportunity = SavingsOpportunity::new(
                OpportunityKind::RecurringSubscription,
                category,
                format!(
                    "{} charges about ${:.2} regularly ({} charges found), roughly ${:.2}/year",
                    payee,
                    avg,
                    charges.len(),
                    annual
                ),
                annual,
                Confidence::High,
            )
            .with_recommendation(format!("Check whether you still use {}", payee))
            .with_recommendation("Look for a cheaper plan or an annual billing discount")
            .with_recommendation("Cancel if it is no longer worth the cost")
            .with_transactions(owned(&charges));

            opportunities.push(opportunity);
        }

        opportunities
    }
}

// =============================================================================
// High-frequency small purchases
// =============================================================================

/// Flags categories with many small purchases
pub struct HighFrequencySmallDetector {
    /// Purchases strictly below this amount count as small
    small_threshold: f64,
    /// Minimum small purchases in a category
    min_count: usize,
    /// Fraction of small-purchase spend assumed avoidable
    savings_rate: f64,
}

impl HighFrequencySmallDetector {
    pub fn new() -> Self {
        Self {
            small_threshold: 20.0,
            min_count: 10,
            savings_rate: 0.30,
        }
    }

    pub fn with_thresholds(small_threshold: f64, min_count: usize, savings_rate: f64) -> Self {
        Self {
            small_threshold,
            min_count,
            savings_rate,
        }
    }
}

impl Default for HighFrequencySmallDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SavingsDetector for HighFrequencySmallDetector {
    fn kind(&self) -> OpportunityKind {
        OpportunityKind::HighFrequencySmall
    }

    fn name(&self) -> &'static str {
        "High-Frequency Small Purchases"
    }

    fn detect(&self, transactions: &[&Transaction]) -> Vec<SavingsOpportunity> {
        let small: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.is_outflow() && t.amount.abs() < self.small_threshold)
            .copied()
            .collect();

        let mut opportunities = Vec::new();
        for (category, purchases) in outflows_by_category(&small) {
            if purchases.len() < self.min_count {
                continue;
            }

            let total: f64 = purchases.iter().map(|t| t.amount.abs()).sum();
            let potential = total * self.savings_rate;

            let opportunity = SavingsOpportunity::new(
                OpportunityKind::HighFrequencySmall,
                category.clone(),
                format!(
                    "{} purchases under ${:.0} in {} add up to ${:.2}",
                    purchases.len(),
                    self.small_threshold,
                    category,
                    total
                ),
                potential,
                Confidence::Medium,
            )
            .with_recommendation(format!("Set a weekly limit for {}", category))
            .with_recommendation("Batch small purchases into planned trips")
            .with_recommendation("Track each purchase for a month to spot habits")
            .with_transactions(owned(&purchases));

            opportunities.push(opportunity);
        }

        opportunities
    }
}

// =============================================================================
// Unusual spikes
// =============================================================================

/// Flags a category's single largest purchase when it dwarfs the category mean
pub struct UnusualSpikeDetector {
    /// Minimum outflows in a category before spikes are considered
    min_count: usize,
    /// Max must exceed this multiple of the mean
    multiplier: f64,
}

impl UnusualSpikeDetector {
    pub fn new() -> Self {
        Self {
            min_count: 5,
            multiplier: 3.0,
        }
    }

    pub fn with_thresholds(min_count: usize, multiplier: f64) -> Self {
        Self {
            min_count,
            multiplier,
        }
    }
}

impl Default for UnusualSpikeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SavingsDetector for UnusualSpikeDetector {
    fn kind(&self) -> OpportunityKind {
        OpportunityKind::UnusualSpike
    }

    fn name(&self) -> &'static str {
        "Unusual Spike"
    }

    fn detect(&self, transactions: &[&Transaction]) -> Vec<SavingsOpportunity> {
        let mut opportunities = Vec::new();

        for (category, outflows) in outflows_by_category(transactions) {
            if outflows.len() < self.min_count {
                continue;
            }

            let amounts: Vec<f64> = outflows.iter().map(|t| t.amount.abs()).collect();
            let avg = mean(&amounts);

            // First transaction wins when several share the maximum
            let mut largest = outflows[0];
            for tx in &outflows[1..] {
                if tx.amount.abs() > largest.amount.abs() {
                    largest = tx;
                }
            }
            let max = largest.amount.abs();

            if max <= self.multiplier * avg {
                continue;
            }

            let who = largest.payee_name.as_deref().unwrap_or("an unknown payee");
            let opportunity = SavingsOpportunity::new(
                OpportunityKind::UnusualSpike,
                category.clone(),
                format!(
                    "${:.2} at {} on {} is {:.1}x your usual {} purchase (${:.2})",
                    max,
                    who,
                    largest.date,
                    if avg > 0.0 { max / avg } else { 0.0 },
                    category,
                    avg
                ),
                max - avg,
                Confidence::Low,
            )
            .with_recommendation("Confirm this purchase was planned")
            .with_recommendation(format!(
                "Set aside money for large {} expenses ahead of time",
                category
            ))
            .with_transactions(vec![largest.clone()]);

            opportunities.push(opportunity);
        }

        opportunities
    }
}

// =============================================================================
// Category overspend
// =============================================================================

/// Compares category spending with budgeted amounts
///
/// The analyzer receives no budget data, so this never reports anything.
pub struct CategoryOverspendDetector;

impl CategoryOverspendDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CategoryOverspendDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SavingsDetector for CategoryOverspendDetector {
    fn kind(&self) -> OpportunityKind {
        OpportunityKind::CategoryOverspend
    }

    fn name(&self) -> &'static str {
        "Category Overspend"
    }

    fn detect(&self, _transactions: &[&Transaction]) -> Vec<SavingsOpportunity> {
        Vec::new()
    }
}
