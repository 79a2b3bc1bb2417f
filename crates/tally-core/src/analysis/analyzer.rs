//! Analyzer - turns a transaction list into a financial insights report

use std::collections::BTreeMap;

use crate::models::{FilterConfig, Transaction};

use super::savings::{
    mean, outflows_by_category, CategoryOverspendDetector, HighFrequencySmallDetector,
    RecurringSubscriptionDetector, SavingsDetector, UnusualSpikeDetector,
};
use super::types::{
    FinancialInsights, MonthlyTrend, OpportunityKind, SavingsOpportunity, SpendingPattern,
    TrendDirection,
};

/// Relative change beyond which a category trend is no longer stable
const TREND_THRESHOLD: f64 = 0.10;

/// Outflows above this multiple of the mean outflow are outliers
const OUTLIER_MULTIPLIER: f64 = 5.0;

/// Runs the statistics pass and every registered savings detector
pub struct Analyzer {
    detectors: Vec<Box<dyn SavingsDetector>>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Create an analyzer with the built-in detectors
    pub fn new() -> Self {
        let mut analyzer = Self { detectors: vec![] };

        analyzer.register(Box::new(RecurringSubscriptionDetector::new()));
        analyzer.register(Box::new(HighFrequencySmallDetector::new()));
        analyzer.register(Box::new(CategoryOverspendDetector::new()));
        analyzer.register(Box::new(UnusualSpikeDetector::new()));

        analyzer
    }

    /// Register a savings detector
    pub fn register(&mut self, detector: Box<dyn SavingsDetector>) {
        self.detectors.push(detector);
    }

    /// Kinds of opportunity the registered detectors can emit
    pub fn detector_kinds(&self) -> Vec<OpportunityKind> {
        self.detectors.iter().map(|d| d.kind()).collect()
    }

    /// Analyze transactions, optionally narrowed by a filter
    ///
    /// Deleted transactions are dropped first, then every present filter
    /// field is applied. Never fails; empty input produces zeroed totals.
    pub fn analyze(
        &self,
        transactions: &[Transaction],
        filter: Option<&FilterConfig>,
    ) -> FinancialInsights {
        let kept: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| !t.deleted)
            .filter(|t| filter.map_or(true, |f| f.matches(t)))
            .collect();

        let (total_spent, total_income) = totals(&kept);

        let mut insights = FinancialInsights {
            total_spent,
            total_income,
            net_cash_flow: total_income - total_spent,
            spending_patterns: spending_patterns(&kept, total_spent),
            savings_opportunities: self.detect_opportunities(&kept),
            budget_analysis: Vec::new(),
            outliers: outliers(&kept),
            monthly_trends: monthly_trends(&kept),
        };

        // Stable sort keeps detector order on equal potential savings
        insights.savings_opportunities.sort_by(|a, b| {
            b.potential_savings
                .partial_cmp(&a.potential_savings)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(
            input = transactions.len(),
            kept = kept.len(),
            patterns = insights.spending_patterns.len(),
            opportunities = insights.savings_opportunities.len(),
            outliers = insights.outliers.len(),
            "Analysis complete"
        );

        insights
    }

    fn detect_opportunities(&self, transactions: &[&Transaction]) -> Vec<SavingsOpportunity> {
        let mut all = Vec::new();
        for detector in &self.detectors {
            let found = detector.detect(transactions);
            tracing::debug!(
                detector = detector.kind().as_str(),
                count = found.len(),
                "Detector complete"
            );
            all.extend(found);
        }
        all
    }
}

/// Analyze with the built-in detectors
pub fn analyze(transactions: &[Transaction], filter: Option<&FilterConfig>) -> FinancialInsights {
    Analyzer::new().analyze(transactions, filter)
}

/// (spent, income) where spent is the absolute sum of outflows
fn totals(transactions: &[&Transaction]) -> (f64, f64) {
    let mut spent = 0.0;
    let mut income = 0.0;
    for tx in transactions {
        if tx.is_outflow() {
            spent += tx.amount.abs();
        } else if tx.is_inflow() {
            income += tx.amount;
        }
    }
    (spent, income)
}

/// Classify a series of ascending monthly totals
///
/// Fewer than two months, or a zero first month, is stable.
pub fn classify_trend(monthly_totals: &[f64]) -> TrendDirection {
    if monthly_totals.len() < 2 {
        return TrendDirection::Stable;
    }
    let first = monthly_totals[0];
    let last = monthly_totals[monthly_totals.len() - 1];
    if first == 0.0 {
        return TrendDirection::Stable;
    }

    let change = (last - first) / first;
    if change > TREND_THRESHOLD {
        TrendDirection::Increasing
    } else if change < -TREND_THRESHOLD {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

fn spending_patterns(transactions: &[&Transaction], total_spent: f64) -> Vec<SpendingPattern> {
    let mut patterns: Vec<SpendingPattern> = outflows_by_category(transactions)
        .into_iter()
        .map(|(category, outflows)| {
            let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
            for tx in &outflows {
                *by_month.entry(tx.month_key()).or_default() += tx.amount.abs();
            }

            let total: f64 = by_month.values().sum();
            let count = outflows.len();
            let monthly: Vec<f64> = by_month.values().copied().collect();

            SpendingPattern {
                category,
                total_amount: total,
                transaction_count: count,
                average_amount: total / count as f64,
                monthly_average: total / by_month.len() as f64,
                trend: classify_trend(&monthly),
                percentage_of_total: if total_spent > 0.0 {
                    total / total_spent * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    // Groups come out alphabetically; a stable sort keeps that on ties
    patterns.sort_by(|a, b| {
        b.total_amount
            .partial_cmp(&a.total_amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    patterns
}

fn outliers(transactions: &[&Transaction]) -> Vec<Transaction> {
    let amounts: Vec<f64> = transactions
        .iter()
        .filter(|t| t.is_outflow())
        .map(|t| t.amount.abs())
        .collect();
    if amounts.is_empty() {
        return Vec::new();
    }

    let threshold = OUTLIER_MULTIPLIER * mean(&amounts);
    transactions
        .iter()
        .filter(|t| t.is_outflow() && t.amount.abs() > threshold)
        .map(|t| (*t).clone())
        .collect()
}

fn monthly_trends(transactions: &[&Transaction]) -> Vec<MonthlyTrend> {
    let mut months: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        months.entry(tx.month_key()).or_default().push(*tx);
    }

    months
        .into_iter()
        .map(|(month, txs)| {
            let (spent, income) = totals(&txs);
            MonthlyTrend {
                month,
                spent,
                income,
                net_flow: income - spent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::Confidence;
    use crate::models::CREDIT_CARD_PAYMENT;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(id: &str, d: NaiveDate, amount: f64) -> Transaction {
        Transaction::new(id, d, amount, "Checking")
    }

    fn mixed_fixture() -> Vec<Transaction> {
        vec![
            tx("1", date(2024, 1, 3), -50.0).with_category("Groceries"),
            tx("2", date(2024, 1, 9), -12.5).with_category("Dining"),
            tx("3", date(2024, 1, 15), 2500.0).with_category("Salary"),
            tx("4", date(2024, 2, 2), -75.25).with_category("Groceries"),
            tx("5", date(2024, 2, 20), -200.0).with_payee("Transfer : Visa"),
            tx("6", date(2024, 2, 21), -8.0).with_payee("Corner Shop"),
            tx("7", date(2024, 3, 1), -40.0)
                .with_category("Dining")
                .mark_deleted(),
            tx("8", date(2024, 3, 5), 30.0).with_category("Refunds"),
        ]
    }

    #[test]
    fn test_empty_input() {
        let insights = analyze(&[], None);
        assert_eq!(insights.total_spent, 0.0);
        assert_eq!(insights.total_income, 0.0);
        assert_eq!(insights.net_cash_flow, 0.0);
        assert!(insights.spending_patterns.is_empty());
        assert!(insights.savings_opportunities.is_empty());
        assert!(insights.budget_analysis.is_empty());
        assert!(insights.outliers.is_empty());
        assert!(insights.monthly_trends.is_empty());
    }

    #[test]
    fn test_groceries_scenario() {
        let d = date(2024, 1, 10);
        let txs = vec![
            tx("1", d, -50.0).with_category("Groceries"),
            tx("2", d, -30.0).with_category("Groceries"),
            tx("3", d, 1000.0).with_category("Income"),
        ];

        let insights = analyze(&txs, None);
        assert_eq!(insights.total_spent, 80.0);
        assert_eq!(insights.total_income, 1000.0);
        assert_eq!(insights.net_cash_flow, 920.0);
        assert_eq!(insights.spending_patterns.len(), 1);

        let groceries = &insights.spending_patterns[0];
        assert_eq!(groceries.category, "Groceries");
        assert_eq!(groceries.transaction_count, 2);
        assert_eq!(groceries.average_amount, 40.0);
        assert_eq!(groceries.monthly_average, 80.0);
        assert_eq!(groceries.percentage_of_total, 100.0);
        assert_eq!(groceries.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_blank_category_uses_label_rules() {
        let txs = vec![
            tx("1", date(2024, 1, 5), -200.0)
                .with_payee("Transfer : Visa")
                .with_category(""),
            tx("2", date(2024, 1, 6), -15.0)
                .with_payee("Shop")
                .with_category(""),
        ];
        let insights = analyze(&txs, None);
        let labels: Vec<&str> = insights
            .spending_patterns
            .iter()
            .map(|p| p.category.as_str())
            .collect();

        assert_eq!(labels, vec![CREDIT_CARD_PAYMENT, "Uncategorized"]);
    }

    #[test]
    fn test_net_cash_flow_identity() {
        let insights = analyze(&mixed_fixture(), None);
        assert_eq!(
            insights.net_cash_flow,
            insights.total_income - insights.total_spent
        );

        let signed: f64 = mixed_fixture()
            .iter()
            .filter(|t| !t.deleted)
            .map(|t| t.amount)
            .sum();
        assert!((insights.net_cash_flow - signed).abs() < 1e-9);
    }

    #[test]
    fn test_pattern_totals_and_percentages() {
        let insights = analyze(&mixed_fixture(), None);

        let pattern_sum: f64 = insights.spending_patterns.iter().map(|p| p.total_amount).sum();
        assert!((pattern_sum - insights.total_spent).abs() < 1e-9);

        let pct_sum: f64 = insights
            .spending_patterns
            .iter()
            .map(|p| p.percentage_of_total)
            .sum();
        assert!((pct_sum - 100.0).abs() < 1e-6);

        // Descending by total
        for pair in insights.spending_patterns.windows(2) {
            assert!(pair[0].total_amount >= pair[1].total_amount);
        }
    }

    #[test]
    fn test_percentages_zero_without_spending() {
        let txs = vec![tx("1", date(2024, 1, 1), 100.0).with_category("Salary")];
        let insights = analyze(&txs, None);
        assert!(insights.spending_patterns.is_empty());
        assert_eq!(insights.total_spent, 0.0);
        assert_eq!(insights.monthly_trends.len(), 1);
        assert_eq!(insights.monthly_trends[0].income, 100.0);
    }

    #[test]
    fn test_deleted_transactions_never_contribute() {
        let with_deleted = analyze(&mixed_fixture(), None);
        let without: Vec<Transaction> = mixed_fixture().into_iter().filter(|t| !t.deleted).collect();
        assert_eq!(with_deleted, analyze(&without, None));

        let only_deleted = vec![tx("x", date(2024, 1, 1), -999.0).mark_deleted()];
        let insights = analyze(&only_deleted, None);
        assert_eq!(insights.total_spent, 0.0);
        assert!(insights.monthly_trends.is_empty());
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let txs = mixed_fixture();
        let first = analyze(&txs, None);
        let second = analyze(&txs, None);
        assert_eq!(first, second);
        // Input untouched
        assert_eq!(txs, mixed_fixture());
    }

    #[test]
    fn test_transfer_label() {
        let insights = analyze(&mixed_fixture(), None);
        let labels: Vec<&str> = insights
            .spending_patterns
            .iter()
            .map(|p| p.category.as_str())
            .collect();
        assert!(labels.contains(&CREDIT_CARD_PAYMENT));
        // Corner Shop is the only uncategorized outflow
        let uncategorized = insights
            .spending_patterns
            .iter()
            .find(|p| p.category == "Uncategorized")
            .unwrap();
        assert_eq!(uncategorized.total_amount, 8.0);
    }

    #[test]
    fn test_pattern_tie_break_alphabetical() {
        let d = date(2024, 1, 1);
        let txs = vec![
            tx("1", d, -10.0).with_category("Zoo"),
            tx("2", d, -10.0).with_category("Art"),
            tx("3", d, -10.0).with_category("Music"),
        ];
        let insights = analyze(&txs, None);
        let order: Vec<&str> = insights
            .spending_patterns
            .iter()
            .map(|p| p.category.as_str())
            .collect();
        assert_eq!(order, vec!["Art", "Music", "Zoo"]);
    }

    #[test]
    fn test_classify_trend() {
        assert_eq!(classify_trend(&[]), TrendDirection::Stable);
        assert_eq!(classify_trend(&[100.0]), TrendDirection::Stable);
        assert_eq!(classify_trend(&[100.0, 111.0]), TrendDirection::Increasing);
        assert_eq!(classify_trend(&[100.0, 89.0]), TrendDirection::Decreasing);
        assert_eq!(classify_trend(&[100.0, 500.0, 105.0]), TrendDirection::Stable);
        assert_eq!(classify_trend(&[100.0, 110.0]), TrendDirection::Stable);
    }

    #[test]
    fn test_classify_trend_zero_first_month() {
        assert_eq!(classify_trend(&[0.0, 50.0]), TrendDirection::Stable);
        assert_eq!(classify_trend(&[0.0, 0.0]), TrendDirection::Stable);
    }

    #[test]
    fn test_trend_and_monthly_average_across_months() {
        let txs = vec![
            tx("1", date(2024, 1, 5), -100.0).with_category("Dining"),
            tx("2", date(2024, 2, 5), -120.0).with_category("Dining"),
            tx("3", date(2024, 3, 5), -150.0).with_category("Dining"),
        ];
        let insights = analyze(&txs, None);
        let dining = &insights.spending_patterns[0];
        assert_eq!(dining.trend, TrendDirection::Increasing);
        assert!((dining.monthly_average - 370.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recurring_scenario() {
        let txs: Vec<Transaction> = (1..=5)
            .map(|m| {
                tx(&format!("s{}", m), date(2024, m, 1), -9.99)
                    .with_payee("StreamCo")
                    .with_category("Subscriptions")
            })
            .collect();

        let insights = analyze(&txs, None);
        let recurring: Vec<&SavingsOpportunity> = insights
            .savings_opportunities
            .iter()
            .filter(|o| o.kind == OpportunityKind::RecurringSubscription)
            .collect();
        assert_eq!(recurring.len(), 1);
        assert!((recurring[0].potential_savings - 119.88).abs() < 1e-9);
        assert_eq!(recurring[0].confidence, Confidence::High);
    }

    #[test]
    fn test_high_frequency_scenario() {
        let amounts = [-3.0, -4.0, -5.0, -3.5, -4.5, -3.25, -4.75, -5.0, -3.0, -4.0, -3.8, -4.2];
        let txs: Vec<Transaction> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| tx(&format!("c{}", i), date(2024, 1, 1 + i as u32), *a).with_category("Coffee"))
            .collect();
        let sum: f64 = amounts.iter().map(|a| a.abs()).sum();

        let insights = analyze(&txs, None);
        let hf: Vec<&SavingsOpportunity> = insights
            .savings_opportunities
            .iter()
            .filter(|o| o.kind == OpportunityKind::HighFrequencySmall)
            .collect();
        assert_eq!(hf.len(), 1);
        assert!((hf[0].potential_savings - 0.30 * sum).abs() < 1e-9);
    }

    #[test]
    fn test_spike_scenario() {
        let amounts = [-10.0, -10.0, -10.0, -10.0, -100.0];
        let txs: Vec<Transaction> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| tx(&format!("d{}", i), date(2024, 1, 1 + i as u32), *a).with_category("Dining"))
            .collect();

        let insights = analyze(&txs, None);
        let spikes: Vec<&SavingsOpportunity> = insights
            .savings_opportunities
            .iter()
            .filter(|o| o.kind == OpportunityKind::UnusualSpike)
            .collect();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].transactions.len(), 1);
        assert_eq!(spikes[0].transactions[0].id, "d4");
        assert_eq!(spikes[0].transactions[0].amount, -100.0);
    }

    #[test]
    fn test_opportunities_sorted_by_potential() {
        let mut txs: Vec<Transaction> = (1..=5)
            .map(|m| {
                tx(&format!("s{}", m), date(2024, m, 1), -15.0)
                    .with_payee("Gym")
                    .with_category("Fitness")
            })
            .collect();
        txs.extend((0..10).map(|i| {
            tx(&format!("c{}", i), date(2024, 1, 1 + i), -4.0)
                .with_payee(format!("Cafe {}", i))
                .with_category("Coffee")
        }));

        let insights = analyze(&txs, None);
        assert!(insights.savings_opportunities.len() >= 2);
        for pair in insights.savings_opportunities.windows(2) {
            assert!(pair[0].potential_savings >= pair[1].potential_savings);
        }
    }

    #[test]
    fn test_outliers() {
        let mut txs: Vec<Transaction> = (0..9)
            .map(|i| tx(&format!("n{}", i), date(2024, 1, 1 + i), -10.0).with_category("Misc"))
            .collect();
        txs.push(tx("big", date(2024, 1, 20), -500.0).with_category("Rent"));
        // Inflows are never outliers
        txs.push(tx("pay", date(2024, 1, 25), 5000.0).with_category("Salary"));

        let insights = analyze(&txs, None);
        assert_eq!(insights.outliers.len(), 1);
        assert_eq!(insights.outliers[0].id, "big");
    }

    #[test]
    fn test_monthly_trends_sorted() {
        let insights = analyze(&mixed_fixture(), None);
        let months: Vec<&str> = insights
            .monthly_trends
            .iter()
            .map(|m| m.month.as_str())
            .collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);

        let jan = &insights.monthly_trends[0];
        assert_eq!(jan.spent, 62.5);
        assert_eq!(jan.income, 2500.0);
        assert_eq!(jan.net_flow, 2437.5);

        // March only has the refund once the deleted row is dropped
        let mar = &insights.monthly_trends[2];
        assert_eq!(mar.spent, 0.0);
        assert_eq!(mar.income, 30.0);
    }

    #[test]
    fn test_filter_applied_before_analysis() {
        let filter = FilterConfig {
            start_date: Some(date(2024, 2, 1)),
            excluded_categories: Some(
                [CREDIT_CARD_PAYMENT.to_string()].into_iter().collect::<HashSet<_>>(),
            ),
            ..Default::default()
        };

        let insights = analyze(&mixed_fixture(), Some(&filter));
        assert_eq!(insights.total_spent, 75.25 + 8.0);
        assert_eq!(insights.total_income, 30.0);
        assert!(insights
            .spending_patterns
            .iter()
            .all(|p| p.category != CREDIT_CARD_PAYMENT));
    }

    #[test]
    fn test_registered_detectors() {
        let kinds = Analyzer::new().detector_kinds();
        assert_eq!(kinds.len(), 4);
        assert!(kinds.contains(&OpportunityKind::CategoryOverspend));
    }
}
