//! Plain-text reports over an insights run

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::FinancialInsights;

/// Which report to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Totals, top categories, top opportunities
    Summary,
    /// Every category, opportunity and outlier
    Detailed,
    /// Savings opportunities with recommendations
    Savings,
    /// Month-by-month cash flow and category trends
    Trends,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Summary => "summary",
            ReportKind::Detailed => "detailed",
            ReportKind::Savings => "savings",
            ReportKind::Trends => "trends",
        }
    }

    pub fn all() -> &'static [ReportKind] {
        &[
            ReportKind::Summary,
            ReportKind::Detailed,
            ReportKind::Savings,
            ReportKind::Trends,
        ]
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(ReportKind::Summary),
            "detailed" => Ok(ReportKind::Detailed),
            "savings" => Ok(ReportKind::Savings),
            "trends" => Ok(ReportKind::Trends),
            _ => Err(format!(
                "Unknown report type: {}. Use: summary, detailed, savings, trends",
                s
            )),
        }
    }
}

/// `$1,234.56`, `-$12.00`
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Render a report
pub fn render_report(kind: ReportKind, insights: &FinancialInsights) -> String {
    let mut out = String::new();
    match kind {
        ReportKind::Summary => {
            write_header(&mut out, "Financial Summary");
            write_totals(&mut out, insights);
            write_categories(&mut out, insights, Some(5));
            write_opportunities(&mut out, insights, Some(3), false);
        }
        ReportKind::Detailed => {
            write_header(&mut out, "Detailed Financial Report");
            write_totals(&mut out, insights);
            write_categories(&mut out, insights, None);
            write_opportunities(&mut out, insights, None, true);
            write_outliers(&mut out, insights);
            write_months(&mut out, insights);
        }
        ReportKind::Savings => {
            write_header(&mut out, "Savings Opportunities");
            out.push_str(&format!(
                "Total potential savings: {}\n\n",
                format_currency(insights.total_potential_savings())
            ));
            write_opportunities(&mut out, insights, None, true);
        }
        ReportKind::Trends => {
            write_header(&mut out, "Spending Trends");
            write_months(&mut out, insights);
            write_category_trends(&mut out, insights);
        }
    }
    out.trim_end().to_string()
}

fn write_header(out: &mut String, title: &str) {
    out.push_str(&format!("{}\n", title));
    out.push_str(&format!("{}\n\n", "=".repeat(title.len())));
}

fn write_totals(out: &mut String, insights: &FinancialInsights) {
    out.push_str(&format!(
        "Income:        {:>14}\n",
        format_currency(insights.total_income)
    ));
    out.push_str(&format!(
        "Spending:      {:>14}\n",
        format_currency(insights.total_spent)
    ));
    out.push_str(&format!(
        "Net cash flow: {:>14}\n\n",
        format_currency(insights.net_cash_flow)
    ));
}

fn write_categories(out: &mut String, insights: &FinancialInsights, limit: Option<usize>) {
    out.push_str("Spending by category:\n");
    if insights.spending_patterns.is_empty() {
        out.push_str("  (no spending)\n\n");
        return;
    }

    let limit = limit.unwrap_or(insights.spending_patterns.len());
    for pattern in insights.spending_patterns.iter().take(limit) {
        out.push_str(&format!(
            "  {:<28} {:>12} {:>6.1}%  {:>3} txns  {}\n",
            pattern.category,
            format_currency(pattern.total_amount),
            pattern.percentage_of_total,
            pattern.transaction_count,
            pattern.trend
        ));
    }
    if insights.spending_patterns.len() > limit {
        out.push_str(&format!(
            "  ... and {} more\n",
            insights.spending_patterns.len() - limit
        ));
    }
    out.push('\n');
}

fn write_opportunities(
    out: &mut String,
    insights: &FinancialInsights,
    limit: Option<usize>,
    with_recommendations: bool,
) {
    out.push_str("Savings opportunities:\n");
    if insights.savings_opportunities.is_empty() {
        out.push_str("  (none found)\n\n");
        return;
    }

    let limit = limit.unwrap_or(insights.savings_opportunities.len());
    for (i, opp) in insights.savings_opportunities.iter().take(limit).enumerate() {
        out.push_str(&format!(
            "  {}. [{}] {} (save ~{}, {} confidence)\n",
            i + 1,
            opp.kind,
            opp.category,
            format_currency(opp.potential_savings),
            opp.confidence
        ));
        out.push_str(&format!("     {}\n", opp.description));
        if with_recommendations {
            for rec in &opp.recommendations {
                out.push_str(&format!("     - {}\n", rec));
            }
        }
    }
    out.push('\n');
}

fn write_outliers(out: &mut String, insights: &FinancialInsights) {
    out.push_str("Unusually large transactions:\n");
    if insights.outliers.is_empty() {
        out.push_str("  (none)\n\n");
        return;
    }
    for tx in &insights.outliers {
        out.push_str(&format!(
            "  {}  {:>12}  {}  ({})\n",
            tx.date,
            format_currency(tx.amount),
            tx.payee_name.as_deref().unwrap_or("-"),
            tx.category_label()
        ));
    }
    out.push('\n');
}

fn write_months(out: &mut String, insights: &FinancialInsights) {
    out.push_str("Monthly cash flow:\n");
    if insights.monthly_trends.is_empty() {
        out.push_str("  (no transactions)\n\n");
        return;
    }
    out.push_str(&format!(
        "  {:<8} {:>14} {:>14} {:>14}\n",
        "Month", "Income", "Spent", "Net"
    ));
    for month in &insights.monthly_trends {
        out.push_str(&format!(
            "  {:<8} {:>14} {:>14} {:>14}\n",
            month.month,
            format_currency(month.income),
            format_currency(month.spent),
            format_currency(month.net_flow)
        ));
    }
    out.push('\n');
}

fn write_category_trends(out: &mut String, insights: &FinancialInsights) {
    out.push_str("Category trends:\n");
    if insights.spending_patterns.is_empty() {
        out.push_str("  (no spending)\n\n");
        return;
    }
    for pattern in &insights.spending_patterns {
        out.push_str(&format!(
            "  {:<28} {:<10} {}/month\n",
            pattern.category,
            pattern.trend,
            format_currency(pattern.monthly_average)
        ));
    }
    out.push('\n');
}
