//! Monthly summary assembly and notification bodies
//!
//! Calendar-window helpers shared by the budget alert evaluator and the
//! monthly report generator, plus the plain-text email rendering and the
//! fixed fallback insights used when the generation model is unavailable.

use chrono::{Datelike, Months, NaiveDate};

use crate::models::{format_cents, MonthlySummary};

/// Fixed insights substituted when the model call fails or returns
/// unusable output. Report delivery never blocks on the model.
pub const FALLBACK_INSIGHTS: [&str; 3] = [
    "Your highest expense category this month might need attention.",
    "Consider setting up a budget for better financial management.",
    "Track your recurring expenses to identify potential savings.",
];

/// Inclusive calendar-month bounds containing `date`
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).expect("day 1 always valid");
    let end = (start + Months::new(1)) - chrono::Days::new(1);
    (start, end)
}

/// Inclusive bounds of the calendar month before the one containing `date`
pub fn prior_month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let this_month_start = date.with_day(1).expect("day 1 always valid");
    let start = this_month_start - Months::new(1);
    (start, this_month_start - chrono::Days::new(1))
}

/// Human month label, e.g. "January 2024"
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

/// Whether two dates fall in different calendar months (the budget alert
/// dedup key: month or year differs)
pub fn is_new_month(last: NaiveDate, now: NaiveDate) -> bool {
    last.month() != now.month() || last.year() != now.year()
}

/// Render the budget-alert email body
pub fn render_budget_alert(
    user_name: &str,
    account_name: &str,
    percentage_used: f64,
    budget_cents: i64,
    total_expenses_cents: i64,
) -> String {
    format!(
        "Hello {},\n\n\
         You've used {:.1}% of your monthly budget.\n\n\
         Budget amount: ${}\n\
         Spent so far: ${}\n\
         Remaining: ${}\n\
         Account: {}\n",
        user_name,
        percentage_used,
        format_cents(budget_cents),
        format_cents(total_expenses_cents),
        format_cents(budget_cents - total_expenses_cents),
        account_name
    )
}

/// Render the monthly-report email body
pub fn render_monthly_report(
    user_name: &str,
    month_label: &str,
    summary: &MonthlySummary,
    insights: &[String],
) -> String {
    let mut body = format!(
        "Hello {},\n\n\
         Here's your financial summary for {}:\n\n\
         Total income: ${}\n\
         Total expenses: ${}\n\
         Net: ${}\n",
        user_name,
        month_label,
        format_cents(summary.total_income_cents),
        format_cents(summary.total_expenses_cents),
        format_cents(summary.net_cents()),
    );

    if !summary.by_category.is_empty() {
        body.push_str("\nExpenses by category:\n");
        for (category, cents) in &summary.by_category {
            body.push_str(&format!("  - {}: ${}\n", category, format_cents(*cents)));
        }
    }

    body.push_str("\nInsights:\n");
    for insight in insights {
        body.push_str(&format!("  * {}\n", insight));
    }

    body
}
