//! Domain models for Tally
//!
//! Every type here is a plain value handed between pipeline stages and on to
//! presentation layers. Nothing holds a back-reference to its producer; the
//! only borrowed field is [`AnomalyRecord::transaction`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A financial transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    /// Free text, not used by analytics
    pub description: String,
    pub category: String,
    /// Negative = expense, positive = income
    pub amount: f64,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        category: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            category: category.into(),
            amount,
        }
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }

    pub fn is_income(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }
}

/// A calendar month, ordered chronologically and rendered as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` unless `month` is in 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month immediately after this one
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Number of months from `self` to `other` (negative if `other` is earlier)
    pub fn months_until(&self, other: YearMonth) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }

    pub fn first_day(&self) -> NaiveDate {
        // year/month are validated on construction, day 1 always exists
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Abbreviated month name ("Jan", "Feb", ...)
    pub fn short_name(&self) -> String {
        self.first_day().format("%b").to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidInput(format!("Invalid month '{}' (use YYYY-MM)", s));

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// One month's summarized totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub month: YearMonth,
    pub income_total: f64,
    /// Positive magnitude of all expenses in the month
    pub expense_total: f64,
    /// Expense magnitude per normalized category
    pub category_expense_totals: BTreeMap<String, f64>,
    pub transaction_count: usize,
}

impl MonthlyAggregate {
    pub fn net(&self) -> f64 {
        self.income_total - self.expense_total
    }
}

/// A single value of a monthly series (e.g. total expenses for a month)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyValue {
    pub month: YearMonth,
    pub value: f64,
}

impl MonthlyValue {
    pub fn new(month: YearMonth, value: f64) -> Self {
        Self { month, value }
    }
}

/// Months selected for a KPI or report computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Period {
    /// Every month in the dataset
    #[default]
    All,
    Month { month: YearMonth },
    /// Inclusive contiguous range
    Range { start: YearMonth, end: YearMonth },
}

impl Period {
    pub fn month(month: YearMonth) -> Self {
        Period::Month { month }
    }

    pub fn range(start: YearMonth, end: YearMonth) -> Self {
        Period::Range { start, end }
    }

    /// Reject ranges whose start is after their end
    pub fn validate(&self) -> Result<()> {
        match self {
            Period::Range { start, end } if start > end => Err(Error::InvalidInput(format!(
                "Period start {} is after end {}",
                start, end
            ))),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, month: YearMonth) -> bool {
        match self {
            Period::All => true,
            Period::Month { month: m } => *m == month,
            Period::Range { start, end } => *start <= month && month <= *end,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::All => write!(f, "all months"),
            Period::Month { month } => write!(f, "{}", month),
            Period::Range { start, end } => write!(f, "{} to {}", start, end),
        }
    }
}

/// Savings as a percentage of income, or an explicit marker when income is zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SavingsRate {
    Percent(f64),
    Undefined,
}

impl SavingsRate {
    /// The percentage, or [`Error::UndefinedRate`] for the undefined marker
    pub fn percent(&self) -> Result<f64> {
        match self {
            SavingsRate::Percent(p) => Ok(*p),
            SavingsRate::Undefined => Err(Error::UndefinedRate),
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, SavingsRate::Percent(_))
    }
}

impl fmt::Display for SavingsRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SavingsRate::Percent(p) => write!(f, "{:.1}%", p),
            SavingsRate::Undefined => write!(f, "n/a"),
        }
    }
}

/// Key performance indicators for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSet {
    pub period: Period,
    /// Number of months with data inside the period
    pub months: usize,
    pub income: f64,
    pub expenses: f64,
    /// Always exactly `income - expenses`
    pub savings: f64,
    pub savings_rate: SavingsRate,
}

impl KpiSet {
    /// Per-month averages of income, expenses and savings. The savings rate is
    /// unchanged by averaging.
    pub fn monthly_average(&self) -> KpiSet {
        if self.months == 0 {
            return self.clone();
        }
        let n = self.months as f64;
        let income = self.income / n;
        let expenses = self.expenses / n;
        KpiSet {
            period: self.period,
            months: self.months,
            income,
            expenses,
            savings: income - expenses,
            savings_rate: self.savings_rate,
        }
    }
}

/// Anomaly scoring method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMethod {
    /// Standard-score deviation from the baseline mean
    #[default]
    ZScore,
    /// Path-length based isolation forest
    IsolationForest,
    /// Isolation forest for large scopes, z-score otherwise
    Auto,
}

impl AnomalyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZScore => "zscore",
            Self::IsolationForest => "isolation_forest",
            Self::Auto => "auto",
        }
    }
}

impl FromStr for AnomalyMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zscore" | "z-score" | "z_score" => Ok(Self::ZScore),
            "isolation_forest" | "isolation-forest" | "isolation" => Ok(Self::IsolationForest),
            "auto" => Ok(Self::Auto),
            _ => Err(format!(
                "Unknown anomaly method: {} (valid: zscore, isolation, auto)",
                s
            )),
        }
    }
}

impl fmt::Display for AnomalyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score for one evaluated transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord<'a> {
    pub transaction: &'a Transaction,
    /// Signed deviation; larger magnitude = more anomalous
    pub score: f64,
    /// Scorer that actually produced this record
    pub method: AnomalyMethod,
    pub flagged: bool,
}

/// One forecast month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: YearMonth,
    pub predicted_expense: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

impl ForecastPoint {
    pub fn interval_width(&self) -> f64 {
        self.upper_ci - self.lower_ci
    }
}

/// Interpretable spending level of a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendingLevel {
    Low,
    Medium,
    High,
}

impl SpendingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low spending month",
            Self::Medium => "Medium spending month",
            Self::High => "High spending month",
        }
    }
}

impl fmt::Display for SpendingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cluster assignment and level for one month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterLabel {
    pub month: YearMonth,
    /// 0 is the lowest-spending cluster
    pub cluster_id: usize,
    pub level: SpendingLevel,
    pub total_spending: f64,
}
