pub mod loader;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use loader::{load_datasets, DataSource, DataSources};

/// Which way an interaction travelled relative to the support team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent by a customer to the support account.
    Inbound,
    /// Sent by the support account.
    Outbound,
}

impl Direction {
    pub fn from_inbound_flag(inbound: bool) -> Self {
        if inbound {
            Direction::Inbound
        } else {
            Direction::Outbound
        }
    }

    /// Speaker label used when quoting the interaction back to the model.
    pub fn speaker(&self) -> &'static str {
        match self {
            Direction::Inbound => "Customer",
            Direction::Outbound => "Amazon",
        }
    }
}

/// One row of the interaction log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionRecord {
    pub tweet_id: u64,
    pub author_id: String,
    pub direction: Direction,
    /// Kept verbatim; the log's timestamp format is rendered as-is.
    pub created_at: String,
    pub text: String,
    pub response_tweet_id: Option<String>,
    pub in_response_to_tweet_id: Option<u64>,
}

/// Aggregate polarity counts for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentAggregate {
    pub average_score: f64,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentPeriod {
    /// The key exactly as it appeared in the source document, e.g. `2017-10`.
    pub key: String,
    /// First day of the period, used for chronological ordering.
    pub starts_on: NaiveDate,
    #[serde(flatten)]
    pub aggregate: SentimentAggregate,
}

impl SentimentPeriod {
    /// Parses a period key of the form `YYYY-MM` or `YYYY-MM-DD`.
    pub fn parse_key(key: &str) -> Option<NaiveDate> {
        let key = key.trim();
        NaiveDate::parse_from_str(key, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d"))
            .ok()
    }
}

/// Identifiers in the report are sometimes numbers and sometimes strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// An issue or recommendation from the analysis report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    pub id: ItemId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub timestamp: String,
    pub issues: Vec<ReportItem>,
    pub recommendations: Vec<ReportItem>,
}

/// The three datasets, loaded together and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Datasets {
    pub interactions: Vec<InteractionRecord>,
    /// Source order; consumers sort by `starts_on` when chronology matters.
    pub sentiment: Vec<SentimentPeriod>,
    pub report: AnalysisReport,
}

impl Datasets {
    /// Sentiment periods from earliest to latest.
    pub fn sentiment_chronological(&self) -> Vec<&SentimentPeriod> {
        let mut periods: Vec<&SentimentPeriod> = self.sentiment.iter().collect();
        periods.sort_by(|a, b| a.starts_on.cmp(&b.starts_on).then_with(|| a.key.cmp(&b.key)));
        periods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_accepts_month_and_day_forms() {
        assert_eq!(
            SentimentPeriod::parse_key("2017-10"),
            NaiveDate::from_ymd_opt(2017, 10, 1)
        );
        assert_eq!(
            SentimentPeriod::parse_key("2017-10-15"),
            NaiveDate::from_ymd_opt(2017, 10, 15)
        );
        assert_eq!(SentimentPeriod::parse_key("October"), None);
    }

    #[test]
    fn direction_maps_to_speaker() {
        assert_eq!(Direction::from_inbound_flag(true).speaker(), "Customer");
        assert_eq!(Direction::from_inbound_flag(false).speaker(), "Amazon");
    }

    #[test]
    fn item_id_displays_both_forms() {
        assert_eq!(ItemId::Number(7).to_string(), "7");
        assert_eq!(ItemId::Text("issue-a".into()).to_string(), "issue-a");
    }
}
