use crate::dataset::{Datasets, InteractionRecord, ReportItem, SentimentPeriod};

/// Caps applied while selecting context. Tunable, not load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimits {
    /// Matching interactions kept, first-N in log order.
    pub max_interactions: usize,
    /// Most recent sentiment periods quoted.
    pub recent_periods: usize,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_interactions: 5,
            recent_periods: 3,
        }
    }
}

/// Earliest, latest and trailing periods of the sentiment series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SentimentSummary<'a> {
    pub earliest: Option<&'a SentimentPeriod>,
    pub latest: Option<&'a SentimentPeriod>,
    /// Chronological, oldest first.
    pub recent: Vec<&'a SentimentPeriod>,
}

/// The subset of each dataset relevant to one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    pub interactions: Vec<&'a InteractionRecord>,
    /// Size of the whole interaction log, not of the matches.
    pub total_interactions: usize,
    pub issues: Vec<&'a ReportItem>,
    pub recommendations: Vec<&'a ReportItem>,
    pub sentiment: SentimentSummary<'a>,
}

/// Lower-cased whitespace-separated tokens of the query.
pub fn tokenize(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

fn contains_any(haystack: &str, tokens: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    tokens.iter().any(|token| haystack.contains(token.as_str()))
}

fn item_matches(item: &ReportItem, tokens: &[String]) -> bool {
    contains_any(&item.title, tokens) || contains_any(&item.description, tokens)
}

pub fn select<'a>(query: &str, datasets: &'a Datasets, limits: SelectionLimits) -> Selection<'a> {
    let tokens = tokenize(query);

    let interactions = datasets
        .interactions
        .iter()
        .filter(|record| contains_any(&record.text, &tokens))
        .take(limits.max_interactions)
        .collect();

    let issues = datasets
        .report
        .issues
        .iter()
        .filter(|item| item_matches(item, &tokens))
        .collect();

    let recommendations = datasets
        .report
        .recommendations
        .iter()
        .filter(|item| item_matches(item, &tokens))
        .collect();

    Selection {
        interactions,
        total_interactions: datasets.interactions.len(),
        issues,
        recommendations,
        sentiment: summarize_sentiment(datasets, limits.recent_periods),
    }
}

/// Sentiment context is always included and never filtered by the query.
pub fn summarize_sentiment(datasets: &Datasets, recent_periods: usize) -> SentimentSummary<'_> {
    let periods = datasets.sentiment_chronological();
    let recent_start = periods.len().saturating_sub(recent_periods);

    SentimentSummary {
        earliest: periods.first().copied(),
        latest: periods.last().copied(),
        recent: periods[recent_start..].to_vec(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dataset::{
        AnalysisReport, Direction, ItemId, SentimentAggregate, SentimentPeriod,
    };

    pub(crate) fn record(id: u64, inbound: bool, created_at: &str, text: &str) -> InteractionRecord {
        InteractionRecord {
            tweet_id: id,
            author_id: format!("author{}", id),
            direction: Direction::from_inbound_flag(inbound),
            created_at: created_at.to_string(),
            text: text.to_string(),
            response_tweet_id: None,
            in_response_to_tweet_id: None,
        }
    }

    pub(crate) fn period(key: &str, score: f64) -> SentimentPeriod {
        SentimentPeriod {
            key: key.to_string(),
            starts_on: SentimentPeriod::parse_key(key).expect("valid key"),
            aggregate: SentimentAggregate {
                average_score: score,
                positive: 3,
                negative: 2,
                neutral: 1,
            },
        }
    }

    pub(crate) fn item(id: i64, title: &str, description: &str) -> ReportItem {
        ReportItem {
            id: ItemId::Number(id),
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    pub(crate) fn sample_datasets() -> Datasets {
        Datasets {
            interactions: vec![
                record(1, true, "T1", "Please refund my order"),
                record(2, false, "T2", "We have issued your REFUND"),
                record(3, true, "T3", "My package never arrived"),
            ],
            sentiment: vec![
                period("2020-01", 0.1),
                period("2020-03", 0.3),
                period("2020-02", 0.2),
            ],
            report: AnalysisReport {
                timestamp: "2024-03-01".to_string(),
                issues: vec![
                    item(1, "Refund delays", "Refunds take weeks"),
                    item(2, "Lost packages", "Deliveries go missing"),
                ],
                recommendations: vec![item(1, "Faster payouts", "Speed up refund processing")],
            },
        }
    }

    #[test]
    fn tokenize_lowercases_and_drops_blanks() {
        assert_eq!(tokenize("  Refund  ORDER "), vec!["refund", "order"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn matches_any_token_case_insensitively() {
        let datasets = sample_datasets();
        let selection = select("REFUND", &datasets, SelectionLimits::default());

        let ids: Vec<u64> = selection.interactions.iter().map(|r| r.tweet_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(selection.total_interactions, 3);
        assert_eq!(selection.issues.len(), 1);
        assert_eq!(selection.recommendations.len(), 1);
    }

    #[test]
    fn tokens_are_or_combined() {
        let datasets = sample_datasets();
        let selection = select("package refund", &datasets, SelectionLimits::default());
        assert_eq!(selection.interactions.len(), 3);
        assert_eq!(selection.issues.len(), 2);
    }

    #[test]
    fn interaction_matches_keep_first_n_in_log_order() {
        let mut datasets = sample_datasets();
        datasets.interactions = (1..=8)
            .map(|i| record(i, true, "T", &format!("refund request {}", i)))
            .collect();

        let selection = select("refund", &datasets, SelectionLimits::default());
        let ids: Vec<u64> = selection.interactions.iter().map(|r| r.tweet_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let limits = SelectionLimits {
            max_interactions: 2,
            ..SelectionLimits::default()
        };
        assert_eq!(select("refund", &datasets, limits).interactions.len(), 2);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let datasets = sample_datasets();
        let selection = select("", &datasets, SelectionLimits::default());
        assert!(selection.interactions.is_empty());
        assert!(selection.issues.is_empty());
        assert!(selection.recommendations.is_empty());
        assert!(selection.sentiment.latest.is_some());
    }

    #[test]
    fn sentiment_summary_ignores_the_query() {
        let datasets = sample_datasets();
        let limits = SelectionLimits::default();
        let baseline = select("refund", &datasets, limits).sentiment;
        for query in ["", "package", "zzz nothing matches", "REFUND order"] {
            assert_eq!(select(query, &datasets, limits).sentiment, baseline);
        }
    }

    #[test]
    fn sentiment_summary_is_chronological_regardless_of_key_order() {
        let datasets = sample_datasets();
        let summary = summarize_sentiment(&datasets, 3);
        assert_eq!(summary.earliest.map(|p| p.key.as_str()), Some("2020-01"));
        assert_eq!(summary.latest.map(|p| p.key.as_str()), Some("2020-03"));

        let recent: Vec<&str> = summary.recent.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(recent, vec!["2020-01", "2020-02", "2020-03"]);

        let trailing = summarize_sentiment(&datasets, 2);
        let recent: Vec<&str> = trailing.recent.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(recent, vec!["2020-02", "2020-03"]);
    }

    #[test]
    fn empty_datasets_select_nothing() {
        let datasets = Datasets {
            interactions: Vec::new(),
            sentiment: Vec::new(),
            report: AnalysisReport {
                timestamp: String::new(),
                issues: Vec::new(),
                recommendations: Vec::new(),
            },
        };
        let selection = select("refund", &datasets, SelectionLimits::default());
        assert!(selection.interactions.is_empty());
        assert_eq!(selection.sentiment, SentimentSummary::default());
    }
}
