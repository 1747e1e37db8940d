use super::{
    AnalysisReport, Datasets, Direction, InteractionRecord, ReportItem, SentimentAggregate,
    SentimentPeriod,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Report,
    Sentiment,
    Interactions,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetKind::Report => "analysis report",
            DatasetKind::Sentiment => "sentiment map",
            DatasetKind::Interactions => "interaction log",
        };
        f.write_str(name)
    }
}

/// Failure to produce the dataset group. Always names the source that failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch {dataset} from {location}: {message}")]
    Fetch {
        dataset: DatasetKind,
        location: String,
        message: String,
    },

    #[error("failed to parse {dataset}: {message}")]
    Parse {
        dataset: DatasetKind,
        message: String,
    },
}

impl LoadError {
    pub fn dataset(&self) -> DatasetKind {
        match self {
            LoadError::Fetch { dataset, .. } | LoadError::Parse { dataset, .. } => *dataset,
        }
    }

    fn parse(dataset: DatasetKind, message: impl fmt::Display) -> Self {
        LoadError::Parse {
            dataset,
            message: message.to_string(),
        }
    }
}

/// Where a dataset lives: a local file or an HTTP(S) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl DataSource {
    pub fn from_location(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            DataSource::Url(location.to_string())
        } else {
            DataSource::File(PathBuf::from(location))
        }
    }

    pub fn location(&self) -> String {
        match self {
            DataSource::File(path) => path.display().to_string(),
            DataSource::Url(url) => url.clone(),
        }
    }

    async fn fetch(
        &self,
        dataset: DatasetKind,
        client: &reqwest::Client,
    ) -> Result<String, LoadError> {
        let fetch_err = |message: String| LoadError::Fetch {
            dataset,
            location: self.location(),
            message,
        };

        debug!("Fetching {} from {}", dataset, self.location());

        match self {
            DataSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| fetch_err(e.to_string())),
            DataSource::Url(url) => {
                let response = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| fetch_err(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(fetch_err(format!("HTTP status {}", response.status())));
                }

                response.text().await.map_err(|e| fetch_err(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataSources {
    pub report: DataSource,
    pub sentiment: DataSource,
    pub interactions: DataSource,
}

/// Fetches and parses all three datasets concurrently.
/// Either every dataset is returned or the first failure is.
pub async fn load_datasets(
    sources: &DataSources,
    client: &reqwest::Client,
) -> Result<Datasets, LoadError> {
    let (report, sentiment, interactions) = tokio::try_join!(
        async {
            let body = sources.report.fetch(DatasetKind::Report, client).await?;
            parse_report(&body)
        },
        async {
            let body = sources
                .sentiment
                .fetch(DatasetKind::Sentiment, client)
                .await?;
            parse_sentiment(&body)
        },
        async {
            let body = sources
                .interactions
                .fetch(DatasetKind::Interactions, client)
                .await?;
            // The log can be large, keep the parse off the async workers
            task::spawn_blocking(move || parse_interactions(&body))
                .await
                .map_err(|e| LoadError::parse(DatasetKind::Interactions, e))?
        },
    )?;

    info!(
        "Loaded datasets: {} interactions, {} sentiment periods, {} issues, {} recommendations",
        interactions.len(),
        sentiment.len(),
        report.issues.len(),
        report.recommendations.len()
    );

    Ok(Datasets {
        interactions,
        sentiment,
        report,
    })
}

// -----------------------------------------------------------------------------
// Report
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReportDocument {
    #[serde(rename = "analysisData")]
    analysis_data: ReportBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportBody {
    timestamp: String,
    key_issues: Vec<ReportItem>,
    recommendations: Vec<ReportItem>,
}

pub fn parse_report(body: &str) -> Result<AnalysisReport, LoadError> {
    let document: ReportDocument =
        serde_json::from_str(body).map_err(|e| LoadError::parse(DatasetKind::Report, e))?;

    let ReportBody {
        timestamp,
        key_issues,
        recommendations,
    } = document.analysis_data;

    Ok(AnalysisReport {
        timestamp,
        issues: key_issues,
        recommendations,
    })
}

// -----------------------------------------------------------------------------
// Sentiment
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SentimentDocument {
    monthly_sentiment: BTreeMap<String, SentimentAggregate>,
}

pub fn parse_sentiment(body: &str) -> Result<Vec<SentimentPeriod>, LoadError> {
    let document: SentimentDocument =
        serde_json::from_str(body).map_err(|e| LoadError::parse(DatasetKind::Sentiment, e))?;

    document
        .monthly_sentiment
        .into_iter()
        .map(|(key, aggregate)| {
            let starts_on = SentimentPeriod::parse_key(&key).ok_or_else(|| {
                LoadError::parse(
                    DatasetKind::Sentiment,
                    format!("period key {:?} is not a YYYY-MM date", key),
                )
            })?;
            Ok(SentimentPeriod {
                key,
                starts_on,
                aggregate,
            })
        })
        .collect()
}

// -----------------------------------------------------------------------------
// Interaction log
// -----------------------------------------------------------------------------

/// Column positions resolved from the header row.
struct Columns {
    tweet_id: usize,
    author_id: usize,
    inbound: usize,
    created_at: usize,
    text: usize,
    response_tweet_id: Option<usize>,
    in_response_to_tweet_id: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                LoadError::parse(
                    DatasetKind::Interactions,
                    format!("missing required column {:?}", name),
                )
            })
        };

        Ok(Self {
            tweet_id: require("tweet_id")?,
            author_id: require("author_id")?,
            inbound: require("inbound")?,
            created_at: require("created_at")?,
            text: require("text")?,
            response_tweet_id: find("response_tweet_id"),
            in_response_to_tweet_id: find("in_response_to_tweet_id"),
        })
    }

    fn record(&self, row: &csv::StringRecord, line: u64) -> Result<InteractionRecord, LoadError> {
        let row_err = |message: String| {
            LoadError::parse(DatasetKind::Interactions, format!("line {}: {}", line, message))
        };
        let field = |index: usize| row.get(index).unwrap_or("");
        let optional = |index: Option<usize>| {
            index
                .map(field)
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let tweet_id = parse_numeric_id(field(self.tweet_id))
            .ok_or_else(|| row_err(format!("tweet_id {:?} is not numeric", field(self.tweet_id))))?;

        let inbound = parse_flag(field(self.inbound))
            .ok_or_else(|| row_err(format!("inbound {:?} is not a boolean", field(self.inbound))))?;

        let in_response_to_tweet_id = match optional(self.in_response_to_tweet_id) {
            Some(raw) => Some(parse_numeric_id(raw).ok_or_else(|| {
                row_err(format!("in_response_to_tweet_id {:?} is not numeric", raw))
            })?),
            None => None,
        };

        Ok(InteractionRecord {
            tweet_id,
            author_id: field(self.author_id).trim().to_string(),
            direction: Direction::from_inbound_flag(inbound),
            created_at: field(self.created_at).trim().to_string(),
            text: field(self.text).to_string(),
            response_tweet_id: optional(self.response_tweet_id).map(str::to_string),
            in_response_to_tweet_id,
        })
    }
}

/// Parses the delimited interaction log. The header row names the columns;
/// blank rows are skipped.
pub fn parse_interactions(body: &str) -> Result<Vec<InteractionRecord>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| LoadError::parse(DatasetKind::Interactions, e))?
        .clone();
    let columns = Columns::resolve(&headers)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| LoadError::parse(DatasetKind::Interactions, e))?;
        if row.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        records.push(columns.record(&row, line)?);
    }

    Ok(records)
}

/// Accepts plain integers and integers written with a zero fraction,
/// such as `119237.0`.
fn parse_numeric_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let digits = match raw.split_once('.') {
        Some((int, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => int,
        Some(_) => return None,
        None => raw,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
