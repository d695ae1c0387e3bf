//! Historical forecast accuracy summaries

use crate::bet::Category;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Monthly accuracy summary for one (city, category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub city: String,
    pub category: Category,
    /// First day of the summarized month
    pub month: NaiveDate,
    /// Mean accuracy in percent
    pub avg_accuracy: f64,
    pub total_predictions: u64,
    #[serde(default)]
    pub min_accuracy: Option<f64>,
    #[serde(default)]
    pub max_accuracy: Option<f64>,
}

/// Source of accuracy summaries
#[async_trait]
pub trait AccuracySource: Send + Sync {
    /// Up to `limit` summaries for (city, category), most recent month first
    async fn recent(
        &self,
        city: &str,
        category: Category,
        limit: usize,
    ) -> anyhow::Result<Vec<AccuracySummary>>;
}

fn select_recent(
    rows: &[AccuracySummary],
    city: &str,
    category: Category,
    limit: usize,
) -> Vec<AccuracySummary> {
    let mut matching: Vec<AccuracySummary> = rows
        .iter()
        .filter(|r| r.category == category && r.city.eq_ignore_ascii_case(city))
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.month.cmp(&a.month));
    matching.truncate(limit);
    matching
}

/// In-memory accuracy store
#[derive(Debug, Default)]
pub struct MemoryAccuracySource {
    rows: RwLock<Vec<AccuracySummary>>,
}

impl MemoryAccuracySource {
    pub fn new(rows: Vec<AccuracySummary>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Insert or replace the summary for its (city, category, month)
    pub async fn record(&self, summary: AccuracySummary) {
        let mut rows = self.rows.write().await;
        rows.retain(|r| {
            !(r.category == summary.category
                && r.month == summary.month
                && r.city.eq_ignore_ascii_case(&summary.city))
        });
        rows.push(summary);
    }
}

#[async_trait]
impl AccuracySource for MemoryAccuracySource {
    async fn recent(
        &self,
        city: &str,
        category: Category,
        limit: usize,
    ) -> anyhow::Result<Vec<AccuracySummary>> {
        let rows = self.rows.read().await;
        Ok(select_recent(&rows, city, category, limit))
    }
}

/// Accuracy summaries read from a JSON array file on every lookup
///
/// A missing file is treated as no history.
#[derive(Debug, Clone)]
pub struct JsonFileAccuracySource {
    path: PathBuf,
}

impl JsonFileAccuracySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AccuracySource for JsonFileAccuracySource {
    async fn recent(
        &self,
        city: &str,
        category: Category,
        limit: usize,
    ) -> anyhow::Result<Vec<AccuracySummary>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let rows: Vec<AccuracySummary> = serde_json::from_str(&content)?;
        Ok(select_recent(&rows, city, category, limit))
    }
}
