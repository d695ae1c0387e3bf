//! Verification audit log
//!
//! Every verification is stored per category with the raw provider payloads.
//! Disputed entries may be overridden by an administrator; the prior value
//! and the reason are kept in an override record on the entry, and on disk
//! overrides are appended as their own records rather than rewriting history.

use super::{average, ResolutionMethod, VerificationReport};
use crate::bet::Category;
use crate::telemetry::{incr_counter, CounterMetric};
use crate::weather::ReadingValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Audit log errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Verification entry {0} not found")]
    NotFound(Uuid),
    #[error("Verification entry {0} is not disputed")]
    NotDisputed(Uuid),
    #[error("Invalid override: {0}")]
    InvalidOverride(String),
    #[error("Audit log IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Audit log JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Prior state and justification of one override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub previous_value: ReadingValue,
    pub previous_method: Option<ResolutionMethod>,
    pub new_value: ReadingValue,
    pub method: ResolutionMethod,
    pub reason: String,
    pub source: String,
    pub overridden_at: DateTime<Utc>,
}

/// One category of one verification call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationLogEntry {
    pub id: Uuid,
    pub city: String,
    pub category: Category,
    pub primary_value: ReadingValue,
    pub secondary_value: ReadingValue,
    pub deviation_percentage: f64,
    pub is_disputed: bool,
    pub resolution_method: Option<ResolutionMethod>,
    pub final_value: ReadingValue,
    pub confidence_score: f64,
    pub all_sources_available: bool,
    pub primary_raw: serde_json::Value,
    #[serde(default)]
    pub secondary_raw: serde_json::Value,
    pub verified_at: DateTime<Utc>,
    #[serde(default)]
    pub overrides: Vec<OverrideRecord>,
}

impl VerificationLogEntry {
    /// One entry per category of a report
    pub fn from_report(report: &VerificationReport) -> Vec<Self> {
        report
            .results
            .iter()
            .map(|r| Self {
                id: Uuid::new_v4(),
                city: report.city.clone(),
                category: r.category,
                primary_value: r.primary_value,
                secondary_value: r.secondary_value,
                deviation_percentage: r.deviation,
                is_disputed: r.is_disputed,
                resolution_method: r.resolution_method,
                final_value: r.final_value,
                confidence_score: r.confidence_score,
                all_sources_available: report.summary.all_sources_available,
                primary_raw: report.primary_raw.clone(),
                secondary_raw: report.secondary_raw.clone().unwrap_or_default(),
                verified_at: report.verified_at,
                overrides: Vec::new(),
            })
            .collect()
    }

    fn apply(&mut self, record: OverrideRecord) {
        self.final_value = record.new_value;
        self.resolution_method = Some(record.method);
        self.is_disputed = false;
        self.overrides.push(record);
    }
}

/// An administrative override of a disputed value
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRequest {
    pub value: ReadingValue,
    pub method: ResolutionMethod,
    pub reason: String,
    /// Who or what requested the override
    pub source: String,
    pub at: DateTime<Utc>,
}

impl OverrideRequest {
    pub fn manual(
        value: ReadingValue,
        reason: impl Into<String>,
        source: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            method: ResolutionMethod::AdminOverride,
            reason: reason.into(),
            source: source.into(),
            at,
        }
    }
}

/// Validate an override against an entry and build its audit record
pub fn prepare_override(
    entry: &VerificationLogEntry,
    request: &OverrideRequest,
) -> Result<OverrideRecord, AuditError> {
    if !entry.is_disputed {
        return Err(AuditError::NotDisputed(entry.id));
    }
    if !request.method.is_admin() {
        return Err(AuditError::InvalidOverride(format!(
            "{} is not an administrative method",
            request.method
        )));
    }
    let shape_ok = match request.value {
        ReadingValue::Flag(_) => entry.category.is_binary(),
        ReadingValue::Numeric(v) => !entry.category.is_binary() && v.is_finite(),
    };
    if !shape_ok {
        return Err(AuditError::InvalidOverride(format!(
            "value {} does not fit category {}",
            request.value, entry.category
        )));
    }
    if request.reason.trim().is_empty() {
        return Err(AuditError::InvalidOverride("reason is required".to_string()));
    }

    Ok(OverrideRecord {
        previous_value: entry.final_value,
        previous_method: entry.resolution_method,
        new_value: request.value,
        method: request.method,
        reason: request.reason.clone(),
        source: request.source.clone(),
        overridden_at: request.at,
    })
}

/// Trait for verification log implementations
#[async_trait]
pub trait VerificationLog: Send + Sync {
    /// Persist the entries of one verification
    async fn append(&self, entries: Vec<VerificationLogEntry>) -> Result<(), AuditError>;

    async fn entry(&self, id: Uuid) -> Option<VerificationLogEntry>;

    /// Entries still awaiting resolution
    async fn disputed(&self) -> Vec<VerificationLogEntry>;

    /// Override a disputed entry; nothing changes unless the audit record is stored
    async fn apply_override(
        &self,
        id: Uuid,
        request: OverrideRequest,
    ) -> Result<VerificationLogEntry, AuditError>;

    async fn entries(&self) -> Vec<VerificationLogEntry>;
}

/// Strategy for resolving every open dispute at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStrategy {
    UsePrimary,
    UseSecondary,
    /// Mean for numeric categories, OR for binary ones
    UseAverage,
}

impl std::str::FromStr for BulkStrategy {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "use_primary" | "primary" => Ok(BulkStrategy::UsePrimary),
            "use_secondary" | "secondary" => Ok(BulkStrategy::UseSecondary),
            "use_average" | "average" => Ok(BulkStrategy::UseAverage),
            other => Err(AuditError::InvalidOverride(format!("unknown strategy {other}"))),
        }
    }
}

/// Apply one strategy uniformly across all disputed entries
pub async fn resolve_all_disputed(
    log: &dyn VerificationLog,
    strategy: BulkStrategy,
    source: &str,
    at: DateTime<Utc>,
) -> Result<Vec<VerificationLogEntry>, AuditError> {
    let mut resolved = Vec::new();

    for entry in log.disputed().await {
        let (value, method) = match strategy {
            BulkStrategy::UsePrimary => (entry.primary_value, ResolutionMethod::AdminPrimary),
            BulkStrategy::UseSecondary => (entry.secondary_value, ResolutionMethod::AdminSecondary),
            BulkStrategy::UseAverage => (
                average(entry.primary_value, entry.secondary_value),
                ResolutionMethod::AdminAverage,
            ),
        };

        let request = OverrideRequest {
            value,
            method,
            reason: format!("bulk resolution: {strategy:?}"),
            source: source.to_string(),
            at,
        };
        resolved.push(log.apply_override(entry.id, request).await?);
    }

    tracing::info!(count = resolved.len(), ?strategy, "Resolved disputed verifications");
    Ok(resolved)
}

/// In-memory verification log
#[derive(Debug, Default)]
pub struct MemoryVerificationLog {
    entries: RwLock<Vec<VerificationLogEntry>>,
}

impl MemoryVerificationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VerificationLog for MemoryVerificationLog {
    async fn append(&self, entries: Vec<VerificationLogEntry>) -> Result<(), AuditError> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn entry(&self, id: Uuid) -> Option<VerificationLogEntry> {
        self.entries.read().await.iter().find(|e| e.id == id).cloned()
    }

    async fn disputed(&self) -> Vec<VerificationLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.is_disputed)
            .cloned()
            .collect()
    }

    async fn apply_override(
        &self,
        id: Uuid,
        request: OverrideRequest,
    ) -> Result<VerificationLogEntry, AuditError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AuditError::NotFound(id))?;
        let record = prepare_override(entry, &request)?;
        entry.apply(record);
        incr_counter(CounterMetric::Overrides, 1);
        Ok(entry.clone())
    }

    async fn entries(&self) -> Vec<VerificationLogEntry> {
        self.entries.read().await.clone()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LogRecord {
    Verification(VerificationLogEntry),
    Override { entry_id: Uuid, record: OverrideRecord },
}

/// Append-only JSON-lines verification log
#[derive(Debug)]
pub struct JsonlVerificationLog {
    path: PathBuf,
    entries: RwLock<Vec<VerificationLogEntry>>,
}

impl JsonlVerificationLog {
    /// Open a log file, replaying existing records; a missing file starts empty
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let mut entries: Vec<VerificationLogEntry> = Vec::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    match serde_json::from_str::<LogRecord>(line)? {
                        LogRecord::Verification(entry) => entries.push(entry),
                        LogRecord::Override { entry_id, record } => {
                            match entries.iter_mut().find(|e| e.id == entry_id) {
                                Some(entry) => entry.apply(record),
                                None => tracing::warn!(%entry_id, "Override for unknown entry in audit log"),
                            }
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened verification log");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_records(&self, records: &[LogRecord]) -> Result<(), AuditError> {
        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl VerificationLog for JsonlVerificationLog {
    async fn append(&self, entries: Vec<VerificationLogEntry>) -> Result<(), AuditError> {
        let mut state = self.entries.write().await;
        let records: Vec<LogRecord> = entries
            .iter()
            .cloned()
            .map(LogRecord::Verification)
            .collect();
        self.write_records(&records).await?;
        state.extend(entries);
        Ok(())
    }

    async fn entry(&self, id: Uuid) -> Option<VerificationLogEntry> {
        self.entries.read().await.iter().find(|e| e.id == id).cloned()
    }

    async fn disputed(&self) -> Vec<VerificationLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.is_disputed)
            .cloned()
            .collect()
    }

    async fn apply_override(
        &self,
        id: Uuid,
        request: OverrideRequest,
    ) -> Result<VerificationLogEntry, AuditError> {
        let mut state = self.entries.write().await;
        let index = state
            .iter()
            .position(|e| e.id == id)
            .ok_or(AuditError::NotFound(id))?;
        let record = prepare_override(&state[index], &request)?;

        // The audit record must be on disk before the value changes
        self.write_records(&[LogRecord::Override {
            entry_id: id,
            record: record.clone(),
        }])
        .await?;

        state[index].apply(record);
        incr_counter(CounterMetric::Overrides, 1);
        tracing::info!(entry_id = %id, method = %request.method, source = %request.source, "Verification overridden");
        Ok(state[index].clone())
    }

    async fn entries(&self) -> Vec<VerificationLogEntry> {
        self.entries.read().await.clone()
    }
}
