//! Persisted error reports under `errors/{id}`. Server-side failures are
//! filed here so operators can review them later; filing itself must
//! never fail the operation that hit the error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::store::{decode, encode, CollectionPath, ConvertError, DocumentStore, Stamp, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// The entity a report is about, when there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: String,
}

impl EntityRef {
    pub fn job(id: impl Into<String>) -> Self {
        Self {
            kind: "job".to_string(),
            id: id.into(),
        }
    }

    pub fn company(id: impl Into<String>) -> Self {
        Self {
            kind: "company".to_string(),
            id: id.into(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: "user".to_string(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub id: String,
    pub source: String,
    pub severity: Severity,
    pub message: String,
    pub entity: Option<EntityRef>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorReportDoc {
    source: String,
    severity: Severity,
    message: String,
    #[serde(default)]
    entity: Option<EntityRef>,
    date: Stamp,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

pub struct ErrorReporter<S> {
    store: Arc<S>,
}

impl<S> Clone for ErrorReporter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> ErrorReporter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn collection() -> CollectionPath {
        CollectionPath::new("errors")
    }

    /// File a report. Store trouble is logged and swallowed; the caller
    /// already has an error on its hands.
    pub async fn record(
        &self,
        source: &str,
        severity: Severity,
        message: impl Into<String>,
        entity: Option<EntityRef>,
    ) {
        let message = message.into();
        error!(source, ?severity, message, "operation failed");

        let doc = ErrorReportDoc {
            source: source.to_string(),
            severity,
            message,
            entity,
            date: Stamp::now(),
        };
        let write = async {
            let id = self.store.allocate_id(&Self::collection()).await?;
            self.store.set(&Self::collection().doc(id), encode(&doc)?).await?;
            Ok::<(), ReportError>(())
        };
        if let Err(err) = write.await {
            warn!(error = %err, "error report not persisted");
        }
    }

    /// All filed reports, newest last; undecodable ones are skipped.
    pub async fn reports(&self) -> Result<Vec<ErrorReport>, ReportError> {
        let docs = self.store.list(&Self::collection()).await?;
        let mut reports = Vec::with_capacity(docs.len());
        for doc in &docs {
            match decode::<ErrorReportDoc>(doc) {
                Ok(report) => reports.push(ErrorReport {
                    id: doc.path.id().to_string(),
                    source: report.source,
                    severity: report.severity,
                    message: report.message,
                    entity: report.entity,
                    date: report.date.into(),
                }),
                Err(err) => warn!(report = doc.path.id(), error = %err, "skipping undecodable report"),
            }
        }
        reports.sort_by_key(|report| report.date);
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn reports_round_trip_with_entity() {
        let reporter = ErrorReporter::new(Arc::new(MemoryStore::new()));
        reporter
            .record(
                "jobs",
                Severity::Error,
                "company c1 missing",
                Some(EntityRef::job("j1")),
            )
            .await;

        let reports = reporter.reports().await.expect("list");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].source, "jobs");
        assert_eq!(reports[0].severity, Severity::Error);
        assert_eq!(reports[0].entity, Some(EntityRef::job("j1")));
    }

    #[tokio::test]
    async fn reports_sort_oldest_first() {
        let reporter = ErrorReporter::new(Arc::new(MemoryStore::new()));
        reporter.record("jobs", Severity::Warning, "first", None).await;
        reporter.record("companies", Severity::Error, "second", None).await;

        let reports = reporter.reports().await.expect("list");
        assert_eq!(reports.len(), 2);
        assert!(reports[0].date <= reports[1].date);
    }
}
