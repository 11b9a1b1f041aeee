//! Chunked execution of reporting-API queries
//!
//! The reporting endpoints accept at most 100 ids per filter, so id sets
//! are chunked here, paced with an inter-batch delay on top of the rate
//! limiter, and merged into one per-entity map. A failed batch is recorded
//! and skipped; it never aborts the run.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLog, Severity};
use crate::domain::error::Result;
use crate::domain::statistics::EntityStatistics;
use crate::parsers::ReportRow;

/// Chunk size and pacing for one batched operation
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
}

impl BatchSettings {
    /// Statistics endpoints: full-size chunks, light pacing
    pub fn stats() -> Self {
        Self {
            batch_size: 100,
            inter_batch_delay: Duration::from_millis(500),
        }
    }

    /// Revenue sub-queries are heavier per call: small chunks, long pacing
    pub fn revenue() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay: Duration::from_secs(5),
        }
    }
}

/// Run `fetch` over `ids` in chunks and merge the returned rows into a
/// per-entity map keyed by the `id_field` grouping. Rows sharing an id
/// (per-message flow rows) are aggregated: counts summed, rates recomputed.
///
/// Cancellation stops new batches and returns the partial map with a
/// `Cancelled` diagnostic; a failed batch is logged as a `BatchFailure`
/// diagnostic and the remaining batches continue.
pub async fn run_batched<F, Fut>(
    ids: &[String],
    id_field: &str,
    settings: BatchSettings,
    cancellation: &CancellationToken,
    diagnostics: &DiagnosticLog,
    mut fetch: F,
) -> HashMap<String, EntityStatistics>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<ReportRow>>>,
{
    let mut merged: HashMap<String, EntityStatistics> = HashMap::new();
    let total_batches = ids.len().div_ceil(settings.batch_size.max(1));

    for (batch_index, chunk) in ids.chunks(settings.batch_size.max(1)).enumerate() {
        if cancellation.is_cancelled() {
            diagnostics.push(Diagnostic::cancelled(format!("{id_field} batches")));
            break;
        }

        match fetch(chunk.to_vec()).await {
            Ok(rows) => merge_rows(&mut merged, &rows, id_field),
            Err(e) => {
                warn!(
                    batch = batch_index + 1,
                    total_batches,
                    "batch failed, continuing with remaining batches: {e}"
                );
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::BatchFailure,
                        Severity::Medium,
                        "A statistics batch failed; totals for its entities are reported as zero",
                    )
                    .with_evidence("batch", batch_index + 1)
                    .with_evidence("idField", id_field)
                    .with_evidence("error", e.to_string()),
                );
            }
        }

        if batch_index + 1 < total_batches {
            sleep(settings.inter_batch_delay).await;
        }
    }

    merged
}

/// Merge rows by the grouping id, aggregating duplicates
pub fn merge_rows(
    merged: &mut HashMap<String, EntityStatistics>,
    rows: &[ReportRow],
    id_field: &str,
) {
    for row in rows {
        let Some(id) = row.group(id_field) else {
            warn!(id_field, "report row missing its grouping id, skipping");
            continue;
        };
        match merged.get_mut(id) {
            Some(existing) => existing.absorb(&row.statistics),
            None => {
                let mut stats = row.statistics.clone();
                stats.recompute_engagement_rates();
                merged.insert(id.to_string(), stats);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn row(flow_id: &str, recipients: u64, opens: u64, value: f64) -> ReportRow {
        let mut groupings = StdHashMap::new();
        groupings.insert("flow_id".to_string(), flow_id.to_string());
        ReportRow {
            groupings,
            statistics: EntityStatistics {
                recipients,
                opens,
                conversion_value: value,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_merge_aggregates_messages_by_flow() {
        let mut merged = HashMap::new();
        let rows = vec![
            row("F1", 100, 40, 500.0),
            row("F1", 50, 30, 200.0),
            row("F2", 10, 1, 0.0),
        ];
        merge_rows(&mut merged, &rows, "flow_id");

        let f1 = &merged["F1"];
        assert_eq!(f1.recipients, 150);
        assert_eq!(f1.opens, 70);
        assert_eq!(f1.conversion_value, 700.0);
        assert!((f1.open_rate - 46.666_666).abs() < 0.001);
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_failure_does_not_abort() {
        let ids: Vec<String> = (0..25).map(|i| format!("F{i}")).collect();
        let diagnostics = DiagnosticLog::new();
        let cancellation = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_counter = calls.clone();
        let merged = run_batched(
            &ids,
            "flow_id",
            BatchSettings {
                batch_size: 10,
                inter_batch_delay: Duration::from_millis(10),
            },
            &cancellation,
            &diagnostics,
            move |chunk| {
                let call = calls_counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 1 {
                        Err(crate::domain::error::AuditError::ServerError {
                            status: 503,
                            attempts: 3,
                        })
                    } else {
                        Ok(chunk.iter().map(|id| row(id, 10, 2, 1.0)).collect())
                    }
                }
            },
        )
        .await;

        // 3 batches, middle one failed: 20 entities survive
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(merged.len(), 20);
        let drained = diagnostics.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind, DiagnosticKind::BatchFailure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_partial() {
        let ids: Vec<String> = (0..30).map(|i| format!("F{i}")).collect();
        let diagnostics = DiagnosticLog::new();
        let cancellation = CancellationToken::new();

        let token = cancellation.clone();
        let merged = run_batched(
            &ids,
            "flow_id",
            BatchSettings {
                batch_size: 10,
                inter_batch_delay: Duration::from_millis(10),
            },
            &cancellation,
            &diagnostics,
            move |chunk| {
                token.cancel();
                async move { Ok(chunk.iter().map(|id| row(id, 10, 2, 1.0)).collect()) }
            },
        )
        .await;

        // First batch completes, cancellation stops the rest
        assert_eq!(merged.len(), 10);
        assert!(diagnostics
            .drain()
            .iter()
            .any(|d| d.kind == DiagnosticKind::Cancelled));
    }
}
