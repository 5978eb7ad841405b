use chrono::NaiveDate;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::error::ProcessingError;
use crate::models::{
    AnalysisOutcome, AnalysisReport, BillingRecord, FailureKind, InvalidRecord, MatchingStats,
    ParseResult, PipelineOutcome,
};
use crate::parser::{extract_record, split_records, Extraction};
use crate::service::catalog::ReferenceCatalog;
use crate::service::matcher::ProcedureMatcher;
use crate::service::report::ReportBuilder;
use crate::service::validator::StructuralValidator;

/// Batch driver: split, extract, validate, match, report.
///
/// The catalog snapshot is fixed at construction and shared read-only by
/// every batch, so no locking is needed while records are matched.
pub struct PipelineService {
    catalog: Option<Arc<ReferenceCatalog>>,
    validator: StructuralValidator,
    matcher: ProcedureMatcher,
    reports: ReportBuilder,
    parallel: bool,
}

impl PipelineService {
    pub fn new(config: &AppConfig, catalog: Option<Arc<ReferenceCatalog>>) -> Self {
        Self {
            catalog,
            validator: StructuralValidator::new(config.validation.clone()),
            matcher: ProcedureMatcher::new(config.matching.clone()),
            reports: ReportBuilder::new(&config.matching),
            parallel: config.batch.parallel,
        }
    }

    /// Fix the date ages are measured against.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.matcher = self.matcher.with_reference_date(date);
        self
    }

    pub fn catalog(&self) -> Option<&ReferenceCatalog> {
        self.catalog.as_deref()
    }

    /// Parse a text buffer into valid and invalid records.
    pub fn parse(&self, text: &str) -> ParseResult {
        let start = Instant::now();

        if text.trim().is_empty() {
            let err = ProcessingError::EmptyInput;
            tracing::warn!("Parse aborted: {}", err);
            return ParseResult::failure(err.to_string(), start.elapsed().as_millis());
        }

        // 1. split
        let blocks = split_records(text);
        tracing::info!("Parsing {} AIH blocks", blocks.len());

        // 2. extract + validate, every record independently
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        let mut errors = Vec::new();

        for (idx, block) in blocks.iter().enumerate() {
            let record_index = idx + 1;
            let Extraction { record, missing } = extract_record(block);
            if !missing.is_empty() {
                tracing::debug!("AIH {}: {} labels not found", record.key(), missing.len());
            }

            let record_errors = self.validator.validate(&record, record_index);
            if record_errors.is_empty() {
                valid.push(record);
            } else {
                tracing::warn!(
                    "AIH {} (#{}) invalid: {} errors",
                    record.key(),
                    record_index,
                    record_errors.len()
                );
                errors.extend(record_errors.iter().cloned());
                invalid.push(InvalidRecord {
                    record,
                    errors: record_errors,
                });
            }
        }

        tracing::info!(
            "Parse finished: total: {}, valid: {}, invalid: {}",
            blocks.len(),
            valid.len(),
            invalid.len()
        );

        ParseResult {
            success: true,
            message: None,
            total_processed: blocks.len(),
            valid_count: valid.len(),
            invalid_count: invalid.len(),
            errors,
            processing_time_ms: start.elapsed().as_millis(),
            valid,
            invalid,
        }
    }

    /// Match one record and build its report.
    pub fn analyze_record(&self, record: &BillingRecord, catalog: &ReferenceCatalog) -> AnalysisReport {
        let candidates = self.matcher.match_record(record, catalog);
        self.reports.build(record, candidates)
    }

    /// Analyze valid records, sequentially or on the rayon pool depending on
    /// `batch.parallel`.
    pub fn analyze(&self, records: &[BillingRecord]) -> AnalysisOutcome {
        if self.parallel {
            self.analyze_batch_parallel(records)
        } else {
            self.analyze_batch(records, |_, _| {}, None)
        }
    }

    /// Sequential batch. `on_progress(done, total)` runs after each record;
    /// `cancel` is checked before each record and stops scheduling the rest.
    pub fn analyze_batch<F>(
        &self,
        records: &[BillingRecord],
        mut on_progress: F,
        cancel: Option<&AtomicBool>,
    ) -> AnalysisOutcome
    where
        F: FnMut(usize, usize),
    {
        let start = Instant::now();
        let Some(catalog) = self.require_catalog() else {
            return self.catalog_unavailable(start);
        };

        let total = records.len();
        let mut reports = Vec::with_capacity(total);
        let mut cancelled = false;

        for (idx, record) in records.iter().enumerate() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::warn!("Batch cancelled after {}/{} records", idx, total);
                cancelled = true;
                break;
            }

            reports.push(self.analyze_record(record, catalog));

            let current_idx = idx + 1;
            log_progress(current_idx, total, &reports);
            on_progress(current_idx, total);
        }

        self.finish(reports, cancelled, start)
    }

    /// Same result as `analyze_batch`, computed across the rayon pool.
    /// Report order follows record order.
    pub fn analyze_batch_parallel(&self, records: &[BillingRecord]) -> AnalysisOutcome {
        let start = Instant::now();
        let Some(catalog) = self.require_catalog() else {
            return self.catalog_unavailable(start);
        };

        tracing::info!("Analyzing {} records in parallel", records.len());
        let reports: Vec<AnalysisReport> = records
            .par_iter()
            .map(|record| self.analyze_record(record, catalog))
            .collect();

        self.finish(reports, false, start)
    }

    /// Sequential batch that yields to the tokio scheduler between records.
    pub async fn analyze_batch_async(
        &self,
        records: &[BillingRecord],
        cancel: Option<&AtomicBool>,
    ) -> AnalysisOutcome {
        let start = Instant::now();
        let Some(catalog) = self.require_catalog() else {
            return self.catalog_unavailable(start);
        };

        let total = records.len();
        let mut reports = Vec::with_capacity(total);
        let mut cancelled = false;

        for (idx, record) in records.iter().enumerate() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::warn!("Batch cancelled after {}/{} records", idx, total);
                cancelled = true;
                break;
            }

            reports.push(self.analyze_record(record, catalog));
            log_progress(idx + 1, total, &reports);
            tokio::task::yield_now().await;
        }

        self.finish(reports, cancelled, start)
    }

    /// Parse then analyze the valid records.
    ///
    /// Without a catalog the whole batch fails before any record is counted.
    pub fn process(&self, text: &str) -> PipelineOutcome {
        let parse = self.parse(text);
        if !parse.success {
            return self.abort(parse, FailureKind::EmptyInput);
        }
        if self.catalog.is_none() {
            return self.abort_without_catalog(Instant::now());
        }
        let analysis = self.analyze(&parse.valid);
        self.combine(parse, analysis)
    }

    /// `process` for async callers. The parallel batch runs on the blocking
    /// pool so the calling tokio worker stays free.
    pub async fn process_async(self: Arc<Self>, text: &str) -> PipelineOutcome {
        let mut parse = self.parse(text);
        if !parse.success {
            return self.abort(parse, FailureKind::EmptyInput);
        }
        if self.catalog.is_none() {
            return self.abort_without_catalog(Instant::now());
        }

        if !self.parallel {
            let analysis = self.analyze_batch_async(&parse.valid, None).await;
            return self.combine(parse, analysis);
        }

        let service = Arc::clone(&self);
        let records = std::mem::take(&mut parse.valid);
        let task = tokio::task::spawn_blocking(move || {
            let analysis = service.analyze_batch_parallel(&records);
            (analysis, records)
        });

        match task.await {
            Ok((analysis, records)) => {
                parse.valid = records;
                self.combine(parse, analysis)
            }
            Err(e) => {
                tracing::error!("Parallel analysis task failed: {}", e);
                let analysis = AnalysisOutcome::failure(format!("analysis task failed: {}", e), 0);
                PipelineOutcome {
                    success: false,
                    failure: Some(FailureKind::Internal),
                    parse,
                    analysis,
                }
            }
        }
    }

    fn require_catalog(&self) -> Option<&ReferenceCatalog> {
        self.catalog.as_deref()
    }

    fn catalog_unavailable(&self, start: Instant) -> AnalysisOutcome {
        let err = ProcessingError::CatalogUnavailable("no active catalog loaded".to_string());
        tracing::warn!("Analysis aborted: {}", err);
        AnalysisOutcome::failure(err.to_string(), start.elapsed().as_millis())
    }

    fn finish(&self, reports: Vec<AnalysisReport>, cancelled: bool, start: Instant) -> AnalysisOutcome {
        let stats = MatchingStats::from_reports(&reports);
        tracing::info!(
            "Analysis finished: records: {}, with match: {}, candidates: {}, avg confidence: {}",
            stats.records,
            stats.records_with_match,
            stats.total_candidates,
            stats.average_confidence
        );
        AnalysisOutcome {
            success: true,
            message: cancelled.then(|| "batch cancelled".to_string()),
            cancelled,
            reports,
            stats,
            processing_time_ms: start.elapsed().as_millis(),
        }
    }

    fn abort(&self, parse: ParseResult, kind: FailureKind) -> PipelineOutcome {
        let message = parse.message.clone().unwrap_or_default();
        PipelineOutcome {
            success: false,
            failure: Some(kind),
            analysis: AnalysisOutcome::failure(message, parse.processing_time_ms),
            parse,
        }
    }

    /// Parsed records are discarded so the outcome reports zero processed.
    fn abort_without_catalog(&self, start: Instant) -> PipelineOutcome {
        let analysis = self.catalog_unavailable(start);
        let message = analysis.message.clone().unwrap_or_default();
        PipelineOutcome {
            success: false,
            failure: Some(FailureKind::CatalogUnavailable),
            parse: ParseResult::failure(message, analysis.processing_time_ms),
            analysis,
        }
    }

    fn combine(&self, parse: ParseResult, analysis: AnalysisOutcome) -> PipelineOutcome {
        let success = parse.success && analysis.success;
        PipelineOutcome {
            success,
            failure: (!success).then_some(FailureKind::CatalogUnavailable),
            parse,
            analysis,
        }
    }
}

/// Progress log every 100 records and on the first.
fn log_progress(current_idx: usize, total: usize, reports: &[AnalysisReport]) {
    if current_idx % 100 == 0 || current_idx == 1 {
        let matched = reports.iter().filter(|r| r.best_match.is_some()).count();
        tracing::info!("AIH progress: {}/{}, with match: {}", current_idx, total, matched);
    }
}
