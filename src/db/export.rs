use std::io::Write;

use crate::error::ProcessingError;
use crate::models::{AnalysisReport, MatchCandidate};

const HEADER: [&str; 12] = [
    "record_number",
    "rank",
    "billed_code",
    "catalog_code",
    "description",
    "match_type",
    "score",
    "confidence",
    "status",
    "total_value",
    "unverified_checks",
    "issues",
];

/// Write one row per reported candidate (best, then alternatives). A record
/// without candidates still gets one row carrying its issues.
pub fn write_reports_csv<W: Write>(reports: &[AnalysisReport], writer: W) -> Result<(), ProcessingError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(HEADER)?;

    for report in reports {
        let issues = report.issues.join("; ");
        let Some(best) = report.best_match.as_ref() else {
            let mut row = vec![report.record_number.as_str()];
            row.extend(std::iter::repeat("").take(HEADER.len() - 2));
            row.push(&issues);
            writer.write_record(row)?;
            continue;
        };

        writer.write_record(candidate_row(report, "best", best, &issues))?;
        for (idx, alternative) in report.alternatives.iter().enumerate() {
            writer.write_record(candidate_row(report, &format!("alt{}", idx + 1), alternative, ""))?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Convenience for callers that need the bytes, e.g. an HTTP body.
pub fn reports_to_csv(reports: &[AnalysisReport]) -> Result<Vec<u8>, ProcessingError> {
    let mut buffer = Vec::new();
    write_reports_csv(reports, &mut buffer)?;
    Ok(buffer)
}

fn candidate_row(report: &AnalysisReport, rank: &str, candidate: &MatchCandidate, issues: &str) -> Vec<String> {
    let unverified: Vec<&str> = candidate.unverified_checks.iter().map(|c| c.as_str()).collect();
    vec![
        report.record_number.clone(),
        rank.to_string(),
        candidate.billed_code.clone(),
        candidate.catalog_code.clone(),
        candidate.description.clone(),
        candidate.match_type.as_str().to_string(),
        candidate.score.to_string(),
        candidate.confidence.to_string(),
        candidate.status.as_str().to_string(),
        candidate.values.total.to_string(),
        unverified.join(";"),
        issues.to_string(),
    ]
}
