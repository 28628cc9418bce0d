use tracing::{debug, info, warn};

use super::matcher::ModuleMatcher;
use super::parser::{in_range, parse_grade};
use super::types::{ModuleRecord, RetakeRow};

/// A retake score that replaced a module's exam score.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedRetake {
    pub designation: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemediationReport {
    pub applied: Vec<AppliedRetake>,
    /// Retake designations that matched no module.
    pub unmatched: Vec<String>,
}

/// Replaces exam scores with retake scores before averaging.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemediationOverlay {
    matcher: ModuleMatcher,
}

impl RemediationOverlay {
    pub fn new(matcher: ModuleMatcher) -> Self {
        Self { matcher }
    }

    pub fn apply(&self, records: &mut [ModuleRecord], rows: &[RetakeRow]) -> RemediationReport {
        let mut report = RemediationReport::default();

        for row in rows {
            let designation = row.designation.trim();
            let Some(score) = first_valid_score(&row.cells) else {
                debug!(designation, "Retake row without a usable score");
                continue;
            };
            if designation.is_empty() {
                continue;
            }

            match self.find_module(records, designation) {
                Some(idx) => {
                    let module = &mut records[idx];
                    module.exam_score = Some(score);
                    module.retake_score = Some(score);
                    module.has_retake = true;
                    info!(module = %module.designation, score, "Applied retake score");
                    report.applied.push(AppliedRetake {
                        designation: module.designation.clone(),
                        score,
                    });
                }
                None => {
                    warn!(designation, "No module matches retake row, skipping");
                    report.unmatched.push(designation.to_string());
                }
            }
        }

        report
    }

    fn find_module(&self, records: &[ModuleRecord], designation: &str) -> Option<usize> {
        let lower = designation.to_lowercase();
        let candidates = || records.iter().enumerate().filter(|(_, r)| !r.is_aggregate);
        candidates()
            .find(|(_, r)| r.designation.to_lowercase() == lower)
            .or_else(|| candidates().find(|(_, r)| self.matcher.matches(&r.designation, designation, None)))
            .map(|(idx, _)| idx)
    }
}

/// First cell, left to right, holding a score in [0, 20].
pub fn first_valid_score(cells: &[String]) -> Option<f64> {
    cells
        .iter()
        .filter_map(|cell| parse_grade(cell))
        .find(|score| in_range(*score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::average::module_average;

    fn algebre() -> ModuleRecord {
        ModuleRecord::new("Algèbre", "M. Dupont", None, None, Some(6.0), 3)
    }

    #[test]
    fn test_retake_replaces_exam() {
        let mut records = vec![algebre()];
        let report = RemediationOverlay::default()
            .apply(&mut records, &[RetakeRow::new("Algèbre", &["", "14"])]);

        let module = &records[0];
        assert_eq!(module.exam_score, Some(14.0));
        assert_eq!(module.retake_score, Some(14.0));
        assert!(module.has_retake);
        assert_eq!(module_average(module), Some(14.0));
        assert_eq!(report.applied.len(), 1);
    }

    #[test]
    fn test_case_insensitive_exact_then_fuzzy() {
        let mut records = vec![
            ModuleRecord::new("Algèbre linéaire", "", None, None, Some(5.0), 2),
            ModuleRecord::new("ALGÈBRE", "", None, None, Some(6.0), 3),
        ];
        RemediationOverlay::default().apply(&mut records, &[RetakeRow::new("algèbre", &["12"])]);
        assert!(!records[0].has_retake);
        assert_eq!(records[1].exam_score, Some(12.0));

        let mut records = vec![ModuleRecord::new("Algèbre linéaire", "", None, None, Some(5.0), 2)];
        RemediationOverlay::default().apply(&mut records, &[RetakeRow::new("Algèbre", &["12"])]);
        assert!(records[0].has_retake);
    }

    #[test]
    fn test_unmatched_row_is_reported() {
        let mut records = vec![algebre()];
        let report = RemediationOverlay::default()
            .apply(&mut records, &[RetakeRow::new("Chimie organique", &["11"])]);
        assert_eq!(report.unmatched, vec!["Chimie organique".to_string()]);
        assert_eq!(records[0], algebre());
    }

    #[test]
    fn test_first_valid_score_skips_out_of_range() {
        let cells: Vec<String> = ["abs", "25", "-", "9,5", "12"].iter().map(|s| s.to_string()).collect();
        assert_eq!(first_valid_score(&cells), Some(9.5));
        assert_eq!(first_valid_score(&[]), None);
    }

    #[test]
    fn test_row_without_score_is_ignored() {
        let mut records = vec![algebre()];
        let report = RemediationOverlay::default()
            .apply(&mut records, &[RetakeRow::new("Algèbre", &["", "-"])]);
        assert!(report.applied.is_empty());
        assert!(report.unmatched.is_empty());
        assert!(!records[0].has_retake);
    }
}
