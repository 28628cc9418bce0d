//! The grading session: owns the live catalog and the current result set,
//! and is the only thing that mutates them.
//!
//! Callers drive it through commands (`load`, `submit_edit`,
//! `request_merge`, `request_split`, `request_export`) and a clock
//! (`poll`). Score and credit edits are debounced: they change the module
//! record right away but the result set is only rebuilt once the edits
//! stop for the configured window.

pub mod debounce;
pub mod events;

pub use debounce::Debouncer;
pub use events::{NoticeLevel, SessionEvent};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::grading::average::{compute_module_averages, refresh_overall_module};
use crate::grading::{
    clamp_credits, in_range, parse_grade, CreditResolver, CreditRule, GradeError, GradeRow,
    GroupAssigner, GroupCatalog, GroupRecord, ModuleId, ModuleMatcher, ModuleRecord,
    PassingConfig, RemediationOverlay, RemediationReport, ResultSet, RetakeRow, DEFAULT_CREDITS,
    MISSING_VALUE,
};
use crate::output::{render_export, ExportFormat};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("The grades table has no rows")]
    EmptyFeed,

    #[error(transparent)]
    Grade(#[from] GradeError),

    #[error("Export failed")]
    Export(#[source] anyhow::Error),
}

/// Editable cells of a module row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    Cc,
    Lab,
    Exam,
    Credits,
}

impl EditField {
    pub fn label(&self) -> &'static str {
        match self {
            EditField::Cc => "CC",
            EditField::Lab => "TP",
            EditField::Exam => "Examen",
            EditField::Credits => "Crédits",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Applied,
    /// Credits were out of range or unreadable and were brought into range.
    Clamped { credits: u32 },
    /// The record was left untouched.
    Rejected { reason: String },
}

pub struct Session {
    catalog: GroupCatalog,
    credit_rules: Vec<CreditRule>,
    passing: PassingConfig,
    matcher: ModuleMatcher,
    debouncer: Debouncer,
    records: Vec<ModuleRecord>,
    result: ResultSet,
    remediation: RemediationReport,
    invalid: HashMap<(ModuleId, EditField), String>,
    subscribers: Vec<UnboundedSender<SessionEvent>>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            catalog: config.catalog.clone(),
            credit_rules: config.credit_rules.clone(),
            passing: config.passing.clone(),
            matcher: ModuleMatcher::new(config.matching.similarity_threshold),
            debouncer: Debouncer::new(config.editing.debounce_duration()),
            records: Vec::new(),
            result: ResultSet::default(),
            remediation: RemediationReport::default(),
            invalid: HashMap::new(),
            subscribers: Vec::new(),
        }
    }

    /// Receive change notifications. Dropped receivers are forgotten on
    /// the next send.
    pub fn subscribe(&mut self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Full recalculation from raw rows. On failure the previous result set
    /// stays published.
    pub fn load(&mut self, rows: &[GradeRow], retakes: &[RetakeRow]) -> Result<&ResultSet, SessionError> {
        if rows.is_empty() {
            self.notice(NoticeLevel::Error, "Aucune note trouvée dans le tableau");
            return Err(SessionError::EmptyFeed);
        }

        let resolver = CreditResolver::new(&self.credit_rules, &self.catalog);
        let mut records: Vec<ModuleRecord> = rows
            .iter()
            .map(|row| {
                ModuleRecord::new(
                    row.designation.trim(),
                    row.teacher.trim(),
                    parse_grade(&row.cc),
                    parse_grade(&row.lab),
                    parse_grade(&row.exam),
                    resolver.resolve(&row.designation),
                )
            })
            .collect();

        let report = RemediationOverlay::new(self.matcher).apply(&mut records, retakes);
        for applied in &report.applied {
            self.notice(
                NoticeLevel::Info,
                format!(
                    "Note de rattrapage appliquée: {} ({})",
                    applied.designation, applied.score
                ),
            );
        }

        self.records = records;
        self.remediation = report;
        self.invalid.clear();
        self.debouncer.cancel();
        self.recalculate();
        info!(modules = self.records.len(), "Loaded grades table");
        Ok(&self.result)
    }

    /// Apply a raw edit to one cell. The record changes immediately; the
    /// result set is rebuilt after the debounce window (see [`poll`]).
    ///
    /// [`poll`]: Session::poll
    pub fn submit_edit(&mut self, id: ModuleId, field: EditField, raw: &str, now: Instant) -> EditOutcome {
        if id.0 >= self.records.len() {
            let reason = if id.0 == self.records.len() {
                "La moyenne générale n'est pas modifiable".to_string()
            } else {
                GradeError::UnknownModule(id.0).to_string()
            };
            warn!(module = id.0, "Edit rejected: {}", reason);
            self.notice(NoticeLevel::Warning, reason.clone());
            return EditOutcome::Rejected { reason };
        }

        let outcome = match field {
            EditField::Credits => {
                let (credits, clamped) = parse_credits(raw);
                self.records[id.0].credits = credits;
                if clamped {
                    EditOutcome::Clamped { credits }
                } else {
                    EditOutcome::Applied
                }
            }
            _ => match parse_score_edit(raw) {
                Ok(score) => {
                    let record = &mut self.records[id.0];
                    match field {
                        EditField::Cc => record.cc_score = score,
                        EditField::Lab => record.lab_score = score,
                        _ => {
                            // A typed exam score replaces any retake overlay
                            record.exam_score = score;
                            record.retake_score = None;
                            record.has_retake = false;
                        }
                    }
                    EditOutcome::Applied
                }
                Err(reason) => EditOutcome::Rejected { reason },
            },
        };

        let designation = self.records[id.0].designation.clone();
        match &outcome {
            EditOutcome::Rejected { reason } => {
                self.invalid.insert((id, field), raw.to_string());
                warn!(module = %designation, field = field.label(), raw, "Edit rejected: {}", reason);
                self.notice(
                    NoticeLevel::Warning,
                    format!("{} ({}): {}", designation, field.label(), reason),
                );
            }
            EditOutcome::Clamped { credits } => {
                self.notice(
                    NoticeLevel::Warning,
                    format!("{}: crédits ramenés à {}", designation, credits),
                );
            }
            EditOutcome::Applied => {}
        }
        if matches!(outcome, EditOutcome::Rejected { .. }) {
            return outcome;
        }

        self.invalid.remove(&(id, field));
        self.debouncer.arm(now);
        debug!(module = %designation, field = field.label(), raw, "Edit applied, recalculation scheduled");
        outcome
    }

    /// Run the debounced recalculation if its quiet window has passed.
    /// Returns true when the result set was rebuilt.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.debouncer.ready(now) {
            self.recalculate();
            true
        } else {
            false
        }
    }

    /// Run a pending recalculation right away.
    pub fn flush(&mut self) -> bool {
        if self.debouncer.cancel() {
            self.recalculate();
            true
        } else {
            false
        }
    }

    pub fn has_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn debounce_window(&self) -> Duration {
        self.debouncer.window()
    }

    /// Merge group `b` into `a`, rebuild, and return the new group.
    pub fn request_merge(&mut self, a: &str, b: &str) -> Result<GroupRecord, SessionError> {
        self.flush();
        let assigner = GroupAssigner::new(self.matcher);
        match assigner.merge(&self.result.groups, &mut self.catalog, a, b) {
            Ok(merged) => {
                self.recalculate();
                let merged = self.result.group(&merged.name).cloned().unwrap_or(merged);
                self.notice(NoticeLevel::Success, format!("UE fusionnées: {}", merged.name));
                Ok(merged)
            }
            Err(e) => {
                warn!(a, b, "Merge refused: {}", e);
                self.notice(NoticeLevel::Error, format!("Impossible de fusionner ces UE: {}", e));
                Err(e.into())
            }
        }
    }

    /// Split a group back into its modules, rebuild, and return the names
    /// of the groups its members ended up in.
    pub fn request_split(&mut self, name: &str) -> Result<Vec<String>, SessionError> {
        self.flush();
        let assigner = GroupAssigner::new(self.matcher);
        match assigner.split(&self.result.groups, &mut self.catalog, name) {
            Ok(parts) => {
                self.recalculate();
                let mut landed: Vec<String> = Vec::new();
                for part in &parts {
                    for member in &part.members {
                        if let Some(group) = self.result.group_of(&member.designation) {
                            if !landed.iter().any(|g| g == group) {
                                landed.push(group.to_string());
                            }
                        }
                    }
                }
                self.notice(NoticeLevel::Info, format!("UE séparée: {}", name));
                Ok(landed)
            }
            Err(e) => {
                warn!(name, "Split refused: {}", e);
                self.notice(NoticeLevel::Error, format!("Impossible de séparer cette UE: {}", e));
                Err(e.into())
            }
        }
    }

    /// Render the current result set, flushing pending edits first.
    pub fn request_export(&mut self, format: ExportFormat) -> Result<String, SessionError> {
        self.request_export_at(format, &Local::now())
    }

    pub fn request_export_at(
        &mut self,
        format: ExportFormat,
        timestamp: &DateTime<Local>,
    ) -> Result<String, SessionError> {
        self.flush();
        match render_export(format, &self.result, &self.passing, timestamp) {
            Ok(contents) => Ok(contents),
            Err(e) => {
                self.notice(NoticeLevel::Error, format!("Erreur lors de l'export {}", format.label()));
                Err(SessionError::Export(e))
            }
        }
    }

    /// Current result set. May lag behind edits still in the debounce
    /// window.
    pub fn snapshot(&self) -> &ResultSet {
        &self.result
    }

    pub fn revision(&self) -> u64 {
        self.result.revision
    }

    /// Live catalog, including merges and splits done in this session.
    pub fn catalog(&self) -> &GroupCatalog {
        &self.catalog
    }

    pub fn passing(&self) -> &PassingConfig {
        &self.passing
    }

    pub fn remediation(&self) -> &RemediationReport {
        &self.remediation
    }

    /// Raw text of the edits that were rejected and not yet corrected.
    pub fn invalid_inputs(&self) -> &HashMap<(ModuleId, EditField), String> {
        &self.invalid
    }

    pub fn is_invalid(&self, id: ModuleId, field: EditField) -> bool {
        self.invalid.contains_key(&(id, field))
    }

    /// Module rows as last edited, without the overall record.
    pub fn records(&self) -> &[ModuleRecord] {
        &self.records
    }

    fn recalculate(&mut self) {
        compute_module_averages(&mut self.records);
        let groups = GroupAssigner::new(self.matcher).assign(&self.records, &self.catalog);
        let mut modules = self.records.clone();
        refresh_overall_module(&mut modules);

        self.result = ResultSet {
            modules,
            groups,
            revision: self.result.revision + 1,
        };
        debug!(revision = self.result.revision, "Recalculated");
        self.emit(SessionEvent::Recalculated {
            revision: self.result.revision,
        });
    }

    fn notice(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(SessionEvent::notice(level, message));
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Score cell edit: blank or "-" clears the score, anything else must be a
/// number in [0, 20].
fn parse_score_edit(raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == MISSING_VALUE {
        return Ok(None);
    }
    match parse_grade(raw) {
        Some(score) if in_range(score) => Ok(Some(score)),
        Some(score) => Err(format!("{} hors de l'intervalle 0-20", score)),
        None => Err(format!("'{}' n'est pas une note", raw)),
    }
}

/// Credits edit: leading integer, 1 when unreadable, clamped to 1..=20.
/// The flag is set when the stored value differs from what was typed.
fn parse_credits(raw: &str) -> (u32, bool) {
    let raw = raw.trim();
    let end = raw
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    match raw[..end].parse::<i64>() {
        Ok(0) | Err(_) => (DEFAULT_CREDITS, true),
        Ok(n) => {
            let credits = clamp_credits(n.clamp(0, u32::MAX as i64) as u32);
            (credits, credits as i64 != n || end != raw.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{CatalogGroup, CatalogModule, OVERALL_GROUP_NAME};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn rows() -> Vec<GradeRow> {
        vec![
            GradeRow::new("Algèbre", "M. Dupont", "", "", "10"),
            GradeRow::new("Analyse", "Mme Martin", "", "", "14"),
            GradeRow::new("Réseaux", "M. Leroy", "", "", "8"),
        ]
    }

    fn config() -> Config {
        Config {
            catalog: GroupCatalog::new(vec![CatalogGroup {
                name: "UE Sciences".to_string(),
                modules: vec![
                    CatalogModule::new("Algèbre", 3),
                    CatalogModule::new("Analyse", 2),
                    CatalogModule::new("Réseaux", 5),
                ],
            }]),
            ..Config::default()
        }
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn recalculations(events: &[SessionEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Recalculated { .. }))
            .count()
    }

    #[test]
    fn test_end_to_end_overall_average() {
        let mut session = Session::new(&config());
        let result = session.load(&rows(), &[]).unwrap();

        assert!(approx(result.general_average(), 9.8));
        let ue = result.group("UE Sciences").unwrap();
        assert_eq!(ue.total_credits, 10);
        assert!(approx(ue.average, 9.8));
        assert!(approx(result.general_ue_average(), 9.8));
        assert_eq!(result.overall_group().unwrap().name, OVERALL_GROUP_NAME);
    }

    #[test]
    fn test_empty_feed_keeps_previous_result() {
        let mut session = Session::new(&config());
        session.load(&rows(), &[]).unwrap();
        let revision = session.revision();

        assert!(matches!(session.load(&[], &[]), Err(SessionError::EmptyFeed)));
        assert_eq!(session.revision(), revision);
        assert_eq!(session.snapshot().module_count(), 3);
    }

    #[test]
    fn test_retake_overlay_on_load() {
        let mut session = Session::new(&Config::default());
        let rows = vec![GradeRow::new("Algèbre", "", "", "", "6")];
        let retakes = vec![RetakeRow::new("Algèbre", &["", "14"])];
        let result = session.load(&rows, &retakes).unwrap();

        let algebre = &result.modules[0];
        assert!(algebre.has_retake);
        assert_eq!(algebre.exam_score, Some(14.0));
        assert_eq!(algebre.average, Some(14.0));
    }

    #[test]
    fn test_exam_edit_clears_retake() {
        let mut session = Session::new(&Config::default());
        let rows = vec![GradeRow::new("Algèbre", "", "", "", "6")];
        let retakes = vec![RetakeRow::new("Algèbre", &["", "14"])];
        session.load(&rows, &retakes).unwrap();

        let outcome = session.submit_edit(ModuleId(0), EditField::Exam, "11", Instant::now());
        assert_eq!(outcome, EditOutcome::Applied);
        session.flush();

        let algebre = &session.snapshot().modules[0];
        assert!(!algebre.has_retake);
        assert_eq!(algebre.retake_score, None);
        assert_eq!(algebre.exam_score, Some(11.0));
        assert_eq!(algebre.average, Some(11.0));
    }

    #[test]
    fn test_five_edits_one_recalculation() {
        let mut session = Session::new(&config());
        session.load(&rows(), &[]).unwrap();
        let mut rx = session.subscribe();
        let start = Instant::now();
        let id = ModuleId(0);

        for (i, raw) in ["11", "12", "13", "14", "15"].iter().enumerate() {
            let now = start + Duration::from_millis(100 * i as u64);
            assert_eq!(session.submit_edit(id, EditField::Exam, raw, now), EditOutcome::Applied);
            assert!(!session.poll(now));
        }

        let last_edit = start + Duration::from_millis(400);
        assert!(!session.poll(last_edit + Duration::from_millis(499)));
        assert!(session.poll(last_edit + Duration::from_millis(500)));
        assert!(!session.poll(last_edit + Duration::from_secs(10)));

        assert_eq!(recalculations(&drain(&mut rx)), 1);
        assert_eq!(session.snapshot().modules[0].average, Some(15.0));
    }

    #[test]
    fn test_rejected_score_edit_flags_input() {
        let mut session = Session::new(&config());
        session.load(&rows(), &[]).unwrap();
        let mut rx = session.subscribe();
        let now = Instant::now();

        let outcome = session.submit_edit(ModuleId(1), EditField::Cc, "25", now);
        assert!(matches!(outcome, EditOutcome::Rejected { .. }));
        assert_eq!(session.records()[1].cc_score, None);
        assert!(session.is_invalid(ModuleId(1), EditField::Cc));
        assert!(!session.has_pending());
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice { level: NoticeLevel::Warning, .. })));

        let outcome = session.submit_edit(ModuleId(1), EditField::Cc, "abc", now);
        assert!(matches!(outcome, EditOutcome::Rejected { .. }));

        assert_eq!(session.submit_edit(ModuleId(1), EditField::Cc, "12,5", now), EditOutcome::Applied);
        assert!(!session.is_invalid(ModuleId(1), EditField::Cc));
        assert_eq!(session.records()[1].cc_score, Some(12.5));
    }

    #[test]
    fn test_clearing_exam_removes_average() {
        let mut session = Session::new(&config());
        session.load(&rows(), &[]).unwrap();
        assert_eq!(session.submit_edit(ModuleId(0), EditField::Exam, "-", Instant::now()), EditOutcome::Applied);
        session.flush();
        assert_eq!(session.snapshot().modules[0].average, None);
        // remaining: (14*2 + 8*5) / 7
        assert!(approx(session.snapshot().general_average(), 68.0 / 7.0));
    }

    #[test]
    fn test_credit_edits_are_clamped() {
        let mut session = Session::new(&config());
        session.load(&rows(), &[]).unwrap();
        let now = Instant::now();

        assert_eq!(session.submit_edit(ModuleId(0), EditField::Credits, "4", now), EditOutcome::Applied);
        assert_eq!(
            session.submit_edit(ModuleId(0), EditField::Credits, "35", now),
            EditOutcome::Clamped { credits: 20 }
        );
        assert_eq!(
            session.submit_edit(ModuleId(0), EditField::Credits, "zero", now),
            EditOutcome::Clamped { credits: 1 }
        );
        assert_eq!(
            session.submit_edit(ModuleId(0), EditField::Credits, "0", now),
            EditOutcome::Clamped { credits: 1 }
        );
        assert_eq!(session.records()[0].credits, 1);
    }

    #[test]
    fn test_edit_on_overall_row_is_rejected() {
        let mut session = Session::new(&config());
        session.load(&rows(), &[]).unwrap();
        let overall_id = ModuleId(3);
        assert!(session.snapshot().module(overall_id).unwrap().is_aggregate);

        let outcome = session.submit_edit(overall_id, EditField::Exam, "12", Instant::now());
        assert!(matches!(outcome, EditOutcome::Rejected { .. }));
        let outcome = session.submit_edit(ModuleId(42), EditField::Exam, "12", Instant::now());
        assert!(matches!(outcome, EditOutcome::Rejected { .. }));
    }

    #[test]
    fn test_merge_then_split_restores_singletons() {
        let mut session = Session::new(&Config::default());
        session.load(&rows(), &[]).unwrap();
        let before = session.snapshot().groups.clone();

        let merged = session.request_merge("Algèbre", "Analyse").unwrap();
        assert_eq!(merged.name, "Algèbre + Analyse");
        assert_eq!(merged.member_names(), vec!["Algèbre", "Analyse"]);
        assert!(approx(merged.average, 12.0));
        assert_eq!(session.catalog().groups.len(), 1);

        let landed = session.request_split("Algèbre + Analyse").unwrap();
        assert_eq!(landed, vec!["Algèbre".to_string(), "Analyse".to_string()]);
        assert!(session.catalog().is_empty());
        assert_eq!(session.snapshot().groups, before);
    }

    #[test]
    fn test_merge_flushes_pending_edit_and_refuses_overall() {
        let mut session = Session::new(&config());
        session.load(&rows(), &[]).unwrap();
        session.submit_edit(ModuleId(2), EditField::Exam, "18", Instant::now());

        let err = session.request_merge(OVERALL_GROUP_NAME, "UE Sciences").unwrap_err();
        assert!(matches!(err, SessionError::Grade(GradeError::AggregateRecord(_))));
        assert!(!session.has_pending());
        assert_eq!(session.snapshot().modules[2].average, Some(18.0));
    }

    #[test]
    fn test_export_reads_flushed_snapshot() {
        let mut session = Session::new(&config());
        session.load(&rows(), &[]).unwrap();
        session.submit_edit(ModuleId(0), EditField::Exam, "20", Instant::now());

        let csv = session.request_export(ExportFormat::Csv).unwrap();
        assert!(csv.contains("Individuel,Algèbre,M. Dupont,,,20,3,\"20,00\""));
        assert!(!session.has_pending());
    }

    #[test]
    fn test_closed_subscriber_is_dropped() {
        let mut session = Session::new(&config());
        let rx = session.subscribe();
        drop(rx);
        let mut live = session.subscribe();
        session.load(&rows(), &[]).unwrap();
        assert_eq!(session.subscribers.len(), 1);
        assert_eq!(recalculations(&drain(&mut live)), 1);
    }

    #[test]
    fn test_parse_credits() {
        assert_eq!(parse_credits("3"), (3, false));
        assert_eq!(parse_credits(" 3 "), (3, false));
        assert_eq!(parse_credits("3.5"), (3, true));
        assert_eq!(parse_credits(""), (1, true));
        assert_eq!(parse_credits("-4"), (1, true));
        assert_eq!(parse_credits("99"), (20, true));
    }
}
