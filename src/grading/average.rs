use super::types::{GroupRecord, ModuleRecord, OVERALL_GROUP_NAME, OVERALL_MODULE_NAME};

/// Weights applied to (exam, cc, lab) depending on which of cc/lab exist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub exam: f64,
    pub cc: f64,
    pub lab: f64,
}

impl Coefficients {
    pub fn for_components(has_cc: bool, has_lab: bool) -> Self {
        match (has_cc, has_lab) {
            (false, false) => Coefficients { exam: 1.0, cc: 0.0, lab: 0.0 },
            (false, true) => Coefficients { exam: 0.8, cc: 0.0, lab: 0.2 },
            (true, false) => Coefficients { exam: 0.8, cc: 0.2, lab: 0.0 },
            (true, true) => Coefficients { exam: 0.5, cc: 0.2, lab: 0.3 },
        }
    }
}

/// Average of one module, `None` when the exam score is missing.
pub fn module_average(record: &ModuleRecord) -> Option<f64> {
    let exam = record.exam_score?;
    let coeffs = Coefficients::for_components(record.cc_score.is_some(), record.lab_score.is_some());
    let cc = record.cc_score.unwrap_or(0.0);
    let lab = record.lab_score.unwrap_or(0.0);
    Some(exam * coeffs.exam + cc * coeffs.cc + lab * coeffs.lab)
}

/// Credit-weighted sum over the graded records.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregate {
    pub weighted_score: f64,
    pub total_credits: u32,
}

impl Aggregate {
    /// 0 when nothing was graded.
    pub fn mean(&self) -> f64 {
        if self.total_credits == 0 {
            0.0
        } else {
            self.weighted_score / self.total_credits as f64
        }
    }

    pub fn add(&mut self, average: f64, credits: u32) {
        self.weighted_score += average * credits as f64;
        self.total_credits += credits;
    }
}

/// Aggregate `(average, credits)` pairs, skipping the ones without average.
pub fn aggregate<I>(items: I) -> Aggregate
where
    I: IntoIterator<Item = (Option<f64>, u32)>,
{
    let mut acc = Aggregate::default();
    for (average, credits) in items {
        if let Some(avg) = average {
            acc.add(avg, credits);
        }
    }
    acc
}

/// Recompute every module's average in place.
pub fn compute_module_averages(records: &mut [ModuleRecord]) {
    for record in records.iter_mut().filter(|r| !r.is_aggregate) {
        record.average = module_average(record);
    }
}

/// The synthetic overall record for a set of modules. Its credits are the
/// credits that took part in the average.
pub fn overall_module(records: &[ModuleRecord]) -> ModuleRecord {
    let acc = aggregate(
        records
            .iter()
            .filter(|r| !r.is_aggregate)
            .map(|r| (r.average, r.credits)),
    );
    let mut overall = ModuleRecord::new(OVERALL_MODULE_NAME, "", None, None, None, acc.total_credits);
    overall.average = Some(acc.mean());
    overall.is_aggregate = true;
    overall
}

/// The synthetic overall UE record. Graded groups count with the credits
/// that were actually graded; `total_credits` covers every group.
pub fn overall_group(groups: &[GroupRecord]) -> GroupRecord {
    let real = || groups.iter().filter(|g| !g.is_aggregate);
    let acc = aggregate(real().map(|g| {
        let average = g.is_graded().then_some(g.average);
        (average, g.graded_credits())
    }));
    let mut overall = GroupRecord::new(OVERALL_GROUP_NAME);
    overall.total_credits = real().map(|g| g.total_credits).sum();
    overall.weighted_score = acc.weighted_score;
    overall.average = acc.mean();
    overall.is_aggregate = true;
    overall
}

/// Replace any previous overall module record with a fresh one.
pub fn refresh_overall_module(records: &mut Vec<ModuleRecord>) {
    records.retain(|r| !r.is_aggregate);
    let overall = overall_module(records);
    records.push(overall);
}
