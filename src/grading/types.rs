use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Label of the synthetic record holding the credit-weighted module average.
pub const OVERALL_MODULE_NAME: &str = "Moyenne Générale Individuelle";

/// Label of the synthetic group holding the credit-weighted UE average.
pub const OVERALL_GROUP_NAME: &str = "Moyenne Générale UE";

/// Position of a module inside a [`ResultSet`] (stable between
/// recalculations of the same load).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub usize);

/// Raw row of the main grades feed, cells exactly as extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeRow {
    pub designation: String,
    pub teacher: String,
    pub cc: String,
    pub lab: String,
    pub exam: String,
}

impl GradeRow {
    pub fn new(designation: &str, teacher: &str, cc: &str, lab: &str, exam: &str) -> Self {
        Self {
            designation: designation.to_string(),
            teacher: teacher.to_string(),
            cc: cc.to_string(),
            lab: lab.to_string(),
            exam: exam.to_string(),
        }
    }
}

/// Raw row of the retake feed: a designation and the candidate score cells
/// that follow it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetakeRow {
    pub designation: String,
    pub cells: Vec<String>,
}

impl RetakeRow {
    pub fn new(designation: &str, cells: &[&str]) -> Self {
        Self {
            designation: designation.to_string(),
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// One row of the grades table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRecord {
    pub designation: String,
    pub teacher: String,
    pub cc_score: Option<f64>,
    pub lab_score: Option<f64>,
    pub exam_score: Option<f64>,
    pub retake_score: Option<f64>,
    pub has_retake: bool,
    pub credits: u32,
    /// Derived; `None` exactly when the exam score is missing.
    pub average: Option<f64>,
    pub is_aggregate: bool,
}

impl ModuleRecord {
    pub fn new(
        designation: impl Into<String>,
        teacher: impl Into<String>,
        cc_score: Option<f64>,
        lab_score: Option<f64>,
        exam_score: Option<f64>,
        credits: u32,
    ) -> Self {
        Self {
            designation: designation.into(),
            teacher: teacher.into(),
            cc_score,
            lab_score,
            exam_score,
            retake_score: None,
            has_retake: false,
            credits,
            average: None,
            is_aggregate: false,
        }
    }
}

/// A UE: modules averaged together with their credits as weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub name: String,
    pub members: Vec<ModuleRecord>,
    pub total_credits: u32,
    pub weighted_score: f64,
    pub average: f64,
    pub is_aggregate: bool,
}

impl GroupRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            total_credits: 0,
            weighted_score: 0.0,
            average: 0.0,
            is_aggregate: false,
        }
    }

    pub fn singleton(module: ModuleRecord) -> Self {
        let mut group = Self::new(module.designation.clone());
        group.members.push(module);
        group.recompute();
        group
    }

    /// Refresh credits, weighted score and average from the members.
    pub fn recompute(&mut self) {
        self.total_credits = self.members.iter().map(|m| m.credits).sum();
        self.weighted_score = self
            .members
            .iter()
            .filter_map(|m| m.average.map(|avg| avg * m.credits as f64))
            .sum();
        let graded = self.graded_credits();
        self.average = if graded > 0 {
            self.weighted_score / graded as f64
        } else {
            0.0
        };
    }

    /// Credits of the members that have an average.
    pub fn graded_credits(&self) -> u32 {
        self.members
            .iter()
            .filter(|m| m.average.is_some())
            .map(|m| m.credits)
            .sum()
    }

    pub fn is_graded(&self) -> bool {
        self.members.iter().any(|m| m.average.is_some())
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.designation.as_str()).collect()
    }
}

/// Everything the rendering and export layers read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Module rows in source order, followed by the overall record.
    pub modules: Vec<ModuleRecord>,
    /// Groups in assignment order, followed by the overall UE record when
    /// a catalog is configured.
    pub groups: Vec<GroupRecord>,
    /// Incremented on every recalculation.
    pub revision: u64,
}

impl ResultSet {
    pub fn overall_module(&self) -> Option<&ModuleRecord> {
        self.modules.iter().find(|m| m.is_aggregate)
    }

    pub fn overall_group(&self) -> Option<&GroupRecord> {
        self.groups.iter().find(|g| g.is_aggregate)
    }

    pub fn general_average(&self) -> f64 {
        self.overall_module().and_then(|m| m.average).unwrap_or(0.0)
    }

    pub fn general_ue_average(&self) -> f64 {
        self.overall_group().map(|g| g.average).unwrap_or(0.0)
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(id.0)
    }

    pub fn group(&self, name: &str) -> Option<&GroupRecord> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn module_count(&self) -> usize {
        self.modules.iter().filter(|m| !m.is_aggregate).count()
    }

    pub fn group_count(&self) -> usize {
        self.groups.iter().filter(|g| !g.is_aggregate).count()
    }

    /// Name of the group that currently holds the module.
    pub fn group_of(&self, designation: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.members.iter().any(|m| m.designation == designation))
            .map(|g| g.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Serializes groups as a name-keyed object, keeping assignment order.
pub struct GroupMap<'a>(pub &'a [GroupRecord]);

impl Serialize for GroupMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for group in self.0 {
            map.serialize_entry(&group.name, group)?;
        }
        map.end()
    }
}
