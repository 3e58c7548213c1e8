use crate::utils::error::{EnrollError, Result};
use crate::utils::validation::validate_non_empty_string;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UnitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// National identity number of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(u64);

impl StudentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl FromStr for StudentId {
    type Err = EnrollError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(StudentId)
            .map_err(|_| EnrollError::InvalidConfigValueError {
                field: "student_id".to_string(),
                value: s.to_string(),
                reason: "Student id must be an integer".to_string(),
            })
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a course offering or exam sitting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SittingId(String);

impl SittingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SittingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    #[default]
    Regular,
    FinalProject,
    Elective,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurricularUnit {
    pub id: UnitId,
    pub name: String,
    pub credits: u32,
    pub semester: Option<u8>,
    pub kind: UnitKind,
    pub(crate) prerequisites: BTreeSet<UnitId>,
    pub(crate) corequisites: BTreeSet<UnitId>,
}

impl CurricularUnit {
    pub fn prerequisite_ids(&self) -> &BTreeSet<UnitId> {
        &self.prerequisites
    }

    pub fn corequisite_ids(&self) -> &BTreeSet<UnitId> {
        &self.corequisites
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    #[default]
    #[serde(alias = "not-taken")]
    NotTaken,
    #[serde(alias = "in-progress")]
    InProgress,
    /// Coursework done, exam still pending.
    Regular,
    Passed,
}

/// A student's history against one plan. Units without an entry are
/// [`CompletionStatus::NotTaken`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionRecord {
    statuses: BTreeMap<UnitId, CompletionStatus>,
}

impl CompletionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn status(&self, unit: &UnitId) -> CompletionStatus {
        self.statuses.get(unit).copied().unwrap_or_default()
    }

    pub fn has_passed(&self, unit: &UnitId) -> bool {
        self.status(unit) == CompletionStatus::Passed
    }

    pub fn set_status(&mut self, unit: impl Into<UnitId>, status: CompletionStatus) {
        let unit = unit.into();
        if status == CompletionStatus::NotTaken {
            self.statuses.remove(&unit);
        } else {
            self.statuses.insert(unit, status);
        }
    }

    pub fn mark_passed(&mut self, unit: impl Into<UnitId>) {
        self.set_status(unit, CompletionStatus::Passed);
    }

    pub fn mark_regular(&mut self, unit: impl Into<UnitId>) {
        self.set_status(unit, CompletionStatus::Regular);
    }

    pub fn mark_in_progress(&mut self, unit: impl Into<UnitId>) {
        self.set_status(unit, CompletionStatus::InProgress);
    }

    pub fn clear(&mut self, unit: impl Into<UnitId>) {
        self.set_status(unit, CompletionStatus::NotTaken);
    }

    /// Copies every entry of `other` over this record.
    pub fn merge(&mut self, other: &CompletionRecord) {
        for (unit, status) in &other.statuses {
            self.statuses.insert(unit.clone(), *status);
        }
    }

    pub fn passed(&self) -> impl Iterator<Item = &UnitId> {
        self.statuses
            .iter()
            .filter(|(_, status)| **status == CompletionStatus::Passed)
            .map(|(unit, _)| unit)
    }
}

impl<U: Into<UnitId>> FromIterator<(U, CompletionStatus)> for CompletionRecord {
    fn from_iter<I: IntoIterator<Item = (U, CompletionStatus)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (unit, status) in iter {
            record.set_status(unit, status);
        }
        record
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub admission_year: i32,
    pub plan_id: String,
}

impl Student {
    pub fn new(
        id: StudentId,
        first_name: &str,
        last_name: &str,
        admission_year: i32,
        plan_id: impl Into<String>,
    ) -> Result<Self> {
        validate_non_empty_string("first_name", first_name)?;
        validate_non_empty_string("last_name", last_name)?;

        Ok(Self {
            id,
            first_name: title_case(first_name),
            last_name: title_case(last_name),
            admission_year,
            plan_id: plan_id.into(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.full_name(), self.id)
    }
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
