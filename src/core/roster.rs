use crate::core::plan::{CurriculumPlan, Eligibility};
use crate::domain::model::{CompletionRecord, CompletionStatus, SittingId, StudentId, UnitId};
use crate::utils::error::{EnrollError, Result};
use crate::utils::validation::{validate_positive_number, validate_range};
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Earliest academic year a course offering may be created for.
pub const MIN_OFFERING_YEAR: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SittingKind {
    Course,
    Exam,
}

impl SittingKind {
    /// Roster status written to exports.
    pub fn roster_status(&self) -> &'static str {
        match self {
            SittingKind::Course => "enrolled",
            SittingKind::Exam => "registered",
        }
    }
}

/// Set of students in one offering or sitting. Holds the at-most-once and
/// capacity invariants; all checks run before the single insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    sitting: SittingId,
    students: BTreeSet<StudentId>,
    capacity: Option<usize>,
    open: bool,
}

impl Roster {
    pub fn new(sitting: SittingId, capacity: Option<usize>) -> Self {
        Self {
            sitting,
            students: BTreeSet::new(),
            capacity,
            open: true,
        }
    }

    pub fn students(&self) -> impl Iterator<Item = &StudentId> {
        self.students.iter()
    }

    pub fn contains(&self, student: &StudentId) -> bool {
        self.students.contains(student)
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|capacity| self.students.len() >= capacity)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub(crate) fn set_capacity(&mut self, capacity: Option<usize>) -> Result<()> {
        if let Some(requested) = capacity {
            if requested < self.students.len() {
                return Err(EnrollError::CapacityBelowRoster {
                    sitting: self.sitting.clone(),
                    requested,
                    enrolled: self.students.len(),
                });
            }
        }
        self.capacity = capacity;
        Ok(())
    }

    fn admit(&mut self, student: StudentId) -> Result<()> {
        if self.students.contains(&student) {
            return Err(EnrollError::AlreadyEnrolled {
                student,
                sitting: self.sitting.clone(),
            });
        }
        if let Some(capacity) = self.capacity.filter(|_| self.is_full()) {
            return Err(EnrollError::Capacity {
                sitting: self.sitting.clone(),
                capacity,
            });
        }
        self.students.insert(student);
        Ok(())
    }

    fn remove(&mut self, student: StudentId) -> Result<()> {
        if self.students.remove(&student) {
            Ok(())
        } else {
            Err(EnrollError::NotEnrolled {
                student,
                sitting: self.sitting.clone(),
            })
        }
    }
}

/// A concrete, time-bound instance of a unit that students join.
pub trait Sitting {
    fn kind(&self) -> SittingKind;
    fn sitting_id(&self) -> &SittingId;
    fn unit_id(&self) -> &UnitId;
    fn plan(&self) -> &CurriculumPlan;
    fn roster(&self) -> &Roster;
    fn roster_mut(&mut self) -> &mut Roster;

    /// Extra per-kind rule checked after prerequisites and before the roster.
    fn check_status(&self, _student: StudentId, _record: &CompletionRecord) -> Result<()> {
        Ok(())
    }

    /// Adds `student` if every precondition holds; on error nothing changes.
    fn enroll(&mut self, student: StudentId, record: &CompletionRecord) -> Result<()> {
        if !self.roster().is_open() {
            return Err(EnrollError::OfferingClosed {
                sitting: self.sitting_id().clone(),
            });
        }

        let unit = self.unit_id().clone();
        if let Eligibility::Missing(missing) = self.plan().check_eligibility(&unit, record)? {
            return Err(EnrollError::Eligibility {
                student,
                unit,
                missing,
            });
        }
        if record.has_passed(&unit) {
            return Err(EnrollError::AlreadyPassed { student, unit });
        }
        self.check_status(student, record)?;

        self.roster_mut().admit(student)
    }

    /// Removes `student`. Dependent enrollments elsewhere are left alone.
    fn withdraw(&mut self, student: StudentId) -> Result<()> {
        self.roster_mut().remove(student)
    }
}

#[derive(Debug, Clone)]
pub struct CourseOffering {
    plan: Arc<CurriculumPlan>,
    unit: UnitId,
    year: i32,
    semester: u8,
    roster: Roster,
}

impl CourseOffering {
    pub fn new(
        plan: Arc<CurriculumPlan>,
        unit: UnitId,
        year: i32,
        semester: u8,
        capacity: Option<usize>,
    ) -> Result<Self> {
        validate_range("year", year, MIN_OFFERING_YEAR, i32::MAX)?;
        validate_range("semester", semester, 1, 10)?;

        let declared = plan.unit(&unit)?.semester;
        if let Some(declared) = declared.filter(|declared| *declared != semester) {
            return Err(EnrollError::InvalidConfigValueError {
                field: "semester".to_string(),
                value: semester.to_string(),
                reason: format!("unit {} is taught in semester {}", unit, declared),
            });
        }

        let sitting = SittingId::new(format!("{}-{}-S{}", unit, year, semester));
        tracing::debug!("Created course offering {}", sitting);

        Ok(Self {
            plan,
            unit,
            year,
            semester,
            roster: Roster::new(sitting, capacity),
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn semester(&self) -> u8 {
        self.semester
    }

    pub fn unit_name(&self) -> &str {
        self.plan
            .unit(&self.unit)
            .map(|unit| unit.name.as_str())
            .unwrap_or_default()
    }
}

impl Sitting for CourseOffering {
    fn kind(&self) -> SittingKind {
        SittingKind::Course
    }

    fn sitting_id(&self) -> &SittingId {
        &self.roster.sitting
    }

    fn unit_id(&self) -> &UnitId {
        &self.unit
    }

    fn plan(&self) -> &CurriculumPlan {
        &self.plan
    }

    fn roster(&self) -> &Roster {
        &self.roster
    }

    fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    fn check_status(&self, student: StudentId, record: &CompletionRecord) -> Result<()> {
        if record.status(&self.unit) == CompletionStatus::InProgress {
            return Err(EnrollError::AlreadyInProgress {
                student,
                unit: self.unit.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ExamInstance {
    plan: Arc<CurriculumPlan>,
    unit: UnitId,
    sitting_at: NaiveDateTime,
    attempt: u32,
    require_regular: bool,
    roster: Roster,
}

impl ExamInstance {
    pub fn new(
        plan: Arc<CurriculumPlan>,
        unit: UnitId,
        sitting_at: NaiveDateTime,
        attempt: u32,
    ) -> Result<Self> {
        validate_positive_number("attempt", attempt as usize, 1)?;
        plan.unit(&unit)?;

        let sitting = SittingId::new(format!(
            "{}-{}-A{}",
            unit,
            sitting_at.format("%Y-%m-%d"),
            attempt
        ));
        tracing::debug!("Created exam sitting {} at {}", sitting, sitting_at);

        Ok(Self {
            plan,
            unit,
            sitting_at,
            attempt,
            require_regular: true,
            roster: Roster::new(sitting, None),
        })
    }

    /// Only students whose status for the unit is `Regular` may register.
    /// On by default; pass `false` for sittings open to free examinees.
    pub fn with_regular_requirement(mut self, require_regular: bool) -> Self {
        self.require_regular = require_regular;
        self
    }

    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.roster.capacity = capacity;
        self
    }

    pub fn sitting_at(&self) -> NaiveDateTime {
        self.sitting_at
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn requires_regular(&self) -> bool {
        self.require_regular
    }
}

impl Sitting for ExamInstance {
    fn kind(&self) -> SittingKind {
        SittingKind::Exam
    }

    fn sitting_id(&self) -> &SittingId {
        &self.roster.sitting
    }

    fn unit_id(&self) -> &UnitId {
        &self.unit
    }

    fn plan(&self) -> &CurriculumPlan {
        &self.plan
    }

    fn roster(&self) -> &Roster {
        &self.roster
    }

    fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    fn check_status(&self, student: StudentId, record: &CompletionRecord) -> Result<()> {
        if self.require_regular && record.status(&self.unit) != CompletionStatus::Regular {
            return Err(EnrollError::NotRegular {
                student,
                unit: self.unit.clone(),
            });
        }
        Ok(())
    }
}
