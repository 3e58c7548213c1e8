//! Role-aware entry points for enrollment and sitting administration.
//!
//! Every path into a roster goes through [`Sitting::enroll`], so the
//! prerequisite check applies whoever the caller is. The role only decides
//! which operations are allowed and what ends up in the receipt.

use crate::core::plan::CurriculumPlan;
use crate::core::roster::{CourseOffering, ExamInstance, Sitting};
use crate::domain::model::{CompletionRecord, SittingId, StudentId, UnitId};
use crate::utils::error::{EnrollError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Secretary,
    Coordinator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Student => "student",
            Role::Secretary => "secretary",
            Role::Coordinator => "coordinator",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub role: Role,
    pub name: String,
    /// Set for students; they may only act on their own id.
    pub student: Option<StudentId>,
}

impl Caller {
    pub fn student(id: StudentId) -> Self {
        Self {
            role: Role::Student,
            name: id.to_string(),
            student: Some(id),
        }
    }

    pub fn secretary(name: impl Into<String>) -> Self {
        Self {
            role: Role::Secretary,
            name: name.into(),
            student: None,
        }
    }

    pub fn coordinator(name: impl Into<String>) -> Self {
        Self {
            role: Role::Coordinator,
            name: name.into(),
            student: None,
        }
    }

    fn forbidden(&self, action: &str) -> EnrollError {
        EnrollError::Forbidden {
            role: self.role.to_string(),
            actor: self.name.clone(),
            action: action.to_string(),
        }
    }

    fn require(&self, allowed: &[Role], action: &str) -> Result<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(self.forbidden(action))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnrollmentRequest<'r> {
    pub student: StudentId,
    pub record: &'r CompletionRecord,
    /// Asks to skip the prerequisite check. No role is granted this.
    pub override_eligibility: bool,
}

impl<'r> EnrollmentRequest<'r> {
    pub fn new(student: StudentId, record: &'r CompletionRecord) -> Self {
        Self {
            student,
            record,
            override_eligibility: false,
        }
    }

    pub fn with_override(mut self) -> Self {
        self.override_eligibility = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterAction {
    Enrolled,
    Withdrawn,
}

impl fmt::Display for RosterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterAction::Enrolled => f.write_str("enrolled"),
            RosterAction::Withdrawn => f.write_str("withdrawn"),
        }
    }
}

/// Audit entry for an accepted roster change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentReceipt {
    pub action: RosterAction,
    pub student: StudentId,
    pub unit: UnitId,
    pub sitting: SittingId,
    pub actor_role: Role,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// Stateless coordinator. Holds nothing between calls; rosters are passed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrollmentEngine;

impl EnrollmentEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn enroll<S: Sitting + ?Sized>(
        &self,
        caller: &Caller,
        request: EnrollmentRequest<'_>,
        sitting: &mut S,
    ) -> Result<EnrollmentReceipt> {
        match caller.role {
            Role::Student => {
                if request.override_eligibility {
                    return Err(EnrollError::UnauthorizedSelfOverride {
                        student: request.student,
                    });
                }
                if caller.student != Some(request.student) {
                    return Err(caller.forbidden("enroll another student"));
                }
            }
            Role::Secretary => {
                if request.override_eligibility {
                    return Err(caller.forbidden("override prerequisite eligibility"));
                }
            }
            Role::Coordinator => return Err(caller.forbidden("enroll students")),
        }

        match sitting.enroll(request.student, request.record) {
            Ok(()) => {
                tracing::info!(
                    "{} {} enrolled student {} in {}",
                    caller.role,
                    caller.name,
                    request.student,
                    sitting.sitting_id()
                );
                Ok(receipt(caller, RosterAction::Enrolled, request.student, sitting))
            }
            Err(e) => {
                tracing::warn!(
                    "Enrollment of {} in {} rejected: {}",
                    request.student,
                    sitting.sitting_id(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Withdrawal needs no eligibility check and never cascades to units
    /// that depend on this one.
    pub fn withdraw<S: Sitting + ?Sized>(
        &self,
        caller: &Caller,
        student: StudentId,
        sitting: &mut S,
    ) -> Result<EnrollmentReceipt> {
        caller.require(&[Role::Student, Role::Secretary], "withdraw students")?;
        if caller.role == Role::Student && caller.student != Some(student) {
            return Err(caller.forbidden("withdraw another student"));
        }

        sitting.withdraw(student).inspect_err(|e| {
            tracing::warn!("Withdrawal of {} from {} rejected: {}", student, sitting.sitting_id(), e);
        })?;

        tracing::info!(
            "{} {} withdrew student {} from {}",
            caller.role,
            caller.name,
            student,
            sitting.sitting_id()
        );
        Ok(receipt(caller, RosterAction::Withdrawn, student, sitting))
    }

    pub fn open<S: Sitting + ?Sized>(&self, caller: &Caller, sitting: &mut S) -> Result<()> {
        caller.require(&[Role::Coordinator], "open sittings")?;
        sitting.roster_mut().set_open(true);
        tracing::info!("{} opened {}", caller.name, sitting.sitting_id());
        Ok(())
    }

    pub fn close<S: Sitting + ?Sized>(&self, caller: &Caller, sitting: &mut S) -> Result<()> {
        caller.require(&[Role::Coordinator], "close sittings")?;
        sitting.roster_mut().set_open(false);
        tracing::info!("{} closed {}", caller.name, sitting.sitting_id());
        Ok(())
    }

    pub fn set_capacity<S: Sitting + ?Sized>(
        &self,
        caller: &Caller,
        sitting: &mut S,
        capacity: Option<usize>,
    ) -> Result<()> {
        caller.require(&[Role::Coordinator], "change capacity")?;
        sitting.roster_mut().set_capacity(capacity)?;
        tracing::info!(
            "{} set capacity of {} to {:?}",
            caller.name,
            sitting.sitting_id(),
            capacity
        );
        Ok(())
    }

    pub fn create_offering(
        &self,
        caller: &Caller,
        plan: &Arc<CurriculumPlan>,
        unit: UnitId,
        year: i32,
        semester: u8,
        capacity: Option<usize>,
    ) -> Result<CourseOffering> {
        caller.require(&[Role::Coordinator], "create course offerings")?;
        CourseOffering::new(Arc::clone(plan), unit, year, semester, capacity)
    }

    pub fn create_exam(
        &self,
        caller: &Caller,
        plan: &Arc<CurriculumPlan>,
        unit: UnitId,
        sitting_at: NaiveDateTime,
        attempt: u32,
    ) -> Result<ExamInstance> {
        caller.require(&[Role::Coordinator], "create exam sittings")?;
        ExamInstance::new(Arc::clone(plan), unit, sitting_at, attempt)
    }
}

fn receipt<S: Sitting + ?Sized>(
    caller: &Caller,
    action: RosterAction,
    student: StudentId,
    sitting: &S,
) -> EnrollmentReceipt {
    EnrollmentReceipt {
        action,
        student,
        unit: sitting.unit_id().clone(),
        sitting: sitting.sitting_id().clone(),
        actor_role: caller.role,
        actor: caller.name.clone(),
        at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn plan() -> Arc<CurriculumPlan> {
        let json = r#"{
            "id": "plan-2024",
            "year": 2024,
            "units": [
                {"id": "A", "name": "Algebra", "credits": 8},
                {"id": "B", "name": "Calculus", "credits": 10, "prerequisites": ["A"]}
            ]
        }"#;
        Arc::new(CurriculumPlan::from_json_str(json).unwrap())
    }

    fn offering_b(engine: &EnrollmentEngine) -> CourseOffering {
        engine
            .create_offering(
                &Caller::coordinator("Laura"),
                &plan(),
                UnitId::from("B"),
                2024,
                1,
                Some(2),
            )
            .unwrap()
    }

    fn passed_a() -> CompletionRecord {
        let mut record = CompletionRecord::new();
        record.mark_passed("A");
        record
    }

    #[test]
    fn test_student_enrolls_self() {
        let engine = EnrollmentEngine::new();
        let mut offering = offering_b(&engine);
        let s1 = StudentId::new(1);
        let record = passed_a();

        let receipt = engine
            .enroll(&Caller::student(s1), EnrollmentRequest::new(s1, &record), &mut offering)
            .unwrap();

        assert_eq!(receipt.action, RosterAction::Enrolled);
        assert_eq!(receipt.actor_role, Role::Student);
        assert_eq!(receipt.sitting.as_str(), "B-2024-S1");
        assert!(offering.roster().contains(&s1));
    }

    #[test]
    fn test_student_override_is_rejected() {
        let engine = EnrollmentEngine::new();
        let mut offering = offering_b(&engine);
        let s1 = StudentId::new(1);
        let record = CompletionRecord::new();

        let result = engine.enroll(
            &Caller::student(s1),
            EnrollmentRequest::new(s1, &record).with_override(),
            &mut offering,
        );
        assert!(matches!(result, Err(EnrollError::UnauthorizedSelfOverride { .. })));
        assert!(offering.roster().is_empty());
    }

    #[test]
    fn test_student_cannot_act_for_others() {
        let engine = EnrollmentEngine::new();
        let mut offering = offering_b(&engine);
        let record = passed_a();

        let result = engine.enroll(
            &Caller::student(StudentId::new(1)),
            EnrollmentRequest::new(StudentId::new(2), &record),
            &mut offering,
        );
        assert!(matches!(result, Err(EnrollError::Forbidden { .. })));
    }

    #[test]
    fn test_secretary_still_needs_eligibility() {
        let engine = EnrollmentEngine::new();
        let mut offering = offering_b(&engine);
        let secretary = Caller::secretary("Marta");
        let s2 = StudentId::new(2);
        let empty = CompletionRecord::new();

        let result = engine.enroll(&secretary, EnrollmentRequest::new(s2, &empty), &mut offering);
        assert!(matches!(result, Err(EnrollError::Eligibility { .. })));

        let result = engine.enroll(
            &secretary,
            EnrollmentRequest::new(s2, &empty).with_override(),
            &mut offering,
        );
        assert!(matches!(result, Err(EnrollError::Forbidden { .. })));

        let record = passed_a();
        let receipt = engine
            .enroll(&secretary, EnrollmentRequest::new(s2, &record), &mut offering)
            .unwrap();
        assert_eq!(receipt.actor, "Marta");
        assert_eq!(receipt.actor_role, Role::Secretary);
    }

    #[test]
    fn test_coordinator_administers_but_does_not_enroll() {
        let engine = EnrollmentEngine::new();
        let mut offering = offering_b(&engine);
        let coordinator = Caller::coordinator("Laura");
        let record = passed_a();

        assert!(matches!(
            engine.enroll(
                &coordinator,
                EnrollmentRequest::new(StudentId::new(1), &record),
                &mut offering
            ),
            Err(EnrollError::Forbidden { .. })
        ));

        engine.close(&coordinator, &mut offering).unwrap();
        let s1 = StudentId::new(1);
        assert!(matches!(
            engine.enroll(&Caller::student(s1), EnrollmentRequest::new(s1, &record), &mut offering),
            Err(EnrollError::OfferingClosed { .. })
        ));

        engine.open(&coordinator, &mut offering).unwrap();
        engine.set_capacity(&coordinator, &mut offering, Some(5)).unwrap();
        assert_eq!(offering.roster().capacity(), Some(5));

        assert!(matches!(
            engine.set_capacity(&Caller::secretary("Marta"), &mut offering, None),
            Err(EnrollError::Forbidden { .. })
        ));
        assert!(engine
            .create_offering(&Caller::student(s1), &plan(), UnitId::from("A"), 2024, 1, None)
            .is_err());
    }

    #[test]
    fn test_withdraw_paths() {
        let engine = EnrollmentEngine::new();
        let mut offering = offering_b(&engine);
        let s1 = StudentId::new(1);
        let record = passed_a();
        engine
            .enroll(&Caller::student(s1), EnrollmentRequest::new(s1, &record), &mut offering)
            .unwrap();

        assert!(matches!(
            engine.withdraw(&Caller::student(StudentId::new(9)), s1, &mut offering),
            Err(EnrollError::Forbidden { .. })
        ));
        assert!(matches!(
            engine.withdraw(&Caller::coordinator("Laura"), s1, &mut offering),
            Err(EnrollError::Forbidden { .. })
        ));

        let receipt = engine
            .withdraw(&Caller::secretary("Marta"), s1, &mut offering)
            .unwrap();
        assert_eq!(receipt.action, RosterAction::Withdrawn);
        assert!(matches!(
            engine.withdraw(&Caller::student(s1), s1, &mut offering),
            Err(EnrollError::NotEnrolled { .. })
        ));
    }

    #[test]
    fn test_exam_through_engine() {
        let engine = EnrollmentEngine::new();
        let at = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let mut exam = engine
            .create_exam(&Caller::coordinator("Laura"), &plan(), UnitId::from("B"), at, 1)
            .unwrap();

        let s1 = StudentId::new(1);
        let mut record = passed_a();
        record.mark_regular("B");
        let sitting: &mut dyn Sitting = &mut exam;
        engine
            .enroll(&Caller::student(s1), EnrollmentRequest::new(s1, &record), sitting)
            .unwrap();
        assert!(exam.roster().contains(&s1));
    }
}
