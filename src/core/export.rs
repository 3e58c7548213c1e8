use crate::core::engine::EnrollmentReceipt;
use crate::core::roster::Sitting;
use crate::utils::error::{EnrollError, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterRow {
    pub student_id: u64,
    pub unit_id: String,
    pub sitting_id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
struct ReceiptRow<'a> {
    at: String,
    actor_role: String,
    actor: &'a str,
    action: String,
    student_id: u64,
    unit_id: &'a str,
    sitting_id: &'a str,
}

/// One row per student, in student id order.
pub fn roster_rows(sitting: &dyn Sitting) -> Vec<RosterRow> {
    let status = sitting.kind().roster_status();
    sitting
        .roster()
        .students()
        .map(|student| RosterRow {
            student_id: student.value(),
            unit_id: sitting.unit_id().to_string(),
            sitting_id: sitting.sitting_id().to_string(),
            status,
        })
        .collect()
}

pub fn write_rosters_csv<W: Write>(writer: W, sittings: &[&dyn Sitting]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(["student_id", "unit_id", "sitting_id", "status"])?;

    let mut rows = 0usize;
    for sitting in sittings {
        for row in roster_rows(*sitting) {
            csv_writer.serialize(&row)?;
            rows += 1;
        }
    }

    csv_writer.flush()?;
    tracing::debug!("Wrote {} roster rows for {} sittings", rows, sittings.len());
    Ok(())
}

pub fn rosters_to_csv_string(sittings: &[&dyn Sitting]) -> Result<String> {
    let mut buffer = Vec::new();
    write_rosters_csv(&mut buffer, sittings)?;
    into_utf8(buffer)
}

pub fn write_receipts_csv<W: Write>(writer: W, receipts: &[EnrollmentReceipt]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for receipt in receipts {
        csv_writer.serialize(ReceiptRow {
            at: receipt.at.to_rfc3339(),
            actor_role: receipt.actor_role.to_string(),
            actor: &receipt.actor,
            action: receipt.action.to_string(),
            student_id: receipt.student.value(),
            unit_id: receipt.unit.as_str(),
            sitting_id: receipt.sitting.as_str(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn receipts_to_csv_string(receipts: &[EnrollmentReceipt]) -> Result<String> {
    let mut buffer = Vec::new();
    write_receipts_csv(&mut buffer, receipts)?;
    into_utf8(buffer)
}

fn into_utf8(buffer: Vec<u8>) -> Result<String> {
    String::from_utf8(buffer).map_err(|e| EnrollError::InvalidConfigValueError {
        field: "csv_output".to_string(),
        value: String::new(),
        reason: format!("CSV output is not valid UTF-8: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::{Caller, EnrollmentEngine, EnrollmentRequest};
    use crate::core::plan::CurriculumPlan;
    use crate::core::roster::{CourseOffering, ExamInstance};
    use crate::domain::model::{CompletionRecord, StudentId, UnitId};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn plan() -> Arc<CurriculumPlan> {
        let json = r#"{"id": "p", "year": 2024, "units": [{"id": "A", "name": "Algebra", "credits": 8}]}"#;
        Arc::new(CurriculumPlan::from_json_str(json).unwrap())
    }

    #[test]
    fn test_roster_csv_lists_course_and_exam() {
        let plan = plan();
        let record = CompletionRecord::new();
        let mut regular = CompletionRecord::new();
        regular.mark_regular("A");
        let mut course = CourseOffering::new(Arc::clone(&plan), UnitId::from("A"), 2024, 1, None).unwrap();
        let at = NaiveDate::from_ymd_opt(2024, 12, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut exam = ExamInstance::new(Arc::clone(&plan), UnitId::from("A"), at, 1).unwrap();

        course.enroll(StudentId::new(20), &record).unwrap();
        course.enroll(StudentId::new(10), &record).unwrap();
        exam.enroll(StudentId::new(10), &regular).unwrap();

        let csv = rosters_to_csv_string(&[&course, &exam]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "student_id,unit_id,sitting_id,status",
                "10,A,A-2024-S1,enrolled",
                "20,A,A-2024-S1,enrolled",
                "10,A,A-2024-12-01-A1,registered",
            ]
        );
        // Export is a pure read.
        assert_eq!(course.roster().len(), 2);
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let csv = rosters_to_csv_string(&[]).unwrap();
        assert_eq!(csv, "student_id,unit_id,sitting_id,status\n");
    }

    #[test]
    fn test_receipts_csv() {
        let engine = EnrollmentEngine::new();
        let mut course = CourseOffering::new(plan(), UnitId::from("A"), 2024, 1, None).unwrap();
        let s1 = StudentId::new(5);
        let record = CompletionRecord::new();
        let receipt = engine
            .enroll(&Caller::student(s1), EnrollmentRequest::new(s1, &record), &mut course)
            .unwrap();

        let csv = receipts_to_csv_string(&[receipt]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("at,actor_role,actor,action,student_id,unit_id,sitting_id")
        );
        assert!(lines.next().unwrap().ends_with(",student,5,enrolled,5,A,A-2024-S1"));
    }
}
