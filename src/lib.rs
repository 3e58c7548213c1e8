pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::{
    engine::{Caller, EnrollmentEngine, EnrollmentReceipt, EnrollmentRequest, Role},
    plan::{CurriculumPlan, Eligibility},
    roster::{CourseOffering, ExamInstance, Roster, Sitting},
    session::{SessionReport, SessionRunner},
};
pub use domain::model::{
    CompletionRecord, CompletionStatus, CurricularUnit, SittingId, Student, StudentId, UnitId, UnitKind,
};
pub use domain::plan_description::{PlanDescription, UnitRecord};
pub use utils::error::{EnrollError, Result};
