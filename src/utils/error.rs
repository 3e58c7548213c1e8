use crate::domain::model::{SittingId, StudentId, UnitId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("Malformed plan '{plan}': {message}")]
    MalformedPlan { plan: String, message: String },

    #[error("Cyclic prerequisite chain in plan '{plan}': {}", join_ids(.cycle))]
    CyclicPrerequisite { plan: String, cycle: Vec<UnitId> },

    #[error("Unknown curricular unit '{unit}' in plan '{plan}'")]
    UnknownUnit { plan: String, unit: UnitId },

    #[error("Student {student} is not eligible for {unit}: missing prerequisites {}", join_ids(.missing))]
    Eligibility {
        student: StudentId,
        unit: UnitId,
        missing: Vec<UnitId>,
    },

    #[error("Sitting {sitting} is full (capacity {capacity})")]
    Capacity { sitting: SittingId, capacity: usize },

    #[error("Cannot set capacity of {sitting} to {requested}: {enrolled} students already enrolled")]
    CapacityBelowRoster {
        sitting: SittingId,
        requested: usize,
        enrolled: usize,
    },

    #[error("Student {student} is already enrolled in {sitting}")]
    AlreadyEnrolled { student: StudentId, sitting: SittingId },

    #[error("Student {student} is not enrolled in {sitting}")]
    NotEnrolled { student: StudentId, sitting: SittingId },

    #[error("Student {student} has already passed {unit}")]
    AlreadyPassed { student: StudentId, unit: UnitId },

    #[error("Student {student} is already taking {unit}")]
    AlreadyInProgress { student: StudentId, unit: UnitId },

    #[error("Student {student} is not regular in {unit} and cannot sit its exam")]
    NotRegular { student: StudentId, unit: UnitId },

    #[error("Sitting {sitting} is closed")]
    OfferingClosed { sitting: SittingId },

    #[error("Student {student} may not override prerequisite eligibility")]
    UnauthorizedSelfOverride { student: StudentId },

    #[error("{role} '{actor}' is not allowed to {action}")]
    Forbidden {
        role: String,
        actor: String,
        action: String,
    },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

pub type Result<T> = std::result::Result<T, EnrollError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    PlanLoad,
    Query,
    Enrollment,
    Authorization,
    Configuration,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl EnrollError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EnrollError::MalformedPlan { .. } | EnrollError::CyclicPrerequisite { .. } => {
                ErrorCategory::PlanLoad
            }
            EnrollError::UnknownUnit { .. } => ErrorCategory::Query,
            EnrollError::Eligibility { .. }
            | EnrollError::Capacity { .. }
            | EnrollError::CapacityBelowRoster { .. }
            | EnrollError::AlreadyEnrolled { .. }
            | EnrollError::NotEnrolled { .. }
            | EnrollError::AlreadyPassed { .. }
            | EnrollError::AlreadyInProgress { .. }
            | EnrollError::NotRegular { .. }
            | EnrollError::OfferingClosed { .. } => ErrorCategory::Enrollment,
            EnrollError::UnauthorizedSelfOverride { .. } | EnrollError::Forbidden { .. } => {
                ErrorCategory::Authorization
            }
            EnrollError::ConfigValidationError { .. }
            | EnrollError::InvalidConfigValueError { .. }
            | EnrollError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EnrollError::CsvError(_)
            | EnrollError::IoError(_)
            | EnrollError::SerializationError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Enrollment => ErrorSeverity::Low,
            ErrorCategory::Authorization | ErrorCategory::Query => ErrorSeverity::Medium,
            ErrorCategory::PlanLoad | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    /// Enrollment-time failures leave no state behind and may be retried
    /// once the caller fixes its input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Enrollment | ErrorCategory::Authorization | ErrorCategory::Query
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EnrollError::Eligibility { unit, missing, .. } => format!(
                "You cannot enroll in {} yet. Pass these units first: {}",
                unit,
                join_ids(missing)
            ),
            EnrollError::Capacity { sitting, .. } => {
                format!("There are no places left in {}", sitting)
            }
            EnrollError::AlreadyEnrolled { sitting, .. } => {
                format!("You are already enrolled in {}", sitting)
            }
            EnrollError::CyclicPrerequisite { plan, .. } | EnrollError::MalformedPlan { plan, .. } => {
                format!("The curriculum plan '{}' could not be loaded: {}", plan, self)
            }
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EnrollError::MalformedPlan { .. } => {
                "Check that every unit has an id and name and that all referenced units exist"
            }
            EnrollError::CyclicPrerequisite { .. } => {
                "Remove one of the prerequisite edges listed in the cycle"
            }
            EnrollError::UnknownUnit { .. } => "Check the unit identifier against the plan",
            EnrollError::Eligibility { .. } => "Complete the missing prerequisites and try again",
            EnrollError::Capacity { .. } | EnrollError::CapacityBelowRoster { .. } => {
                "Ask the coordinator to raise the capacity or choose another sitting"
            }
            EnrollError::AlreadyEnrolled { .. } => "No action needed",
            EnrollError::NotEnrolled { .. } => "Check the student id and sitting",
            EnrollError::AlreadyPassed { .. } => "The unit is already complete",
            EnrollError::AlreadyInProgress { .. } => {
                "Finish or drop the current course of this unit first"
            }
            EnrollError::NotRegular { .. } => "Finish the coursework for the unit first",
            EnrollError::OfferingClosed { .. } => "Ask the coordinator to open the sitting",
            EnrollError::UnauthorizedSelfOverride { .. } | EnrollError::Forbidden { .. } => {
                "Submit the request through an authorized role"
            }
            EnrollError::ConfigValidationError { .. }
            | EnrollError::InvalidConfigValueError { .. }
            | EnrollError::MissingConfigError { .. } => "Fix the configuration file and re-run",
            EnrollError::CsvError(_) | EnrollError::IoError(_) => {
                "Check file paths and permissions"
            }
            EnrollError::SerializationError(_) => "Check that the input file is valid JSON",
        }
    }
}
