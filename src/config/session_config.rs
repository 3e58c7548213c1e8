use crate::core::engine::Role;
use crate::domain::model::CompletionRecord;
use crate::utils::error::{EnrollError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_required_field, Validate,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub session: SessionInfo,
    pub plan: PlanSource,
    #[serde(default)]
    pub students: Vec<StudentConfig>,
    #[serde(default)]
    pub offerings: Vec<OfferingConfig>,
    #[serde(default)]
    pub exams: Vec<ExamConfig>,
    #[serde(default)]
    pub requests: Vec<RequestConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFormat {
    /// `{"id", "year", "units": [...]}`
    #[default]
    Flat,
    /// Top-level keys are semester numbers.
    Semesters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSource {
    pub file: String,
    #[serde(default)]
    pub format: PlanFormat,
    /// Required for the semester layout, which carries no header.
    pub id: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentConfig {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub admission_year: i32,
    pub record_file: Option<String>,
    pub record: Option<CompletionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferingConfig {
    pub unit: String,
    pub year: i32,
    pub semester: u8,
    pub capacity: Option<usize>,
}

impl OfferingConfig {
    pub fn sitting_id(&self) -> String {
        format!("{}-{}-S{}", self.unit, self.year, self.semester)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamConfig {
    pub unit: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub attempt: Option<u32>,
    pub capacity: Option<usize>,
    /// Defaults to `true`: only students regular in the unit may register.
    pub require_regular: Option<bool>,
}

impl ExamConfig {
    pub fn attempt(&self) -> u32 {
        self.attempt.unwrap_or(1)
    }

    pub fn sitting_at(&self) -> Result<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|e| {
            EnrollError::InvalidConfigValueError {
                field: "exams.date".to_string(),
                value: self.date.clone(),
                reason: format!("expected YYYY-MM-DD: {}", e),
            }
        })?;
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&self.time, "%H:%M:%S"))
            .map_err(|e| EnrollError::InvalidConfigValueError {
                field: "exams.time".to_string(),
                value: self.time.clone(),
                reason: format!("expected HH:MM: {}", e),
            })?;
        Ok(date.and_time(time))
    }

    /// Matches the id the exam sitting itself reports.
    pub fn sitting_id(&self) -> String {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| self.date.clone());
        format!("{}-{}-A{}", self.unit, date, self.attempt())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    Enroll,
    Withdraw,
    Open,
    Close,
    SetCapacity,
}

impl RequestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestAction::Enroll => "enroll",
            RequestAction::Withdraw => "withdraw",
            RequestAction::Open => "open",
            RequestAction::Close => "close",
            RequestAction::SetCapacity => "set_capacity",
        }
    }

    fn needs_student(&self) -> bool {
        matches!(self, RequestAction::Enroll | RequestAction::Withdraw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub actor: Role,
    /// Staff name; students act under their own id.
    pub actor_name: Option<String>,
    /// Acting student id, when `actor = "student"`.
    pub actor_student: Option<u64>,
    pub action: RequestAction,
    pub target: String,
    pub student: Option<u64>,
    #[serde(default)]
    pub override_eligibility: bool,
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: Option<String>,
    pub rosters_file: Option<String>,
    pub receipts_file: Option<String>,
    pub outcomes_file: Option<String>,
}

impl SessionConfig {
    /// Loads a session from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EnrollError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EnrollError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EnrollError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("session.name", &self.session.name)?;
        validate_path("plan.file", &self.plan.file)?;
        if self.plan.format == PlanFormat::Semesters {
            validate_required_field("plan.id", &self.plan.id)?;
            validate_required_field("plan.year", &self.plan.year)?;
        }

        let mut student_ids = BTreeSet::new();
        for student in &self.students {
            validate_non_empty_string("students.first_name", &student.first_name)?;
            validate_non_empty_string("students.last_name", &student.last_name)?;
            if let Some(record_file) = &student.record_file {
                validate_path("students.record_file", record_file)?;
            }
            if !student_ids.insert(student.id) {
                return Err(EnrollError::InvalidConfigValueError {
                    field: "students.id".to_string(),
                    value: student.id.to_string(),
                    reason: "Duplicate student id".to_string(),
                });
            }
        }

        let mut sittings = BTreeSet::new();
        for offering in &self.offerings {
            validate_non_empty_string("offerings.unit", &offering.unit)?;
            validate_range("offerings.semester", offering.semester, 1, 10)?;
            sittings.insert(offering.sitting_id());
        }
        for exam in &self.exams {
            validate_non_empty_string("exams.unit", &exam.unit)?;
            validate_positive_number("exams.attempt", exam.attempt() as usize, 1)?;
            exam.sitting_at()?;
            sittings.insert(exam.sitting_id());
        }

        for request in &self.requests {
            if !sittings.contains(&request.target) {
                return Err(EnrollError::InvalidConfigValueError {
                    field: "requests.target".to_string(),
                    value: request.target.clone(),
                    reason: "No offering or exam with this id is declared".to_string(),
                });
            }
            if request.action.needs_student() {
                let student = validate_required_field("requests.student", &request.student)?;
                if !student_ids.contains(student) {
                    return Err(EnrollError::InvalidConfigValueError {
                        field: "requests.student".to_string(),
                        value: student.to_string(),
                        reason: "Student is not declared in [[students]]".to_string(),
                    });
                }
            }
            if request.actor == Role::Student {
                validate_required_field("requests.actor_student", &request.actor_student)?;
            }
        }

        Ok(())
    }

    fn output(&self) -> Option<&OutputConfig> {
        self.output.as_ref()
    }

    pub fn output_dir(&self) -> &str {
        self.output()
            .and_then(|output| output.dir.as_deref())
            .unwrap_or("output")
    }

    pub fn rosters_file(&self) -> String {
        let name = self
            .output()
            .and_then(|output| output.rosters_file.as_deref())
            .unwrap_or("rosters.csv");
        self.in_output_dir(name)
    }

    pub fn receipts_file(&self) -> String {
        let name = self
            .output()
            .and_then(|output| output.receipts_file.as_deref())
            .unwrap_or("receipts.csv");
        self.in_output_dir(name)
    }

    pub fn outcomes_file(&self) -> String {
        let name = self
            .output()
            .and_then(|output| output.outcomes_file.as_deref())
            .unwrap_or("outcomes.csv");
        self.in_output_dir(name)
    }

    fn in_output_dir(&self, name: &str) -> String {
        format!("{}/{}", self.output_dir(), name)
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
