use crate::config::session_config::{PlanFormat, RequestAction, RequestConfig, SessionConfig};
use crate::core::engine::{Caller, EnrollmentEngine, EnrollmentReceipt, EnrollmentRequest, Role};
use crate::core::export::{receipts_to_csv_string, rosters_to_csv_string};
use crate::core::plan::CurriculumPlan;
use crate::core::roster::Sitting;
use crate::domain::model::{CompletionRecord, Student, StudentId, UnitId};
use crate::domain::plan_description::PlanDescription;
use crate::domain::ports::Storage;
use crate::utils::error::{EnrollError, Result};
use crate::utils::validation::{validate_required_field, Validate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const SETUP_ACTOR: &str = "session-setup";

/// Everything read from storage before any request runs.
#[derive(Debug, Clone)]
pub struct SessionInputs {
    pub plan: Arc<CurriculumPlan>,
    pub students: Vec<Student>,
    pub records: BTreeMap<StudentId, CompletionRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestOutcome {
    pub index: usize,
    pub actor_role: Role,
    pub actor: String,
    pub action: &'static str,
    pub target: String,
    pub student: Option<u64>,
    pub accepted: bool,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub plan_id: String,
    pub outcomes: Vec<RequestOutcome>,
    pub receipts: Vec<EnrollmentReceipt>,
    pub rosters_csv: String,
    pub receipts_csv: String,
    pub outcomes_csv: String,
}

impl SessionReport {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.accepted).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }
}

pub struct SessionRunner<S: Storage> {
    storage: S,
    config: SessionConfig,
    engine: EnrollmentEngine,
}

impl<S: Storage> SessionRunner<S> {
    pub fn new(storage: S, config: SessionConfig) -> Self {
        Self {
            storage,
            config,
            engine: EnrollmentEngine::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Validates, loads, executes and exports. Returns the report after the
    /// export files are written.
    pub async fn run(&self) -> Result<SessionReport> {
        tracing::info!("Starting session '{}'", self.config.session.name);
        self.config.validate()?;

        tracing::info!("Loading inputs...");
        let inputs = self.load_inputs().await?;
        tracing::info!(
            "Loaded plan {} and {} students",
            inputs.plan.id(),
            inputs.students.len()
        );

        tracing::info!("Running {} requests...", self.config.requests.len());
        let report = self.execute(&inputs)?;
        tracing::info!(
            "{} requests accepted, {} rejected",
            report.accepted(),
            report.rejected()
        );

        let written = self.write_outputs(&report).await?;
        tracing::info!("Exports written: {}", written.join(", "));

        Ok(report)
    }

    pub async fn load_inputs(&self) -> Result<SessionInputs> {
        let plan_bytes = self.storage.read_file(&self.config.plan.file).await?;
        let description = match self.config.plan.format {
            PlanFormat::Flat => PlanDescription::from_json_slice(&plan_bytes)?,
            PlanFormat::Semesters => {
                let id = validate_required_field("plan.id", &self.config.plan.id)?;
                let year = validate_required_field("plan.year", &self.config.plan.year)?;
                let content = utf8(&self.config.plan.file, plan_bytes)?;
                PlanDescription::from_semester_map(id.clone(), *year, &content)?
            }
        };
        let plan = Arc::new(CurriculumPlan::load(description)?);

        let mut students = Vec::with_capacity(self.config.students.len());
        let mut records = BTreeMap::new();
        for student in &self.config.students {
            let id = StudentId::new(student.id);
            students.push(Student::new(
                id,
                &student.first_name,
                &student.last_name,
                student.admission_year,
                plan.id(),
            )?);

            let mut record = match &student.record_file {
                Some(path) => {
                    let bytes = self.storage.read_file(path).await?;
                    CompletionRecord::from_json_str(&utf8(path, bytes)?)?
                }
                None => CompletionRecord::new(),
            };
            if let Some(inline) = &student.record {
                record.merge(inline);
            }
            records.insert(id, record);
        }

        Ok(SessionInputs {
            plan,
            students,
            records,
        })
    }

    /// Runs every request in order against fresh sittings. Rejections are
    /// recorded in the report and never retried.
    pub fn execute(&self, inputs: &SessionInputs) -> Result<SessionReport> {
        let (mut sittings, index) = self.create_sittings(&inputs.plan)?;

        let empty = CompletionRecord::new();
        let mut outcomes = Vec::with_capacity(self.config.requests.len());
        let mut receipts = Vec::new();

        for (position, request) in self.config.requests.iter().enumerate() {
            let caller = caller_for(request);
            let result = match index.get(&request.target) {
                Some(&slot) => {
                    let sitting = sittings[slot].as_mut();
                    self.apply(&caller, request, sitting, &inputs.records, &empty)
                }
                None => Err(EnrollError::InvalidConfigValueError {
                    field: "requests.target".to_string(),
                    value: request.target.clone(),
                    reason: "No offering or exam with this id is declared".to_string(),
                }),
            };

            let (accepted, message) = match result {
                Ok(Some(receipt)) => {
                    let message = format!("{} {}", receipt.action, receipt.student);
                    receipts.push(receipt);
                    (true, message)
                }
                Ok(None) => (true, request.action.as_str().to_string()),
                Err(e) => (false, e.to_string()),
            };

            outcomes.push(RequestOutcome {
                index: position + 1,
                actor_role: caller.role,
                actor: caller.name.clone(),
                action: request.action.as_str(),
                target: request.target.clone(),
                student: request.student,
                accepted,
                message,
            });
        }

        let views: Vec<&dyn Sitting> = sittings.iter().map(|sitting| sitting.as_ref()).collect();
        let rosters_csv = rosters_to_csv_string(&views)?;
        let receipts_csv = receipts_to_csv_string(&receipts)?;
        let outcomes_csv = outcomes_to_csv_string(&outcomes)?;

        Ok(SessionReport {
            plan_id: inputs.plan.id().to_string(),
            outcomes,
            receipts,
            rosters_csv,
            receipts_csv,
            outcomes_csv,
        })
    }

    pub async fn write_outputs(&self, report: &SessionReport) -> Result<Vec<String>> {
        let files = [
            (self.config.rosters_file(), &report.rosters_csv),
            (self.config.receipts_file(), &report.receipts_csv),
            (self.config.outcomes_file(), &report.outcomes_csv),
        ];

        let mut written = Vec::with_capacity(files.len());
        for (path, content) in files {
            self.storage.write_file(&path, content.as_bytes()).await?;
            written.push(path);
        }
        Ok(written)
    }

    fn create_sittings(
        &self,
        plan: &Arc<CurriculumPlan>,
    ) -> Result<(Vec<Box<dyn Sitting>>, HashMap<String, usize>)> {
        let setup = Caller::coordinator(SETUP_ACTOR);
        let mut sittings: Vec<Box<dyn Sitting>> = Vec::new();

        for offering in &self.config.offerings {
            sittings.push(Box::new(self.engine.create_offering(
                &setup,
                plan,
                UnitId::from(offering.unit.as_str()),
                offering.year,
                offering.semester,
                offering.capacity,
            )?));
        }
        for exam in &self.config.exams {
            let instance = self
                .engine
                .create_exam(
                    &setup,
                    plan,
                    UnitId::from(exam.unit.as_str()),
                    exam.sitting_at()?,
                    exam.attempt(),
                )?
                .with_regular_requirement(exam.require_regular.unwrap_or(true))
                .with_capacity(exam.capacity);
            sittings.push(Box::new(instance));
        }

        let mut index = HashMap::with_capacity(sittings.len());
        for (slot, sitting) in sittings.iter().enumerate() {
            let id = sitting.sitting_id().to_string();
            if index.insert(id.clone(), slot).is_some() {
                return Err(EnrollError::ConfigValidationError {
                    field: "offerings".to_string(),
                    message: format!("sitting {} is declared twice", id),
                });
            }
        }

        Ok((sittings, index))
    }

    fn apply(
        &self,
        caller: &Caller,
        request: &RequestConfig,
        sitting: &mut dyn Sitting,
        records: &BTreeMap<StudentId, CompletionRecord>,
        empty: &CompletionRecord,
    ) -> Result<Option<EnrollmentReceipt>> {
        if caller.role == Role::Student {
            validate_required_field("requests.actor_student", &request.actor_student)?;
        }

        match request.action {
            RequestAction::Enroll => {
                let student = StudentId::new(*validate_required_field("requests.student", &request.student)?);
                let record = records.get(&student).unwrap_or(empty);
                let mut enrollment = EnrollmentRequest::new(student, record);
                enrollment.override_eligibility = request.override_eligibility;
                self.engine.enroll(caller, enrollment, sitting).map(Some)
            }
            RequestAction::Withdraw => {
                let student = StudentId::new(*validate_required_field("requests.student", &request.student)?);
                self.engine.withdraw(caller, student, sitting).map(Some)
            }
            RequestAction::Open => self.engine.open(caller, sitting).map(|_| None),
            RequestAction::Close => self.engine.close(caller, sitting).map(|_| None),
            RequestAction::SetCapacity => self
                .engine
                .set_capacity(caller, sitting, request.capacity)
                .map(|_| None),
        }
    }
}

fn caller_for(request: &RequestConfig) -> Caller {
    match request.actor {
        Role::Student => Caller::student(StudentId::new(request.actor_student.unwrap_or_default())),
        Role::Secretary => Caller::secretary(
            request
                .actor_name
                .clone()
                .unwrap_or_else(|| Role::Secretary.to_string()),
        ),
        Role::Coordinator => Caller::coordinator(
            request
                .actor_name
                .clone()
                .unwrap_or_else(|| Role::Coordinator.to_string()),
        ),
    }
}

fn utf8(path: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| EnrollError::InvalidConfigValueError {
        field: "file".to_string(),
        value: path.to_string(),
        reason: format!("File is not valid UTF-8: {}", e),
    })
}

pub fn outcomes_to_csv_string(outcomes: &[RequestOutcome]) -> Result<String> {
    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        for outcome in outcomes {
            writer.serialize(outcome)?;
        }
        writer.flush()?;
    }
    utf8("outcomes", buffer)
}
