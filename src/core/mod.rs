pub mod engine;
pub mod export;
pub mod plan;
pub mod roster;
pub mod session;

pub use crate::domain::model::{CompletionRecord, CompletionStatus, CurricularUnit, StudentId, UnitId};
pub use crate::domain::ports::Storage;
pub use crate::utils::error::Result;
