use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FileRef, SubmissionIdentity};

/// A rejection event recorded against one file of a submission.
///
/// Created unresolved when a manager rejects the file; resolved when the owner
/// re-uploads a file with the same name into the same submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RejectionRecord {
    pub id: i64,
    pub department: String,
    pub directory: String,
    pub roll_number: String,
    pub file_name: String,
    pub reason: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl RejectionRecord {
    pub fn identity(&self) -> SubmissionIdentity {
        SubmissionIdentity {
            department: self.department.clone(),
            directory: self.directory.clone(),
            roll_number: self.roll_number.clone(),
        }
    }

    pub fn matches(&self, file: &FileRef) -> bool {
        self.department == file.identity.department
            && self.directory == file.identity.directory
            && self.roll_number == file.identity.roll_number
            && self.file_name == file.file_name
    }
}
