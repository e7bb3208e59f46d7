use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::AppError;
use crate::validation::{validate_file_name, validate_segment};

/// The (department, directory, roll_number) triple identifying one uploader's folder.
///
/// Not stored as a row; it is derived from object paths. Every segment is validated
/// on construction so it can be joined into a key without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionIdentity {
    pub department: String,
    pub directory: String,
    pub roll_number: String,
}

impl SubmissionIdentity {
    pub fn new(
        department: impl Into<String>,
        directory: impl Into<String>,
        roll_number: impl Into<String>,
    ) -> Result<Self, AppError> {
        let identity = Self {
            department: department.into(),
            directory: directory.into(),
            roll_number: roll_number.into(),
        };
        validate_segment("department", &identity.department)?;
        validate_segment("directory", &identity.directory)?;
        validate_segment("roll number", &identity.roll_number)?;
        Ok(identity)
    }

    /// Relative path of the submission folder, with a trailing `/`
    pub fn prefix(&self) -> String {
        format!(
            "{}/{}/{}/",
            self.department, self.directory, self.roll_number
        )
    }
}

impl Display for SubmissionIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}/{}/{}",
            self.department, self.directory, self.roll_number
        )
    }
}

/// A single file inside a submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    pub identity: SubmissionIdentity,
    pub file_name: String,
}

impl FileRef {
    pub fn new(identity: SubmissionIdentity, file_name: impl Into<String>) -> Result<Self, AppError> {
        let file_name = file_name.into();
        validate_file_name(&file_name)?;
        Ok(Self {
            identity,
            file_name,
        })
    }

    /// Parse a full relative path `department/directory/roll_number/file_name`
    pub fn parse(path: &str) -> Result<Self, AppError> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            [department, directory, roll_number, file_name] => Self::new(
                SubmissionIdentity::new(*department, *directory, *roll_number)?,
                *file_name,
            ),
            _ => Err(AppError::Validation(format!(
                "Expected department/directory/roll_number/file_name, got '{}'",
                path
            ))),
        }
    }

    /// Relative object path, identical in every area
    pub fn path(&self) -> String {
        format!("{}{}", self.identity.prefix(), self.file_name)
    }
}

impl Display for FileRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.path())
    }
}
