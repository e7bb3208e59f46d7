//! Shared key generation and parsing.
//!
//! File key: `{department}/{directory}/{roll_number}/{file_name}`.
//! Directory placeholder: `{department}/{directory}/`.

use placedoc_core::models::{FileRef, SubmissionIdentity};

/// Key of a file inside a submission
pub fn file_key(file: &FileRef) -> String {
    format!(
        "{}/{}/{}/{}",
        file.identity.department, file.identity.directory, file.identity.roll_number, file.file_name
    )
}

/// Zero-byte placeholder materializing a directory before any upload
pub fn placeholder_key(department: &str, directory: &str) -> String {
    format!("{}/{}/", department, directory)
}

pub fn department_prefix(department: &str) -> String {
    format!("{}/", department)
}

pub fn directory_prefix(department: &str, directory: &str) -> String {
    format!("{}/{}/", department, directory)
}

pub fn submission_prefix(identity: &SubmissionIdentity) -> String {
    identity.prefix()
}

/// Whether a key is a directory placeholder
pub fn is_placeholder(key: &str) -> bool {
    key.ends_with('/')
}

/// Segment at `index`, only if the key continues below it.
///
/// `CS/Drive/101/resume.pdf` yields `101` for index 2, while a stray object stored
/// directly at `CS/Drive/101` does not make `101` a roll-number folder.
pub fn folder_segment(key: &str, index: usize) -> Option<&str> {
    let mut parts = key.split('/');
    let found = parts.nth(index).filter(|s| !s.is_empty())?;
    parts.next().map(|_| found)
}
