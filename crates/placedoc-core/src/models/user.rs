use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use validator::Validate;

use crate::models::Area;

/// Closed set of user roles.
///
/// Stored in the `users.role` column as `Uploader`, `Accessor`, `Manager` or `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Uploader,
    Accessor,
    Manager,
    Admin,
}

/// Something a principal may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Upload into one's own submission and see one's own rejections
    Upload,
    /// Browse and download archived files
    ViewArchive,
    /// Browse pending files, archive and reject them
    ManageFiles,
    /// Manage departments, directories and users
    Administer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Uploader, Role::Accessor, Role::Manager, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Uploader => "Uploader",
            Role::Accessor => "Accessor",
            Role::Manager => "Manager",
            Role::Admin => "Admin",
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match self {
            Role::Uploader => matches!(capability, Capability::Upload),
            Role::Accessor => matches!(capability, Capability::Upload | Capability::ViewArchive),
            Role::Manager => matches!(
                capability,
                Capability::Upload | Capability::ViewArchive | Capability::ManageFiles
            ),
            Role::Admin => matches!(capability, Capability::Administer),
        }
    }

    /// Whether roll numbers and files of `area` may be listed and downloaded.
    pub fn can_browse(&self, area: Area) -> bool {
        match area {
            Area::Pending | Area::Reject => self.allows(Capability::ManageFiles),
            Area::Archive => self.allows(Capability::ViewArchive),
        }
    }

    /// Whether directory names of `area` may be listed. Uploaders need the pending
    /// directories to pick an upload target.
    pub fn can_list_directories(&self, area: Area) -> bool {
        match area {
            Area::Pending => self.allows(Capability::Upload) || self.can_browse(area),
            Area::Archive | Area::Reject => self.can_browse(area),
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uploader" => Ok(Role::Uploader),
            "accessor" => Ok(Role::Accessor),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Stored user row
#[derive(Debug, Clone)]
pub struct User {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    pub roll_number: String,
}

/// Authenticated user, without credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub roll_number: String,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal {
            email: user.email,
            name: user.name,
            role: user.role,
            roll_number: user.roll_number,
        }
    }
}

/// Request DTO for creating a user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: String,
    pub role: Role,
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "Roll number must not be empty"))]
    pub roll_number: String,
}
