//! Identity and access: password authentication and request-scoped principals.

use placedoc_core::models::{Capability, NewUser, Principal, User};
use placedoc_core::{AppError, Area};
use placedoc_db::UserDirectory;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String, AppError> {
    use argon2::{
        password_hash::{PasswordHasher, SaltString},
        Argon2,
    };

    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    use argon2::{
        password_hash::{PasswordHash, PasswordVerifier},
        Argon2,
    };

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Who is calling, for the duration of one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub principal: Principal,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            principal,
        }
    }

    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.principal.role.allows(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} users cannot perform this action",
                self.principal.role
            )))
        }
    }

    pub fn require_browse(&self, area: Area) -> Result<(), AppError> {
        if self.principal.role.can_browse(area) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} users cannot browse the {} area",
                self.principal.role, area
            )))
        }
    }

    pub fn require_list_directories(&self, area: Area) -> Result<(), AppError> {
        if self.principal.role.can_list_directories(area) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} users cannot list directories of the {} area",
                self.principal.role, area
            )))
        }
    }
}

#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserDirectory>,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// Check credentials. Unknown email and wrong password fail the same way.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Principal, AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            tracing::debug!("Login failed: unknown email");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!("Login failed: wrong password");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        tracing::info!(email = %user.email, role = %user.role, "User authenticated");
        Ok(Principal::from(user))
    }

    /// Validate and store a new user with a hashed password
    #[tracing::instrument(skip(self, new_user), fields(email = %new_user.email, role = %new_user.role))]
    pub async fn add_user(&self, new_user: NewUser) -> Result<Principal, AppError> {
        new_user.validate()?;

        let user = User {
            email: new_user.email.trim().to_string(),
            password_hash: hash_password(&new_user.password)?,
            role: new_user.role,
            name: new_user.name.trim().to_string(),
            roll_number: new_user.roll_number.trim().to_string(),
        };
        self.users.insert(&user).await?;

        Ok(Principal::from(user))
    }
}
