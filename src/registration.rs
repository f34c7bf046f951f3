// Pre-battle registration: validate the player's form and look up whether
// they have played before.

use thiserror::Error;

use crate::session::PendingPlayerRecord;
use crate::storage::{Note, PlayerStorage, StorageError};

/// Fields submitted by the registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub name: String,
    pub display_name: String,
    pub email: String,
    pub note: Note,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RegistrationForm {
    /// Check required fields in form order, then the email's shape.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.name.trim().is_empty() {
            return Err(RegistrationError::Validation("name is required"));
        }
        if self.display_name.trim().is_empty() {
            return Err(RegistrationError::Validation("display name is required"));
        }
        if self.email.trim().is_empty() {
            return Err(RegistrationError::Validation("email is required"));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(RegistrationError::Validation("invalid email"));
        }
        Ok(())
    }
}

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Validate the form and build the pending record, marking it as a returning
/// player when storage already knows the email.
pub async fn register<S: PlayerStorage>(
    form: &RegistrationForm,
    storage: &S,
) -> Result<PendingPlayerRecord, RegistrationError> {
    form.validate()?;

    let name = form.name.trim();
    let display_name = form.display_name.trim();
    let email = form.email.trim();

    let record = match storage.get_by_email(email).await? {
        Some(existing) => {
            tracing::info!(id = %existing.id, "returning player");
            PendingPlayerRecord::returning_player(name, display_name, email, form.note, &existing.id)
        }
        None => {
            tracing::info!("new player");
            PendingPlayerRecord::new_player(name, display_name, email, form.note)
        }
    };
    Ok(record)
}
