//! Command preparers: pluggable steps that run after the built-in
//! validation and before emission.

use std::sync::Arc;

use super::{Account, AccountCommand, AccountError, PasswordHasher};

/// A step that may transform or reject a command before it is executed.
///
/// Preparers only see commands that already passed the lifecycle checks.
pub trait CommandPreparer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    fn prepare(
        &self,
        command: &mut AccountCommand,
        account: &Account,
    ) -> Result<(), AccountError>;
}

/// Replaces plaintext passwords on Create and Update with their hash.
pub struct PasswordHashing {
    hasher: Arc<dyn PasswordHasher>,
}

impl PasswordHashing {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { hasher }
    }
}

impl CommandPreparer for PasswordHashing {
    fn name(&self) -> &'static str {
        "password_hashing"
    }

    fn prepare(
        &self,
        command: &mut AccountCommand,
        _account: &Account,
    ) -> Result<(), AccountError> {
        match command {
            AccountCommand::Create(create) => {
                create.password = self.hasher.hash(&create.password)?;
            }
            AccountCommand::Update(update) => {
                if let Some(password) = update.password.as_mut() {
                    *password = self.hasher.hash(password)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Verifies login credentials against the stored hash.
///
/// The login must name the account by username or email (any name given has
/// to match) and the password must verify.
pub struct CredentialCheck {
    hasher: Arc<dyn PasswordHasher>,
}

impl CredentialCheck {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { hasher }
    }
}

impl CommandPreparer for CredentialCheck {
    fn name(&self) -> &'static str {
        "credential_check"
    }

    fn prepare(
        &self,
        command: &mut AccountCommand,
        account: &Account,
    ) -> Result<(), AccountError> {
        let AccountCommand::Login(login) = command else {
            return Ok(());
        };

        if login.username.is_empty() && login.email.is_empty() {
            return Err(AccountError::InvalidCredentials);
        }
        if !login.username.is_empty() && login.username != account.username() {
            return Err(AccountError::InvalidCredentials);
        }
        if !login.email.is_empty() && !login.email.eq_ignore_ascii_case(account.email()) {
            return Err(AccountError::InvalidCredentials);
        }

        if self.hasher.verify(&login.password, account.password_hash())? {
            Ok(())
        } else {
            Err(AccountError::InvalidCredentials)
        }
    }
}
