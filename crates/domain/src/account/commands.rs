//! Account commands.

use std::collections::BTreeSet;
use std::fmt;

use common::AggregateId;

use crate::aggregate::Aggregate;

use super::{Account, PersonName};

/// Command to create a new account.
///
/// `password` is plaintext on the way in; the hashing preparer replaces it
/// before the event is emitted.
#[derive(Clone)]
pub struct CreateAccount {
    pub account_id: AggregateId,
    pub name: Option<PersonName>,
    pub username: String,
    pub password: String,
    pub email: String,
    pub roles: BTreeSet<String>,

    /// Create the account in the Disabled state.
    pub disabled: bool,
}

impl CreateAccount {
    pub fn new(
        account_id: AggregateId,
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            name: None,
            username: username.into(),
            password: password.into(),
            email: email.into(),
            roles: BTreeSet::new(),
            disabled: false,
        }
    }

    pub fn with_name(mut self, name: PersonName) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Starts the account out disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

impl fmt::Debug for CreateAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAccount")
            .field("account_id", &self.account_id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

/// Command to replace an account's profile.
///
/// When `password` is `None` the current hash is kept.
#[derive(Clone)]
pub struct UpdateAccount {
    pub account_id: AggregateId,
    pub name: Option<PersonName>,
    pub username: String,
    pub password: Option<String>,
    pub email: String,
    pub roles: BTreeSet<String>,
}

impl UpdateAccount {
    pub fn new(
        account_id: AggregateId,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            name: None,
            username: username.into(),
            password: None,
            email: email.into(),
            roles: BTreeSet::new(),
        }
    }

    /// Builds an update that keeps every field of `account` as it is.
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: account.id().unwrap_or_default(),
            name: account.name().cloned(),
            username: account.username().to_string(),
            password: None,
            email: account.email().to_string(),
            roles: account.roles().clone(),
        }
    }

    pub fn with_name(mut self, name: PersonName) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for UpdateAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateAccount")
            .field("account_id", &self.account_id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password_changed", &self.password.is_some())
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Command to log in with either the username or the email plus a password.
#[derive(Clone)]
pub struct LoginAccount {
    pub account_id: AggregateId,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl LoginAccount {
    pub fn with_username(
        account_id: AggregateId,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            username: username.into(),
            email: String::new(),
            password: password.into(),
        }
    }

    pub fn with_email(
        account_id: AggregateId,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            username: String::new(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Also requires the email to match.
    pub fn and_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }
}

impl fmt::Debug for LoginAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginAccount")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Command to soft-delete an account.
#[derive(Debug, Clone)]
pub struct DeleteAccount {
    pub account_id: AggregateId,
}

#[derive(Debug, Clone)]
pub struct EnableAccount {
    pub account_id: AggregateId,
}

#[derive(Debug, Clone)]
pub struct DisableAccount {
    pub account_id: AggregateId,
}

/// Records that the "account enabled" confirmation went out.
#[derive(Debug, Clone)]
pub struct SendEnabledConfirmation {
    pub account_id: AggregateId,
}

/// Records that the "account disabled" confirmation went out.
#[derive(Debug, Clone)]
pub struct SendDisabledConfirmation {
    pub account_id: AggregateId,
}

/// Records that the "account created" confirmation went out.
///
/// No lifecycle state accepts this command.
#[derive(Debug, Clone)]
pub struct SendCreatedConfirmation {
    pub account_id: AggregateId,
}

macro_rules! id_only_constructors {
    ($($command:ident),* $(,)?) => {
        $(
            impl $command {
                pub fn new(account_id: AggregateId) -> Self {
                    Self { account_id }
                }
            }
        )*
    };
}

id_only_constructors!(
    DeleteAccount,
    EnableAccount,
    DisableAccount,
    SendEnabledConfirmation,
    SendDisabledConfirmation,
    SendCreatedConfirmation,
);

/// Every command the account aggregate understands.
#[derive(Debug, Clone)]
pub enum AccountCommand {
    Create(CreateAccount),
    Update(UpdateAccount),
    Delete(DeleteAccount),
    Enable(EnableAccount),
    Disable(DisableAccount),
    Login(LoginAccount),
    SendEnabledConfirmation(SendEnabledConfirmation),
    SendDisabledConfirmation(SendDisabledConfirmation),
    SendCreatedConfirmation(SendCreatedConfirmation),
}

impl AccountCommand {
    /// Returns the command type name used in errors, logs and metrics.
    pub fn command_type(&self) -> &'static str {
        match self {
            AccountCommand::Create(_) => "CreateAccount",
            AccountCommand::Update(_) => "UpdateAccount",
            AccountCommand::Delete(_) => "DeleteAccount",
            AccountCommand::Enable(_) => "EnableAccount",
            AccountCommand::Disable(_) => "DisableAccount",
            AccountCommand::Login(_) => "LoginAccount",
            AccountCommand::SendEnabledConfirmation(_) => "SendEnabledConfirmation",
            AccountCommand::SendDisabledConfirmation(_) => "SendDisabledConfirmation",
            AccountCommand::SendCreatedConfirmation(_) => "SendCreatedConfirmation",
        }
    }

    /// Returns the account the command targets.
    pub fn aggregate_id(&self) -> AggregateId {
        match self {
            AccountCommand::Create(c) => c.account_id,
            AccountCommand::Update(c) => c.account_id,
            AccountCommand::Delete(c) => c.account_id,
            AccountCommand::Enable(c) => c.account_id,
            AccountCommand::Disable(c) => c.account_id,
            AccountCommand::Login(c) => c.account_id,
            AccountCommand::SendEnabledConfirmation(c) => c.account_id,
            AccountCommand::SendDisabledConfirmation(c) => c.account_id,
            AccountCommand::SendCreatedConfirmation(c) => c.account_id,
        }
    }
}

macro_rules! account_command {
    ($($command:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$command> for AccountCommand {
                fn from(command: $command) -> Self {
                    AccountCommand::$variant(command)
                }
            }
        )*
    };
}

account_command!(
    CreateAccount => Create,
    UpdateAccount => Update,
    DeleteAccount => Delete,
    EnableAccount => Enable,
    DisableAccount => Disable,
    LoginAccount => Login,
    SendEnabledConfirmation => SendEnabledConfirmation,
    SendDisabledConfirmation => SendDisabledConfirmation,
    SendCreatedConfirmation => SendCreatedConfirmation,
);
