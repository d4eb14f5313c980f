//! Account command and query endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{
    Account, AccountService, Aggregate, CreateAccount, DeleteAccount, DisableAccount,
    EnableAccount, LoginAccount, PersonName, UpdateAccount,
};
use event_store::EventStore;
use projections::{AccountsView, ProjectionProcessor, ReadModel};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub account_service: Arc<AccountService<S>>,
    pub accounts: AccountsView,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Fields left out keep their current value.
#[derive(Deserialize)]
pub struct UpdateAccountRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

// -- Response types --

/// Public view of an account. The password hash is never included.
#[derive(Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub version: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: BTreeSet<String>,
    pub disabled: bool,
    pub state: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id().map(|id| id.to_string()).unwrap_or_default(),
            version: account.version().as_i64(),
            username: account.username().to_string(),
            email: account.email().to_string(),
            first_name: account.name().map(|n| n.first.clone()),
            last_name: account.name().map(|n| n.last.clone()),
            roles: account.roles().clone(),
            disabled: account.is_disabled(),
            state: account.state().to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct AccountCreatedResponse {
    pub account_id: String,
    pub state: String,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: usize,
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub version: i64,
    pub sequence: u64,
    pub timestamp: String,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /accounts: create a new account.
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountCreatedResponse>), ApiError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let account_id = AggregateId::new();
    let mut cmd = CreateAccount::new(account_id, req.username, req.email, req.password)
        .with_roles(req.roles);
    if let Some(name) = person_name(req.first_name, req.last_name) {
        cmd = cmd.with_name(name);
    }
    if req.disabled {
        cmd = cmd.disabled();
    }

    let outcome = state.account_service.create(cmd).await?;

    let response = AccountCreatedResponse {
        account_id: account_id.to_string(),
        state: outcome.aggregate.state().to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /accounts/{id}: load an account aggregate by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = load_live(&state, &id).await?;
    Ok(Json(AccountResponse::from(&account)))
}

/// GET /accounts: list live accounts from the read model.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    // Run catch-up to ensure the read model includes latest events
    state.projection_processor.run_catch_up().await?;

    let accounts = state.accounts.find_all().await;
    Ok(Json(accounts.iter().map(AccountResponse::from).collect()))
}

/// GET /accounts/count: number of live accounts in the read model.
#[tracing::instrument(skip(state))]
pub async fn count<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<CountResponse>, ApiError> {
    state.projection_processor.run_catch_up().await?;

    Ok(Json(CountResponse {
        count: state.accounts.count().await,
    }))
}

/// PUT /accounts/{id}: update profile fields and optionally the password.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let current = load_live(&state, &id).await?;

    let mut cmd = UpdateAccount::from_account(&current);
    if let Some(username) = req.username {
        cmd.username = username;
    }
    if let Some(email) = req.email {
        cmd = cmd.with_email(email);
    }
    if let Some(password) = req.password {
        cmd = cmd.with_password(password);
    }
    if let Some(roles) = req.roles {
        cmd = cmd.with_roles(roles);
    }
    if req.first_name.is_some() || req.last_name.is_some() {
        let existing = current.name().cloned().unwrap_or_default();
        cmd = cmd.with_name(PersonName::new(
            req.first_name.unwrap_or(existing.first),
            req.last_name.unwrap_or(existing.last),
        ));
    }

    let outcome = state.account_service.update(cmd).await?;
    Ok(Json(AccountResponse::from(&outcome.aggregate)))
}

/// DELETE /accounts/{id}: soft-delete an account.
#[tracing::instrument(skip(state))]
pub async fn delete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let account_id = parse_aggregate_id(&id)?;
    state
        .account_service
        .delete(DeleteAccount::new(account_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /accounts/{id}/enable
#[tracing::instrument(skip(state))]
pub async fn enable<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_aggregate_id(&id)?;
    let outcome = state
        .account_service
        .enable(EnableAccount::new(account_id))
        .await?;
    Ok(Json(AccountResponse::from(&outcome.aggregate)))
}

/// POST /accounts/{id}/disable
#[tracing::instrument(skip(state))]
pub async fn disable<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_aggregate_id(&id)?;
    let outcome = state
        .account_service
        .disable(DisableAccount::new(account_id))
        .await?;
    Ok(Json(AccountResponse::from(&outcome.aggregate)))
}

/// POST /accounts/{id}/login: verify credentials by username or email.
#[tracing::instrument(skip(state, req))]
pub async fn login<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_aggregate_id(&id)?;
    let cmd = match (req.username, req.email) {
        (Some(username), Some(email)) => {
            LoginAccount::with_username(account_id, username, req.password).and_email(email)
        }
        (Some(username), None) => LoginAccount::with_username(account_id, username, req.password),
        (None, Some(email)) => LoginAccount::with_email(account_id, email, req.password),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "username or email is required".to_string(),
            ));
        }
    };

    let outcome = state.account_service.login(cmd).await?;
    Ok(Json(AccountResponse::from(&outcome.aggregate)))
}

/// GET /accounts/{id}/events: list all events for an account.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let account_id = parse_aggregate_id(&id)?;
    let envelopes = state.account_service.events(account_id).await?;

    let responses: Vec<EventEnvelopeResponse> = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            aggregate_id: e.aggregate_id.to_string(),
            version: e.version.as_i64(),
            sequence: e.sequence,
            timestamp: e.timestamp.to_rfc3339(),
            payload: without_password(e.payload),
        })
        .collect();

    Ok(Json(responses))
}

/// Drops the password hash that Created and Updated payloads carry.
fn without_password(mut payload: serde_json::Value) -> serde_json::Value {
    if let Some(data) = payload
        .get_mut("data")
        .and_then(serde_json::Value::as_object_mut)
    {
        data.remove("password");
    }
    payload
}

/// Loads an account from the write side, treating tombstones as not found.
async fn load_live<S: EventStore + Clone + 'static>(
    state: &AppState<S>,
    id: &str,
) -> Result<Account, ApiError> {
    let account_id = parse_aggregate_id(id)?;
    state
        .account_service
        .get_account(account_id)
        .await?
        .filter(|account| !account.is_deleted())
        .ok_or_else(|| ApiError::NotFound(format!("Account {id} not found")))
}

fn person_name(first: Option<String>, last: Option<String>) -> Option<PersonName> {
    match (first, last) {
        (None, None) => None,
        (first, last) => Some(PersonName::new(
            first.unwrap_or_default(),
            last.unwrap_or_default(),
        )),
    }
}

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(AggregateId::from(uuid))
}
