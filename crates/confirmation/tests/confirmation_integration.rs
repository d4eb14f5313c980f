//! Integration tests: account transitions → ConfirmationProcessManager → confirmation events.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::AggregateId;
use confirmation::{
    CONFLICT_RETRIES, ConfirmationKind, ConfirmationOutcome, ConfirmationProcessManager,
};
use domain::{
    AccountService, Argon2PasswordHasher, CreateAccount, DeleteAccount, DisableAccount,
    EnableAccount, UpdateAccount,
};
use event_store::{
    AppendOptions, EventBus, EventEnvelope, EventStore, EventStream, InMemoryEventBus,
    InMemoryEventStore, Snapshot, Version,
};
use projections::{Projection, ProjectionError, ProjectionProcessor};
use tokio::sync::{Mutex, watch};

type Service = Arc<AccountService<InMemoryEventStore>>;

fn service(store: &InMemoryEventStore) -> Service {
    let hasher = Arc::new(Argon2PasswordHasher::with_params(1024, 1, 1).unwrap());
    Arc::new(AccountService::new(store.clone(), hasher))
}

fn setup() -> (
    Service,
    ProjectionProcessor<InMemoryEventStore>,
    ConfirmationProcessManager<InMemoryEventStore>,
) {
    let store = InMemoryEventStore::new();
    let service = service(&store);
    let manager = ConfirmationProcessManager::new(service.clone());
    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(manager.clone()));
    (service, processor, manager)
}

async fn create(service: &Service, username: &str) -> AggregateId {
    let id = AggregateId::new();
    service
        .create(CreateAccount::new(
            id,
            username,
            format!("{username}@example.com"),
            "secret",
        ))
        .await
        .unwrap();
    id
}

async fn history(service: &Service, id: AggregateId) -> Vec<String> {
    service
        .events(id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

#[tokio::test]
async fn test_enable_is_followed_by_confirmation() {
    let (service, processor, _) = setup();
    let id = create(&service, "alice").await;
    service.disable(DisableAccount::new(id)).await.unwrap();
    service.enable(EnableAccount::new(id)).await.unwrap();

    processor.run_catch_up().await.unwrap();

    // The disabled confirmation is rejected: the account is enabled again.
    assert_eq!(
        history(&service, id).await,
        [
            "AccountCreated",
            "AccountDisabled",
            "AccountEnabled",
            "AccountSentEnabledConfirmation"
        ]
    );
}

#[tokio::test]
async fn test_disable_is_followed_by_confirmation() {
    let (service, processor, manager) = setup();
    let id = create(&service, "bob").await;
    service.disable(DisableAccount::new(id)).await.unwrap();

    processor.run_catch_up().await.unwrap();

    assert_eq!(
        history(&service, id).await.last().map(String::as_str),
        Some("AccountSentDisabledConfirmation")
    );
    assert_eq!(manager.handled_version(id).await, Some(Version::new(2)));
}

#[tokio::test]
async fn test_creation_issues_no_confirmation() {
    let (service, processor, _) = setup();
    let enabled = create(&service, "carol").await;
    let disabled = AggregateId::new();
    service
        .create(CreateAccount::new(disabled, "dave", "dave@example.com", "pw").disabled())
        .await
        .unwrap();

    processor.run_catch_up().await.unwrap();

    assert_eq!(history(&service, enabled).await, ["AccountCreated"]);
    assert_eq!(history(&service, disabled).await, ["AccountCreated"]);
}

#[tokio::test]
async fn test_deleted_account_rejects_confirmation() {
    let (service, processor, manager) = setup();
    let id = create(&service, "erin").await;
    service.disable(DisableAccount::new(id)).await.unwrap();
    service.enable(EnableAccount::new(id)).await.unwrap();
    service.delete(DeleteAccount::new(id)).await.unwrap();

    processor.run_catch_up().await.unwrap();

    // Neither transition can be confirmed once the account is gone.
    assert_eq!(
        history(&service, id).await,
        [
            "AccountCreated",
            "AccountDisabled",
            "AccountEnabled",
            "AccountDeleted"
        ]
    );
    assert_eq!(
        manager
            .confirm(ConfirmationKind::Enabled, id, Version::new(3))
            .await
            .unwrap(),
        ConfirmationOutcome::Rejected
    );
    assert_eq!(manager.position().await.last_sequence, 4);
}

#[tokio::test]
async fn test_duplicate_delivery_confirms_once() {
    let (service, _, manager) = setup();
    let id = create(&service, "frank").await;
    service.disable(DisableAccount::new(id)).await.unwrap();

    let disabled = service.events(id).await.unwrap().remove(1);
    manager.handle(&disabled).await.unwrap();
    manager.handle(&disabled).await.unwrap();

    assert_eq!(
        history(&service, id).await,
        ["AccountCreated", "AccountDisabled", "AccountSentDisabledConfirmation"]
    );
}

#[tokio::test]
async fn test_rebuild_does_not_resend() {
    let (service, processor, manager) = setup();
    let id = create(&service, "grace").await;
    service.disable(DisableAccount::new(id)).await.unwrap();
    processor.run_catch_up().await.unwrap();
    // Pick up the confirmation the first pass appended.
    processor.run_catch_up().await.unwrap();
    let before = history(&service, id).await;

    processor.rebuild_all().await.unwrap();

    assert_eq!(history(&service, id).await, before);
    assert_eq!(
        manager
            .confirm(ConfirmationKind::Disabled, id, Version::new(2))
            .await
            .unwrap(),
        ConfirmationOutcome::AlreadySent
    );
}

#[tokio::test]
async fn test_live_confirmations_follow_transitions() {
    let bus = InMemoryEventBus::new();
    let store = InMemoryEventStore::with_bus(bus.clone());
    let service = service(&store);
    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(ConfirmationProcessManager::new(service.clone())));

    let subscription = bus.subscribe();
    let (stop, shutdown) = watch::channel(false);
    let runner = tokio::spawn(async move { processor.run(subscription, shutdown).await });

    let id = create(&service, "heidi").await;
    service.disable(DisableAccount::new(id)).await.unwrap();
    wait_for_version(&store, id, 3).await;

    service.enable(EnableAccount::new(id)).await.unwrap();
    wait_for_version(&store, id, 5).await;

    assert_eq!(
        history(&service, id).await,
        [
            "AccountCreated",
            "AccountDisabled",
            "AccountSentDisabledConfirmation",
            "AccountEnabled",
            "AccountSentEnabledConfirmation"
        ]
    );

    stop.send(true).unwrap();
    runner.await.unwrap().unwrap();
}

async fn wait_for_version(store: &InMemoryEventStore, id: AggregateId, version: i64) {
    for _ in 0..100 {
        if store.get_aggregate_version(id).await.unwrap() == Some(Version::new(version)) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("account never reached version {version}");
}

/// Store that lets a rival update land just before each confirmation append.
#[derive(Clone)]
struct RacingStore {
    inner: InMemoryEventStore,
    rival: Service,
    races: Arc<Mutex<(usize, Option<UpdateAccount>)>>,
}

impl RacingStore {
    fn new() -> Self {
        let inner = InMemoryEventStore::new();
        Self {
            rival: service(&inner),
            inner,
            races: Arc::new(Mutex::new((0, None))),
        }
    }

    async fn race(&self, times: usize, update: UpdateAccount) {
        *self.races.lock().await = (times, Some(update));
    }

    async fn next_rival(&self) -> Option<UpdateAccount> {
        let mut races = self.races.lock().await;
        if races.0 == 0 {
            return None;
        }
        races.0 -= 1;
        races.1.clone()
    }
}

#[async_trait]
impl EventStore for RacingStore {
    async fn append(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> event_store::Result<Version> {
        let confirming = events
            .first()
            .is_some_and(|e| e.event_type.starts_with("AccountSent"));
        let rival = if confirming {
            self.next_rival().await
        } else {
            None
        };
        if let Some(update) = rival {
            self.rival.update(update).await.unwrap();
        }
        self.inner.append(events, options).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.get_events_for_aggregate(aggregate_id).await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner
            .get_events_for_aggregate_from_version(aggregate_id, from_version)
            .await
    }

    async fn stream_events_after(&self, after: u64) -> event_store::Result<EventStream> {
        self.inner.stream_events_after(after).await
    }

    async fn get_aggregate_version(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Option<Version>> {
        self.inner.get_aggregate_version(aggregate_id).await
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> event_store::Result<()> {
        self.inner.save_snapshot(snapshot).await
    }

    async fn get_snapshot(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Option<Snapshot>> {
        self.inner.get_snapshot(aggregate_id).await
    }
}

async fn disabled_racing_account() -> (
    RacingStore,
    ConfirmationProcessManager<RacingStore>,
    AggregateId,
) {
    let store = RacingStore::new();
    let hasher = Arc::new(Argon2PasswordHasher::with_params(1024, 1, 1).unwrap());
    let service = Arc::new(AccountService::new(store.clone(), hasher));
    let id = AggregateId::new();
    service
        .create(CreateAccount::new(id, "ivan", "ivan@example.com", "secret"))
        .await
        .unwrap();
    service.disable(DisableAccount::new(id)).await.unwrap();
    (store, ConfirmationProcessManager::new(service), id)
}

#[tokio::test]
async fn test_confirmation_survives_a_lost_version_race() {
    let (store, manager, id) = disabled_racing_account().await;
    store
        .race(1, UpdateAccount::new(id, "ivan", "ivan@corp.example.com"))
        .await;

    let outcome = manager
        .confirm(ConfirmationKind::Disabled, id, Version::new(2))
        .await
        .unwrap();

    assert_eq!(outcome, ConfirmationOutcome::Sent(Version::new(4)));
    assert_eq!(
        history(&store.rival, id).await,
        [
            "AccountCreated",
            "AccountDisabled",
            "AccountUpdated",
            "AccountSentDisabledConfirmation"
        ]
    );
}

#[tokio::test]
async fn test_repeated_races_are_left_for_a_later_pass() {
    let (store, manager, id) = disabled_racing_account().await;
    store
        .race(
            CONFLICT_RETRIES + 1,
            UpdateAccount::new(id, "ivan", "ivan@corp.example.com"),
        )
        .await;

    let error = manager
        .confirm(ConfirmationKind::Disabled, id, Version::new(2))
        .await
        .unwrap_err();
    let error: ProjectionError = error.into();
    assert!(error.is_retryable());
    assert!(
        !history(&store.rival, id)
            .await
            .contains(&"AccountSentDisabledConfirmation".to_string())
    );

    // Once the rival stops writing, the next attempt goes through.
    assert!(matches!(
        manager
            .confirm(ConfirmationKind::Disabled, id, Version::new(2))
            .await
            .unwrap(),
        ConfirmationOutcome::Sent(_)
    ));
}
