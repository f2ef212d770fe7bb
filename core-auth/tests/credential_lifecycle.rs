use async_trait::async_trait;
use bridge_desktop::FileSecureStore;
use bridge_traits::ManualClock;
use chrono::{Duration, TimeZone, Utc};
use core_auth::{
    AuthError, Credential, CredentialManager, CredentialRefresher, CredentialState, TokenStore,
};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Hands out `fresh-1`, `fresh-2`, ... and counts calls.
#[derive(Default)]
struct CountingRefresher {
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialRefresher for CountingRefresher {
    async fn refresh_credential(
        &self,
        current: Option<Credential>,
    ) -> core_auth::Result<Credential> {
        let current = current.ok_or(AuthError::NotAuthenticated)?;
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Credential {
            access_token: format!("fresh-{n}"),
            refresh_token: current.refresh_token,
            expires_at: None,
        })
    }
}

#[tokio::test]
async fn test_cached_credential_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("token_cache.json");
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(now));
    let refresher = Arc::new(CountingRefresher::default());

    let first = CredentialManager::new(
        TokenStore::new(Arc::new(FileSecureStore::new(&cache_file))),
        refresher.clone(),
        clock.clone(),
    );
    first
        .sign_in(
            Credential::new("cached")
                .with_refresh_token("r")
                .expiring_at(now + Duration::hours(1)),
        )
        .await
        .unwrap();
    drop(first);

    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let second = CredentialManager::new(
        TokenStore::new(Arc::new(FileSecureStore::new(&cache_file))),
        refresher.clone(),
        clock.clone(),
    )
    .with_event_bus(bus);

    assert_eq!(second.load_cached().await.unwrap(), CredentialState::SilentlyValid);
    assert_eq!(second.access_token().await.unwrap(), "cached");
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Auth(AuthEvent::CredentialLoaded)
    );

    clock.advance(Duration::hours(2));
    assert_eq!(second.access_token().await.unwrap(), "fresh-1");
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);

    // The refreshed credential is what the next run finds.
    let third = CredentialManager::new(
        TokenStore::new(Arc::new(FileSecureStore::new(&cache_file))),
        refresher.clone(),
        clock,
    );
    assert_eq!(third.access_token().await.unwrap(), "fresh-1");
}

#[tokio::test]
async fn test_concurrent_rejections_refresh_once() {
    let dir = tempfile::tempdir().unwrap();
    let refresher = Arc::new(CountingRefresher::default());
    let manager = Arc::new(CredentialManager::new(
        TokenStore::new(Arc::new(FileSecureStore::new(dir.path().join("t.json")))),
        refresher.clone(),
        Arc::new(ManualClock::new(Utc::now())),
    ));
    manager
        .sign_in(Credential::new("stale").with_refresh_token("r"))
        .await
        .unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.refresh_rejected("stale").await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "fresh-1");
    }
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
}
