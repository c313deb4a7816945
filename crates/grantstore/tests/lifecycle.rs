//! End-to-end token lifecycle scenarios through the public storage contract.

use std::sync::Arc;

use grantstore::{
    AccessData, AuthorizeData, Client, Clock, GrantStore, InMemoryBackend, LinkError, Linked,
    ManualClock, OAuthStorage, StoreError, StoreOptions,
};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const T0: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (GrantStore, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::new(T0));
    let store = GrantStore::new(Arc::new(InMemoryBackend::new())).with_clock(clock.clone());
    (store, clock)
}

fn c1() -> Client {
    Client::new("c1", "s1", "http://x/cb")
}

fn authorize(code: &str) -> AuthorizeData {
    AuthorizeData {
        client: c1(),
        code: code.into(),
        expires_in: Duration::seconds(600),
        scope: "read write".into(),
        redirect_uri: "http://x/cb".into(),
        state: "state-1".into(),
        user_data: String::new(),
        created_at: T0,
    }
}

fn access(token: &str, refresh: Option<&str>) -> AccessData {
    AccessData {
        client: Some(c1()),
        authorize_data: Linked::Absent,
        access_data: Linked::Absent,
        access_token: token.into(),
        refresh_token: refresh.map(str::to_owned),
        expires_in: Duration::seconds(3600),
        scope: "read".into(),
        redirect_uri: "http://x/cb".into(),
        user_data: r#"{"sub":"alice"}"#.into(),
        created_at: T0,
    }
}

#[tokio::test]
async fn test_client_roundtrip_with_user_data() {
    let (store, _) = setup();
    let client = c1()
        .with_serialized_user_data(&serde_json::json!({"tenant": "acme"}))
        .unwrap();

    store.create_client(&client).await.unwrap();
    let loaded = store.get_client("c1").await.unwrap();
    assert_eq!(loaded, client);

    let meta: serde_json::Value = loaded.user_data_as().unwrap();
    assert_eq!(meta["tenant"], "acme");

    assert!(store.get_client("c2").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_authorization_code_expires() {
    let (store, clock) = setup();
    store.create_client(&c1()).await.unwrap();
    store.save_authorize(&authorize("code1")).await.unwrap();

    clock.set(T0 + Duration::seconds(1));
    let loaded = store.load_authorize("code1").await.unwrap();
    assert_eq!(loaded.client.id, "c1");
    assert_eq!(loaded.state, "state-1");

    clock.set(T0 + Duration::seconds(700));
    let err = store.load_authorize("code1").await.unwrap_err();
    assert!(err.is_expired(), "expected Expired, got {err:?}");
    if let StoreError::Expired { expired_at, .. } = err {
        assert_eq!(expired_at, T0 + Duration::seconds(600));
    }

    // Still present until removed.
    assert_eq!(store.expiry().count().await.unwrap(), 1);
    store.remove_authorize("code1").await.unwrap();
    store.remove_authorize("code1").await.unwrap();
    assert!(store.load_authorize("code1").await.unwrap_err().is_not_found());
    assert_eq!(store.expiry().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_code_exchange_and_rotation() {
    let (store, clock) = setup();
    store.create_client(&c1()).await.unwrap();
    store.save_authorize(&authorize("code1")).await.unwrap();
    clock.advance(Duration::seconds(5));

    // Exchange the code for the first token.
    let code = store.load_authorize("code1").await.unwrap();
    let mut first = access("a1", Some("r1"));
    first.authorize_data = Linked::resolved(code.clone());
    store.save_access(&first).await.unwrap();
    store.remove_authorize("code1").await.unwrap();

    // Refresh: mint a2 from r1, then revoke the old pair.
    let old = store.load_refresh("r1").await.unwrap();
    assert_eq!(old, store.load_access("a1").await.unwrap());
    let mut second = access("a2", Some("r2"));
    second.access_data = Linked::resolved(old.clone());
    store.save_access(&second).await.unwrap();

    let loaded = store.load_access("a2").await.unwrap();
    let prev = loaded.access_data.as_ref().expect("predecessor resolves");
    assert_eq!(prev.access_token, old.access_token);
    assert_eq!(prev.refresh_token, old.refresh_token);
    assert_eq!(prev.scope, old.scope);
    assert_eq!(prev.created_at, old.created_at);
    // The code was consumed, so the predecessor's authorization link is broken.
    assert_eq!(prev.authorize_data, Linked::Unresolved(LinkError::NotFound));

    store.remove_access("a1").await.unwrap();
    store.remove_refresh("r1").await.unwrap();

    let loaded = store.load_access("a2").await.unwrap();
    assert!(loaded.access_data.as_ref().is_none());
    assert_eq!(loaded.access_data, Linked::Unresolved(LinkError::NotFound));
    assert!(store.load_refresh("r1").await.unwrap_err().is_not_found());
    assert_eq!(store.load_refresh("r2").await.unwrap().access_token, "a2");
}

#[tokio::test]
async fn test_refresh_survives_access_removal() {
    let (store, _) = setup();
    store.create_client(&c1()).await.unwrap();
    store.save_access(&access("a1", Some("r1"))).await.unwrap();

    store.remove_access("a1").await.unwrap();
    // The mapping stays, but the token it points at is gone.
    let err = store.load_refresh("r1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_save_access_without_client() {
    let (store, _) = setup();
    let mut data = access("a1", Some("r1"));
    data.client = None;

    assert!(store.save_access(&data).await.unwrap_err().is_invalid_argument());
    assert!(store.load_refresh("r1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_load_access_with_missing_client_fails() {
    let (store, _) = setup();
    store.create_client(&c1()).await.unwrap();
    store.save_access(&access("a1", None)).await.unwrap();
    store.remove_client("c1").await.unwrap();

    let err = store.load_access("a1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_saves_sharing_refresh_token() {
    let (store, _) = setup();
    store.create_client(&c1()).await.unwrap();

    let handles: Vec<_> = ["a1", "a2"]
        .into_iter()
        .map(|token| {
            let store = store.clone();
            tokio::spawn(async move { store.save_access(&access(token, Some("shared"))).await })
        })
        .collect();

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(err) => {
                assert!(err.is_backend());
                assert!(err.is_unique_violation());
                conflicts += 1;
            }
        }
    }
    assert_eq!((ok, conflicts), (1, 1));

    let winner = store.load_refresh("shared").await.unwrap();
    let loser = if winner.access_token == "a1" { "a2" } else { "a1" };
    assert!(store.load_access(loser).await.unwrap_err().is_not_found());
    assert_eq!(store.expiry().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_long_chain_is_bounded() {
    let (store, _) = setup();
    let store = store.with_options(StoreOptions::default().with_max_chain_depth(3));
    store.create_client(&c1()).await.unwrap();

    let mut prev: Option<AccessData> = None;
    for i in 0..10 {
        let mut data = access(&format!("tok-{i}"), None);
        data.access_data = prev.take().into();
        store.save_access(&data).await.unwrap();
        prev = Some(data);
    }

    let loaded = store.load_access("tok-9").await.unwrap();
    assert_eq!(loaded.chain_len(), 3);

    let mut cursor = &loaded;
    for _ in 0..3 {
        cursor = cursor.access_data.as_ref().unwrap();
    }
    assert_eq!(cursor.access_token, "tok-6");
    assert_eq!(cursor.access_data, Linked::Unresolved(LinkError::DepthExceeded(3)));
}

#[tokio::test]
async fn test_expiry_sweep_listing() {
    let (store, clock) = setup();
    store.create_client(&c1()).await.unwrap();
    store.save_authorize(&authorize("code1")).await.unwrap();
    store.save_access(&access("a1", None)).await.unwrap();

    clock.advance(Duration::minutes(30));
    let expired = store.expiry().expired(clock.now(), 100).await.unwrap();
    let keys: Vec<&str> = expired.iter().map(|e| e.code_or_token.as_str()).collect();
    assert_eq!(keys, vec!["code1"]);

    clock.advance(Duration::hours(1));
    let expired = store.expiry().expired(clock.now(), 100).await.unwrap();
    assert_eq!(expired.len(), 2);
}
