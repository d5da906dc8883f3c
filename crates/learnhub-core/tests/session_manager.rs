//! Integration tests for the session manager against a mock identity provider.

use std::sync::Arc;
use std::time::Duration;

use learnhub_core::auth::session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use learnhub_core::{
    AuthError, ClientStore, FileStore, IdentityClient, MemoryStore, Navigator, SessionManager,
    StaticNavigator, UserProfile,
};
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

struct Harness {
    server: MockServer,
    store: Arc<MemoryStore>,
    navigator: Arc<StaticNavigator>,
    manager: SessionManager,
}

async fn harness(landing: &str) -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let navigator = Arc::new(StaticNavigator::new(Url::parse(landing).unwrap()));
    let client =
        IdentityClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5)).unwrap();
    let manager = SessionManager::new(client, store.clone(), navigator.clone());
    Harness {
        server,
        store,
        navigator,
        manager,
    }
}

fn ann() -> UserProfile {
    UserProfile {
        id: "u1".to_string(),
        email: "a@b.com".to_string(),
        name: "Ann".to_string(),
        picture: "http://x/p.png".to_string(),
        verified_email: true,
    }
}

fn seed_session(store: &MemoryStore, token: &str) {
    store.set(ACCESS_TOKEN_KEY, token).unwrap();
    store
        .set(USER_KEY, &serde_json::to_string(&ann()).unwrap())
        .unwrap();
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

/// A client pointed at a localhost port nothing listens on.
fn unreachable_client() -> Option<IdentityClient> {
    // Reserve a port, then free it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .ok()?
        .local_addr()
        .ok()?
        .port();
    let base = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    Some(IdentityClient::new(base, Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn test_initialize_restores_stored_session_without_network() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;
    seed_session(&h.store, "tok-stored");

    h.manager.initialize().await.unwrap();

    assert!(h.manager.is_authenticated());
    assert_eq!(h.manager.user(), Some(ann()));
    assert_eq!(h.manager.access_token().as_deref(), Some("tok-stored"));
    assert_eq!(request_count(&h.server).await, 0);
}

#[tokio::test]
async fn test_initialize_clears_partial_state() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;
    h.store.set(ACCESS_TOKEN_KEY, "orphan").unwrap();

    h.manager.initialize().await.unwrap();

    assert!(!h.manager.is_authenticated());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;
    seed_session(&h.store, "tok");
    h.store.set(REFRESH_TOKEN_KEY, "r1").unwrap();
    h.manager.initialize().await.unwrap();
    assert!(h.manager.is_authenticated());

    h.manager.logout();
    assert!(!h.manager.is_authenticated());
    assert!(h.store.is_empty());

    h.manager.logout();
    assert!(!h.manager.is_authenticated());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_sign_in_recovers_from_corrupt_storage_file() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = FileStore::new(dir.path());
    std::fs::write(file.path(), "{garbage").unwrap();
    let storage = file.path().to_path_buf();

    let manager_at = |landing: &str| {
        let client =
            IdentityClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5))
                .unwrap();
        SessionManager::new(
            client,
            Arc::new(FileStore::new(dir.path())),
            Arc::new(StaticNavigator::new(Url::parse(landing).unwrap())),
        )
    };

    let manager = manager_at("http://app.local/?access_token=tok123&user_id=u1");
    manager.initialize().await.unwrap();
    assert!(manager.is_authenticated());

    let restarted = manager_at("http://app.local/");
    restarted.initialize().await.unwrap();
    assert_eq!(restarted.access_token().as_deref(), Some("tok123"));

    restarted.logout();
    assert!(!storage.exists());
}

#[tokio::test]
async fn test_error_parameter_sets_message_and_strips_url() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/?error=Access%20denied").await;
    seed_session(&h.store, "tok-stored");

    let result = h.manager.initialize().await;

    assert_eq!(
        result,
        Err(AuthError::Provider("Access denied".to_string()))
    );
    assert_eq!(h.manager.error().as_deref(), Some("Access denied"));
    // Session untouched
    assert!(h.manager.is_authenticated());
    assert_eq!(h.manager.access_token().as_deref(), Some("tok-stored"));
    // URL cleaned in place
    assert_eq!(h.navigator.current_url().as_str(), "http://app.local/");
    assert_eq!(h.navigator.history_len(), 1);
    assert!(h.navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_direct_grant_parameters_create_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness(
        "http://app.local/?access_token=tok123&user_id=u1&user_email=a@b.com\
         &user_name=Ann&user_picture=http://x/p.png",
    )
    .await;

    h.manager.initialize().await.unwrap();

    let state = h.manager.state();
    let session = state.session.expect("session");
    assert_eq!(session.access_token, "tok123");
    assert_eq!(session.user.id, "u1");
    assert!(session.user.verified_email);

    assert_eq!(
        h.store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
        Some("tok123")
    );
    let stored: UserProfile =
        serde_json::from_str(&h.store.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored, session.user);

    assert_eq!(h.navigator.current_url().as_str(), "http://app.local/");
    assert_eq!(h.navigator.history_len(), 1);
    assert_eq!(request_count(&h.server).await, 0);
}

#[tokio::test]
async fn test_direct_grant_can_be_refused() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/?access_token=tok123&user_id=u1").await;
    let manager = h.manager.with_direct_grant(false);

    let result = manager.initialize().await;

    assert!(matches!(result, Err(AuthError::Provider(_))));
    assert!(!manager.is_authenticated());
    assert!(manager.error().is_some());
    assert!(h.store.is_empty());
    assert_eq!(h.navigator.current_url().as_str(), "http://app.local/");
}

#[tokio::test]
async fn test_code_parameter_is_exchanged() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/?code=code1&scope=email").await;

    Mock::given(method("POST"))
        .and(path("/auth/google/callback"))
        .and(body_json(json!({ "code": "code1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": {
                "id": "u1",
                "email": "a@b.com",
                "name": "Ann",
                "picture": "http://x/p.png",
                "verified_email": true
            },
            "tokens": {
                "access_token": "tok-exchanged",
                "refresh_token": "r1",
                "expires_in": 3599
            }
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.initialize().await.unwrap();

    assert!(h.manager.is_authenticated());
    assert!(!h.manager.is_loading());
    assert_eq!(h.manager.user(), Some(ann()));
    assert_eq!(
        h.store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
        Some("tok-exchanged")
    );
    assert_eq!(h.store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    assert!(h.manager.state().session.unwrap().expires_at.is_some());
    assert_eq!(h.navigator.current_url().as_str(), "http://app.local/");
    assert_eq!(h.navigator.history_len(), 1);
}

#[tokio::test]
async fn test_rejected_code_leaves_store_alone() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;

    Mock::given(method("POST"))
        .and(path("/auth/google/callback"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "invalid_grant" })),
        )
        .mount(&h.server)
        .await;

    h.manager.initialize().await.unwrap();
    let result = h.manager.complete_login("code1").await;

    assert!(matches!(result, Err(AuthError::Provider(_))));
    assert!(!h.manager.is_authenticated());
    assert!(!h.manager.is_loading());
    assert!(h.manager.error().is_some());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_rejected_code_keeps_prior_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;
    seed_session(&h.store, "tok-stored");

    Mock::given(method("POST"))
        .and(path("/auth/google/callback"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    h.manager.initialize().await.unwrap();
    assert!(h.manager.complete_login("code1").await.is_err());

    assert_eq!(h.manager.access_token().as_deref(), Some("tok-stored"));
    assert_eq!(
        h.store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
        Some("tok-stored")
    );
}

#[tokio::test]
async fn test_unsuccessful_exchange_is_rejected() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;

    Mock::given(method("POST"))
        .and(path("/auth/google/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "user": null,
            "tokens": null
        })))
        .mount(&h.server)
        .await;

    let result = h.manager.complete_login("code1").await;

    assert!(matches!(result, Err(AuthError::Provider(_))));
    assert!(!h.manager.is_authenticated());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_refresh_updates_profile() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;
    seed_session(&h.store, "tok123");

    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .and(query_param("access_token", "tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {
                "id": "u1",
                "email": "ann@b.com",
                "name": "Ann B",
                "picture": "http://x/p2.png",
                "verified_email": true
            }
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.initialize().await.unwrap();
    h.manager.refresh().await.unwrap();

    let user = h.manager.user().unwrap();
    assert_eq!(user.name, "Ann B");
    assert_eq!(user.email, "ann@b.com");
    let stored: UserProfile =
        serde_json::from_str(&h.store.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored, user);
    assert!(!h.manager.is_loading());
}

#[tokio::test]
async fn test_refresh_rejection_forces_logout() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;
    seed_session(&h.store, "tok-stale");

    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    h.manager.initialize().await.unwrap();
    let result = h.manager.refresh().await;

    assert!(matches!(result, Err(AuthError::InvalidSession(_))));
    assert!(!h.manager.is_authenticated());
    assert!(h.store.is_empty());
    assert!(h.manager.error().is_some());
    assert!(!h.manager.is_loading());
}

#[tokio::test]
async fn test_refresh_transport_failure_forces_logout() {
    let Some(client) = unreachable_client() else {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    };
    let store = Arc::new(MemoryStore::new());
    seed_session(&store, "tok123");
    let navigator = Arc::new(StaticNavigator::new(Url::parse("http://app.local/").unwrap()));
    let manager = SessionManager::new(client, store.clone(), navigator);

    manager.initialize().await.unwrap();
    assert!(manager.is_authenticated());
    let result = manager.refresh().await;

    assert!(matches!(result, Err(AuthError::InvalidSession(_))));
    assert!(!manager.is_authenticated());
    assert!(store.is_empty());
    assert!(manager.error().is_some());
    assert!(!manager.is_loading());
}

#[tokio::test]
async fn test_logout_during_refresh_leaves_store_empty() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;
    seed_session(&h.store, "tok123");

    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "user": {
                        "id": "u1",
                        "email": "ann@b.com",
                        "name": "Ann B",
                        "picture": "http://x/p2.png",
                        "verified_email": true
                    }
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    h.manager.initialize().await.unwrap();
    let (refreshed, ()) = tokio::join!(h.manager.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.manager.logout();
    });

    assert!(refreshed.is_ok());
    assert!(!h.manager.is_authenticated());
    assert!(h.store.is_empty());
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
    assert!(!h.manager.is_loading());
}

#[tokio::test]
async fn test_login_redirects_to_provider() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;
    let auth_url = "https://accounts.google.com/o/oauth2/v2/auth?client_id=abc&response_type=code";

    Mock::given(method("GET"))
        .and(path("/auth/google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth_url": auth_url })))
        .mount(&h.server)
        .await;

    h.manager.login().await.unwrap();

    assert_eq!(
        h.navigator.last_redirect(),
        Some(Url::parse(auth_url).unwrap())
    );
    assert_eq!(h.navigator.history_len(), 2);
    assert!(!h.manager.is_loading());
}

#[tokio::test]
async fn test_login_network_failure_does_not_navigate() {
    let Some(client) = unreachable_client() else {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    };
    let store = Arc::new(MemoryStore::new());
    let navigator = Arc::new(StaticNavigator::new(Url::parse("http://app.local/").unwrap()));
    let manager = SessionManager::new(client, store, navigator.clone());

    let result = manager.login().await;

    assert!(matches!(result, Err(AuthError::Network(_))));
    assert!(!manager.is_loading());
    assert!(manager.error().is_some());
    assert!(navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_login_rejects_unusable_auth_url() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;

    Mock::given(method("GET"))
        .and(path("/auth/google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth_url": "not a url" })))
        .mount(&h.server)
        .await;

    let result = h.manager.login().await;

    assert!(matches!(result, Err(AuthError::Provider(_))));
    assert!(h.manager.error().is_some());
    assert!(!h.manager.is_loading());
    assert!(h.navigator.redirects().is_empty());
    assert_eq!(h.navigator.history_len(), 1);
}

#[tokio::test]
async fn test_login_while_busy_is_rejected() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let h = harness("http://app.local/").await;

    Mock::given(method("GET"))
        .and(path("/auth/google"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "auth_url": "https://accounts.google.com/o/oauth2/v2/auth" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let (first, second) = tokio::join!(h.manager.login(), h.manager.login());

    assert!(first.is_ok());
    assert_eq!(second, Err(AuthError::Busy));
    assert_eq!(h.navigator.redirects().len(), 1);
    assert!(!h.manager.is_loading());
    assert_eq!(h.manager.error(), None);
}
