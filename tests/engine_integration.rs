//! HTTP contract tests for the access-control engine.
//!
//! A `wiremock` server plays the memory service; the engine talks to it
//! through the production `HttpMemoryService`.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use keepr::remote::CORRELATION_HEADER;
use keepr::{
    AccessControlEngine, CollectionScope, Error, HttpMemoryService, MemoryId, NewMemory,
    Provenance, SessionContext, placeholder_collection,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_for(server: &MockServer, session: SessionContext) -> AccessControlEngine {
    engine_with_scope(server, session, CollectionScope::Wall)
}

fn engine_with_scope(
    server: &MockServer,
    session: SessionContext,
    scope: CollectionScope,
) -> AccessControlEngine {
    let service = Arc::new(HttpMemoryService::new(format!("{}/api", server.uri())));
    AccessControlEngine::new(service, Arc::new(session), scope)
}

fn wall(picnic_locked: bool) -> serde_json::Value {
    let picnic = if picnic_locked {
        json!({
            "id": 2, "title": "Picnic in the Park",
            "description": "Blue blanket, polaroids, too many cherries.",
            "imageUrl": "https://images.example.com/picnic.jpg",
            "isLocked": true, "createdAt": "2024-02-20",
            "user": {"name": "Ana", "email": "ana@example.com"}
        })
    } else {
        json!({
            "id": 2, "title": "Picnic in the Park",
            "description": "Blue blanket, polaroids, too many cherries.",
            "imageUrl": "https://images.example.com/picnic.jpg",
            "isLocked": false, "keyword": "cherries", "createdAt": "2024-02-20",
            "user": {"name": "Ana", "email": "ana@example.com"}
        })
    };
    json!([
        {
            "id": 1, "title": "Sunset Beach",
            "description": "Warm breeze, pastel sky, first trip together.",
            "imageUrl": "https://images.example.com/sunset.jpg",
            "isLocked": true, "createdAt": "2024-01-15T10:30:00Z"
        },
        picnic
    ])
}

async fn mount_wall_once(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/memories/unlocked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

fn picnic_id() -> MemoryId {
    MemoryId::parse("2").expect("valid id")
}

#[tokio::test]
async fn test_load_normalizes_server_collection() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;
    let engine = engine_for(&server, SessionContext::anonymous());

    let load = engine.load_collection().await;

    assert!(load.is_authoritative());
    let ids: Vec<_> = load.memories().iter().map(|m| m.id.to_string()).collect();
    assert_eq!(ids, ["1", "2"]);
    assert!(load.memories().iter().all(|m| m.is_locked()));
    assert!(load.memories().iter().all(|m| m.revealed_keyword().is_none()));
    assert_eq!(engine.provenance(), Provenance::Authoritative);
    assert_eq!(
        engine.get(&picnic_id()).and_then(|m| m.owner).map(|o| o.name),
        Some("Ana".to_string())
    );
}

#[tokio::test]
async fn test_load_keeps_good_records_around_bad_ones() {
    let server = MockServer::start().await;
    mount_wall_once(
        &server,
        json!([
            {"id": 1, "title": "Sunset Beach", "isLocked": true,
             "createdAt": "2024-01-15T10:30:00Z"},
            {"id": 2, "title": "Picnic in the Park", "isLocked": true,
             "createdAt": "2024-01-16 10:30:00"},
            {"id": 3, "title": "Grandma's Birthday", "createdAt": "someday"},
            {"title": "No id at all", "createdAt": "2024-03-10"}
        ]),
    )
    .await;
    let engine = engine_for(&server, SessionContext::anonymous());

    let load = engine.load_collection().await;

    assert!(load.is_authoritative());
    let titles: Vec<_> = load.memories().iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, ["Sunset Beach", "Picnic in the Park"]);
    assert_eq!(engine.provenance(), Provenance::Authoritative);
}

#[tokio::test]
async fn test_wrong_keyword_is_rejected_and_state_unchanged() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;
    Mock::given(method("POST"))
        .and(path("/api/memories/unlock/2"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Incorrect keyword!"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    engine.load_collection().await;
    let before = engine.snapshot();

    match engine.attempt_unlock(&picnic_id(), "wrong").await {
        Err(Error::Rejected { message }) => assert_eq!(message, "Incorrect keyword!"),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(engine.snapshot(), before);
    assert!(engine.get(&picnic_id()).is_some_and(|m| m.is_locked()));
}

#[tokio::test]
async fn test_correct_keyword_unlocks_and_refreshes() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;
    mount_wall_once(&server, wall(false)).await;
    Mock::given(method("POST"))
        .and(path("/api/memories/unlock/2"))
        .and(body_json(json!({"keyword": "cherries"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Memory unlocked successfully",
            "memory": {"id": 2, "title": "Picnic in the Park", "isLocked": false,
                       "keyword": "cherries", "createdAt": "2024-02-20"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    engine.load_collection().await;

    let receipt = engine
        .attempt_unlock(&picnic_id(), "cherries")
        .await
        .expect("unlock accepted");

    assert!(receipt.transitioned);
    assert_eq!(receipt.message.as_deref(), Some("Memory unlocked successfully"));
    assert_eq!(
        receipt.memory.as_ref().and_then(|m| m.revealed_keyword()),
        Some("cherries")
    );
    assert!(receipt.refresh.is_authoritative());

    let picnic = engine.get(&picnic_id()).expect("still present");
    assert!(!picnic.is_locked());
    assert_eq!(picnic.revealed_keyword(), Some("cherries"));
    assert!(engine.get(&MemoryId::parse("1").expect("id")).is_some_and(|m| m.is_locked()));
}

#[tokio::test]
async fn test_accepted_unlock_survives_stale_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/memories/unlocked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wall(true)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/memories/unlock/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    engine.load_collection().await;

    let receipt = engine
        .attempt_unlock(&picnic_id(), "cherries")
        .await
        .expect("unlock accepted");
    assert!(receipt.transitioned);
    assert!(receipt.refresh.is_authoritative());

    let picnics: Vec<_> = engine
        .snapshot()
        .into_iter()
        .filter(|m| m.id == picnic_id())
        .collect();
    assert_eq!(picnics.len(), 1);
    assert!(!picnics[0].is_locked());

    // A later load that still reports the memory locked does not re-lock it.
    assert!(engine.load_collection().await.is_authoritative());
    assert!(engine.get(&picnic_id()).is_some_and(|m| !m.is_locked()));
    assert!(engine.get(&MemoryId::parse("1").expect("id")).is_some_and(|m| m.is_locked()));
}

#[tokio::test]
async fn test_failed_refresh_keeps_unlocked_collection() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;
    Mock::given(method("GET"))
        .and(path("/api/memories/unlocked"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/memories/unlock/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    engine.load_collection().await;

    let receipt = engine
        .attempt_unlock(&picnic_id(), "cherries")
        .await
        .expect("unlock accepted");

    assert!(receipt.refresh.is_retained());
    assert!(matches!(
        receipt.refresh.failure(),
        Some(Error::Unavailable { .. })
    ));
    assert_eq!(engine.provenance(), Provenance::Authoritative);
    assert_eq!(engine.snapshot().len(), 2);
    assert!(engine.get(&picnic_id()).is_some_and(|m| !m.is_locked()));
}

#[tokio::test]
async fn test_keyword_submitted_untrimmed() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;
    mount_wall_once(&server, wall(false)).await;
    Mock::given(method("POST"))
        .and(path("/api/memories/unlock/2"))
        .and(body_json(json!({"keyword": " cherries "})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    engine.load_collection().await;

    let receipt = engine
        .attempt_unlock(&picnic_id(), " cherries ")
        .await
        .expect("unlock accepted");
    assert!(receipt.transitioned);
    assert!(receipt.message.is_none());
}

#[tokio::test]
async fn test_blank_keyword_never_reaches_service() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    engine.load_collection().await;

    for keyword in ["", "   ", "\t"] {
        let err = engine.attempt_unlock(&picnic_id(), keyword).await;
        assert!(matches!(err, Err(Error::InvalidInput(_))), "keyword {keyword:?}");
    }
}

#[tokio::test]
async fn test_unknown_id_is_precondition_failure() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    engine.load_collection().await;
    let before = engine.snapshot();

    let missing = MemoryId::parse("999").expect("id");
    let err = engine.attempt_unlock(&missing, "anything").await;
    assert!(matches!(err, Err(Error::PreconditionFailed(_))));
    assert_eq!(engine.snapshot(), before);
}

#[tokio::test]
async fn test_server_error_falls_back_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/memories/unlocked"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    let load = engine.load_collection().await;

    assert!(load.is_degraded());
    assert_eq!(load.memories(), placeholder_collection().as_slice());
    assert_eq!(engine.provenance(), Provenance::Placeholder);
    match load {
        keepr::CollectionLoad::Degraded { reason, .. } => {
            assert!(matches!(reason, Error::Unavailable { .. }));
        },
        other => panic!("expected degraded load, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_object_falls_back_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/memories/unlocked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "Unauthorized"})))
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    let load = engine.load_collection().await;

    match load {
        keepr::CollectionLoad::Degraded { memories, reason } => {
            assert!(!memories.is_empty());
            assert_eq!(reason.user_message(), "Unauthorized");
        },
        other => panic!("expected degraded load, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_service_falls_back() {
    // Nothing listens on the reserved port.
    let service = Arc::new(HttpMemoryService::new("http://127.0.0.1:9/api"));
    let engine = AccessControlEngine::new(
        service,
        Arc::new(SessionContext::anonymous()),
        CollectionScope::Wall,
    );

    let load = engine.load_collection().await;
    assert!(load.is_degraded());
    assert_eq!(engine.snapshot(), placeholder_collection());
}

#[tokio::test]
async fn test_bearer_and_correlation_headers_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/memories/unlocked"))
        .and(header("authorization", "Bearer session-token"))
        .and(header_exists(CORRELATION_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(wall(true)))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/memories/unlock/2"))
        .and(header("authorization", "Bearer session-token"))
        .and(header_exists(CORRELATION_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::with_token("session-token"));
    assert!(engine.load_collection().await.is_authoritative());
    engine
        .attempt_unlock(&picnic_id(), "cherries")
        .await
        .expect("unlock accepted");

    // The unlock and its refresh share one correlation id.
    let requests = server.received_requests().await.expect("recording enabled");
    let ids: Vec<_> = requests
        .iter()
        .map(|r| {
            r.headers
                .get(CORRELATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .collect();
    assert_eq!(ids.len(), 3);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(ids[1], ids[2]);
}

#[tokio::test]
async fn test_anonymous_session_omits_authorization() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;

    let engine = engine_for(&server, SessionContext::anonymous());
    assert!(engine.load_collection().await.is_authoritative());

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_owned_scope_uses_profile_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/profile/memories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wall(false)))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_with_scope(
        &server,
        SessionContext::with_token("t"),
        CollectionScope::Owned,
    );
    let load = engine.load_collection().await;
    assert!(load.is_authoritative());
    assert_eq!(load.memories().len(), 2);
}

#[tokio::test]
async fn test_create_memory_forwards_and_returns_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/memories"))
        .and(body_json(json!({
            "title": "Slow Sunday",
            "description": "Cinnamon coffee and soft jazz.",
            "imageUrl": "",
            "keyword": "cinnamon"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "memory": {"id": 17, "title": "Slow Sunday", "isLocked": true, "createdAt": "2024-05-12"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::with_token("t"));
    let id = engine
        .create_memory(
            NewMemory::new("  Slow Sunday ", "cinnamon")
                .with_description("Cinnamon coffee and soft jazz."),
        )
        .await
        .expect("created");

    assert_eq!(id.as_str(), "17");
    assert!(engine.snapshot().is_empty());
}

#[tokio::test]
async fn test_create_memory_rejection_is_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/memories"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Title taken"})))
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::with_token("t"));
    let err = engine.create_memory(NewMemory::new("Title", "kw")).await;
    match err {
        Err(Error::Rejected { message }) => assert_eq!(message, "Title taken"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_unlock_response_is_unavailable() {
    let server = MockServer::start().await;
    mount_wall_once(&server, wall(true)).await;
    Mock::given(method("POST"))
        .and(path("/api/memories/unlock/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let engine = engine_for(&server, SessionContext::anonymous());
    engine.load_collection().await;

    let err = engine.attempt_unlock(&picnic_id(), "cherries").await;
    assert!(matches!(err, Err(Error::Unavailable { .. })));
    assert!(engine.get(&picnic_id()).is_some_and(|m| m.is_locked()));
}
