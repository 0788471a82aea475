use std::time::Duration;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use niabot_api_client::mojang::MojangClient;
use niabot_api_client::rate_limit::{Budget, Limiter, RateLimitConfig};
use niabot_api_client::{ApiClients, NiaError};

const NOTCH_UUID: &str = "069a79f444e94726a5befca90e38aaf5";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn build_client(server: &MockServer) -> MojangClient {
    init_tracing();
    MojangClient::builder()
        .api_url(server.uri())
        .sessionserver_url(server.uri())
        .build()
}

#[tokio::test]
async fn test_username_to_uuid() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/profiles/minecraft/Notch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": NOTCH_UUID,
            "name": "Notch"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let uuid = client.username_to_uuid("Notch").await.unwrap();

    assert_eq!(uuid.as_deref(), Some(NOTCH_UUID));
    assert_eq!(client.profile_limit().remaining(), 59);
}

#[tokio::test]
async fn test_unknown_username_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/profiles/minecraft/nobody"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/profiles/minecraft/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorMessage": "Couldn't find any profile with name ghost"
        })))
        .mount(&server)
        .await;

    let client = build_client(&server);
    assert_eq!(client.username_to_uuid("nobody").await.unwrap(), None);
    assert_eq!(client.username_to_uuid("ghost").await.unwrap(), None);
}

#[tokio::test]
async fn test_invalid_username_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = build_client(&server);
    assert_eq!(client.username_to_uuid("../admin").await.unwrap(), None);
    assert_eq!(client.profile_limit().remaining(), 60);
}

#[tokio::test]
async fn test_usernames_to_uuids_posts_valid_names() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/profiles/minecraft"))
        .and(body_json(json!(["notch", "jeb_"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": NOTCH_UUID, "name": "Notch" },
            { "id": "853c80ef3c3749fdaa49938b674adae6", "name": "jeb_" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let profiles = client
        .usernames_to_uuids(&["notch", "not a name", "jeb_"])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        profiles,
        vec![
            ("Notch".to_string(), NOTCH_UUID.to_string()),
            (
                "jeb_".to_string(),
                "853c80ef3c3749fdaa49938b674adae6".to_string()
            ),
        ]
    );
    assert_eq!(client.bulk_limit().remaining(), 19);
}

#[tokio::test]
async fn test_usernames_to_uuids_rejects_large_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let names: Vec<String> = (0..11).map(|i| format!("player{}", i)).collect();
    let result = client.usernames_to_uuids(&names).await;

    assert!(matches!(result, Err(NiaError::InvalidArgument(_))));
    assert_eq!(client.bulk_limit().remaining(), 20);
}

#[tokio::test]
async fn test_resolve_usernames_splits_into_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/profiles/minecraft"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": NOTCH_UUID, "name": "Notch" }
        ])))
        .expect(3)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let names: Vec<String> = (0..23).map(|i| format!("player{}", i)).collect();
    let profiles = client.resolve_usernames(&names).await.unwrap();

    assert_eq!(profiles.len(), 3);
    assert_eq!(client.bulk_limit().remaining(), 17);
}

#[tokio::test]
async fn test_uuid_to_username_uses_sessionserver() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/session/minecraft/profile/{}", NOTCH_UUID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": NOTCH_UUID,
            "name": "Notch",
            "properties": [{ "name": "textures", "value": "e30=" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let name = client
        .uuid_to_username("069a79f4-44e9-4726-a5be-fca90e38aaf5")
        .await
        .unwrap();

    assert_eq!(name.as_deref(), Some("Notch"));
    assert_eq!(client.sessionserver_limit().remaining(), 199);
    assert_eq!(client.profile_limit().remaining(), 60);
}

#[tokio::test]
async fn test_uuid_to_username_rejects_malformed_uuid() {
    let server = MockServer::start().await;
    let client = build_client(&server);

    let result = client.uuid_to_username("not-a-uuid").await;
    assert!(matches!(result, Err(NiaError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_exhausted_budget_holds_requests_back() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/profiles/minecraft/Notch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": NOTCH_UUID,
            "name": "Notch"
        })))
        .expect(2)
        .mount(&server)
        .await;

    init_tracing();
    let config = RateLimitConfig {
        mojang_profiles: Budget::per_minute(2),
        ..RateLimitConfig::default()
    };
    let client = MojangClient::builder()
        .api_url(server.uri())
        .rate_limits(config)
        .build();

    client.username_to_uuid("Notch").await.unwrap();
    client.username_to_uuid("Notch").await.unwrap();

    // The third lookup must wait for a slot a minute away.
    let third = tokio::time::timeout(
        Duration::from_millis(200),
        client.username_to_uuid("Notch"),
    )
    .await;
    assert!(third.is_err());
    assert_eq!(client.profile_limit().free_capacity(), 0);
}

#[tokio::test]
async fn test_clients_report_capacity_after_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/profiles/minecraft/Notch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": NOTCH_UUID,
            "name": "Notch"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/player/Notch"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining-minute", "100")
                .set_body_json(json!({ "username": "Notch" })),
        )
        .mount(&server)
        .await;

    let config = RateLimitConfig::default();
    let clients = ApiClients::new(
        build_client(&server),
        niabot_api_client::wynncraft::WynncraftClient::builder()
            .base_url(server.uri())
            .rate_limits(config)
            .build(),
    );
    let reservation = clients.wynncraft().reserve(10).unwrap();

    clients.mojang().username_to_uuid("Notch").await.unwrap();
    let _: Option<serde_json::Value> = clients.wynncraft().player("Notch").await.unwrap();

    // 59 + 20 + 200 for Mojang, 100 - 10 reserved for Wynncraft.
    assert_eq!(clients.total_free_capacity(), 59 + 20 + 200 + 90);

    let status = clients.limiter_status();
    assert_eq!(status.len(), 4);
    let wynncraft = status.iter().find(|s| s.name == "wynncraft").unwrap();
    assert_eq!(wynncraft.capacity, 120);
    assert_eq!(wynncraft.free, 90);

    drop(reservation);
    assert_eq!(clients.total_free_capacity(), 59 + 20 + 200 + 100);
}
