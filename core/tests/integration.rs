//! End-to-end calls against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and talks to it through
//! the default `reqwest` transport, so request building, the wire format and
//! response parsing are exercised together over real HTTP.

use std::time::Duration;

use emitkit::{CreateEvent, EmitKit, Error, ErrorKind, Identify, RequestOptions};
use mock_server::{AppState, MockConfig, DEFAULT_API_KEY};

async fn start(config: MockConfig) -> (String, AppState) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(config);
    tokio::spawn(mock_server::serve(listener, state.clone()));
    (format!("http://{addr}"), state)
}

fn client(base_url: &str) -> EmitKit {
    EmitKit::builder(DEFAULT_API_KEY)
        .base_url(base_url)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn create_event_round_trip() {
    let (base_url, state) = start(MockConfig::default()).await;
    let client = client(&base_url);

    let event = CreateEvent::new("payments", "Payment Received")
        .description("User upgraded to Pro plan")
        .tag("payment")
        .metadata("amount", 99.99)
        .notify(true)
        .display_as(emitkit::DisplayAs::Notification);
    let result = client.events().create(&event).await.unwrap();

    assert!(result.data.id.starts_with("evt_"));
    assert_eq!(result.data.channel_name.as_deref(), Some("payments"));
    assert_eq!(result.data.tags, vec!["payment"]);
    assert_eq!(result.data.display_as.as_deref(), Some("notification"));
    assert!(result.request_id.starts_with("req_"));
    assert!(!result.was_replayed);
    assert_eq!(result.rate_limit.limit, 100);
    assert_eq!(client.rate_limit().unwrap().remaining, 99);
    assert_eq!(state.event_count().await, 1);
}

#[tokio::test]
async fn retry_with_same_idempotency_key_is_replayed() {
    let (base_url, state) = start(MockConfig::default()).await;
    let client = client(&base_url);
    let event = CreateEvent::new("payments", "Payment Received").metadata("paymentId", "payment_123");
    let options = RequestOptions::new().idempotency_key("payment-payment_123-webhook");

    let first = client.events().create_with_options(&event, &options).await.unwrap();
    let second = client.events().create_with_options(&event, &options).await.unwrap();

    assert!(!first.was_replayed);
    assert!(second.was_replayed);
    assert_eq!(first.data, second.data);
    assert_eq!(first.request_id, second.request_id);
    assert_eq!(state.event_count().await, 1);
}

#[tokio::test]
async fn empty_title_is_validation_error() {
    let (base_url, _) = start(MockConfig::default()).await;
    let client = client(&base_url);

    let err = client
        .events()
        .create(&CreateEvent::new("test", ""))
        .await
        .unwrap_err();

    let fields = err.field_errors().expect("validation error");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].path, vec!["title"]);
    assert!(err.request_id().is_some());
}

#[tokio::test]
async fn wrong_api_key_is_unauthorized() {
    let (base_url, _) = start(MockConfig::default()).await;
    let client = EmitKit::builder("invalid_key").base_url(&base_url).build().unwrap();

    let err = client.events().create(&CreateEvent::new("test", "Test")).await.unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert_eq!(err.message(), "Unauthorized");
    assert!(client.rate_limit().is_none());
}

#[tokio::test]
async fn exhausted_rate_limit_is_reported() {
    let (base_url, _) = start(MockConfig {
        rate_limit: 2,
        ..MockConfig::default()
    })
    .await;
    let client = client(&base_url);
    let event = CreateEvent::new("test", "Test");

    client.events().create(&event).await.unwrap();
    client.events().create(&event).await.unwrap();
    let err = client.events().create(&event).await.unwrap_err();

    match &err {
        Error::RateLimited(limited) => {
            assert_eq!(limited.rate_limit.limit, 2);
            assert_eq!(limited.rate_limit.remaining, 0);
            assert!(limited.rate_limit.reset_in_ms <= 60_000);
        }
        other => panic!("expected rate limit error, got {other:?}"),
    }
    assert_eq!(client.rate_limit().unwrap().remaining, 0);
}

#[tokio::test]
async fn identify_reports_alias_conflicts() {
    let (base_url, _) = start(MockConfig::default()).await;
    let client = client(&base_url);

    client
        .identity()
        .identify(&Identify::new("alice").alias("test@example.com"))
        .await
        .unwrap();

    let payload = Identify::new("user_456")
        .property("email", "test@example.com")
        .property("name", "Test User")
        .alias("test@example.com")
        .alias("testuser");
    let result = client.identity().identify(&payload).await.unwrap();

    assert_eq!(result.data.user_id, "user_456");
    assert_eq!(result.data.properties["name"], "Test User");
    assert_eq!(result.data.aliases.created, vec!["testuser"]);
    assert_eq!(result.data.aliases.failed[0].alias, "test@example.com");
    assert_eq!(result.data.aliases.failed[0].reason, "Alias already exists");
}

#[tokio::test]
async fn identify_without_user_id_is_validation_error() {
    let (base_url, _) = start(MockConfig::default()).await;
    let client = client(&base_url);

    let err = client.identity().identify(&Identify::default()).await.unwrap_err();

    let fields = err.field_errors().expect("validation error");
    assert_eq!(fields[0].path, vec!["user_id"]);
}

#[tokio::test]
async fn slow_server_times_out() {
    let (base_url, _) = start(MockConfig {
        latency: Duration::from_millis(500),
        ..MockConfig::default()
    })
    .await;
    let client = client(&base_url);
    let options = RequestOptions::new().timeout(Duration::from_millis(50));

    let err = client
        .events()
        .create_with_options(&CreateEvent::new("test", "Test"), &options)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client(&format!("http://{addr}"));

    let err = client.events().create(&CreateEvent::new("test", "Test")).await.unwrap_err();

    assert!(matches!(&err, Error::Generic(generic) if generic.kind == ErrorKind::Network));
    assert_eq!(err.status_code(), None);
}
