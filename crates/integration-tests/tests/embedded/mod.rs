//! The guard embedded as a tower layer in a host application's router.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use config::{GuardConfig, RateLimitQuota};
use integration_tests::{TestClient, quota_headers};
use rate_limit::{Guard, InMemoryStorage};
use server::{GuardLayer, Principal};
use tokio::net::TcpListener;

async fn authenticate(mut req: Request, next: Next) -> Response {
    let user = req
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    if let Some(user) = user {
        req.extensions_mut().insert(Principal(user));
    }

    next.run(req).await
}

async fn spawn_app(limit: u32) -> TestClient {
    let guard = Arc::new(Guard::new(Arc::new(InMemoryStorage::new()), &GuardConfig::default()));

    let quota = RateLimitQuota {
        limit,
        window: Duration::from_secs(60),
    };

    let app = Router::new()
        .route(
            "/debates",
            post(|| async { "created" }).layer(GuardLayer::new(guard, "createDebate", quota)),
        )
        .layer(middleware::from_fn(authenticate));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    TestClient::new(format!("http://{address}"))
}

async fn create_debate(client: &TestClient, token: &str) -> reqwest::Response {
    client
        .request(reqwest::Method::POST, "/debates")
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn handler_runs_when_admitted() {
    let client = spawn_app(2).await;

    let response = create_debate(&client, "userA").await;
    let headers = quota_headers(&response);

    assert_eq!(response.text().await.unwrap(), "created");

    insta::assert_json_snapshot!(headers, @r#"
    {
      "limit": "2",
      "remaining": "1",
      "reset": true,
      "retry_after": null,
      "status": 200
    }
    "#);
}

#[tokio::test]
async fn peer_address_is_used_without_forwarding_headers() {
    let client = spawn_app(4).await;

    for _ in 1..=4 {
        assert_eq!(create_debate(&client, "userA").await.status().as_u16(), 200);
    }

    // 5..=8 are over the limit, the ninth crosses twice the limit and flags 127.0.0.1.
    for _ in 5..=9 {
        assert_eq!(create_debate(&client, "userA").await.status().as_u16(), 429);
    }

    let response = create_debate(&client, "userB").await;
    let status = response.status().as_u16();
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(status, 403);

    insta::assert_json_snapshot!(body, @r#"
    {
      "message": "Access denied",
      "statusCode": 403
    }
    "#);
}
