use indoc::indoc;
use integration_tests::TestServer;

#[tokio::test]
async fn health_endpoint_enabled() {
    let server = TestServer::start("").await;

    let response = server.client.get("/health").await;
    let status = response.status().as_u16();
    let body = response.text().await.unwrap();

    assert_eq!(status, 200);
    insta::assert_snapshot!(body, @r#"{"status":"healthy"}"#);
}

#[tokio::test]
async fn health_endpoint_custom_path() {
    let config = indoc! {r#"
        [server.health]
        path = "/live"
    "#};

    let server = TestServer::start(config).await;

    assert_eq!(server.client.get("/live").await.status().as_u16(), 200);
    assert_eq!(server.client.get("/health").await.status().as_u16(), 404);
}

#[tokio::test]
async fn health_endpoint_disabled() {
    let config = indoc! {r#"
        [server.health]
        enabled = false
    "#};

    let server = TestServer::start(config).await;

    assert_eq!(server.client.get("/health").await.status().as_u16(), 404);
}

#[tokio::test]
async fn health_is_never_guarded() {
    let config = indoc! {r#"
        [guard.default]
        limit = 1
        window = "60s"
    "#};

    let server = TestServer::start(config).await;

    for _ in 1..=5 {
        let response = server.client.get("/health").await;

        assert_eq!(response.status().as_u16(), 200);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}
