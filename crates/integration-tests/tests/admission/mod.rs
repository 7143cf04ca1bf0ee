use indoc::indoc;
use integration_tests::{TestServer, quota_headers};
use serde_json::json;

const CONFIG: &str = indoc! {r#"
    [guard]
    principal_header = "x-user-id"

    [guard.operations.createDebate]
    limit = 10
    window = "60s"
"#};

#[tokio::test]
async fn admitted_request_reports_quota() {
    let server = TestServer::start(CONFIG).await;

    let response = server.client.admission("createDebate", "1.1.1.1", Some("userA")).await;

    insta::assert_json_snapshot!(quota_headers(&response), @r#"
    {
      "limit": "10",
      "remaining": "9",
      "reset": true,
      "retry_after": null,
      "status": 204
    }
    "#);
}

#[tokio::test]
async fn abuse_escalates_to_address_blacklist() {
    let server = TestServer::start(CONFIG).await;
    let mut results = Vec::new();

    for request in 1..=21 {
        let response = server.client.admission("createDebate", "1.1.1.1", Some("userA")).await;

        if [1, 10, 11, 20, 21].contains(&request) {
            let mut entry = quota_headers(&response);
            entry["request"] = json!(request);
            results.push(entry);
        }
    }

    // Same address, different principal: a fresh counter, but the address is flagged.
    let response = server.client.admission("createDebate", "1.1.1.1", Some("userB")).await;
    let blacklisted_headers = quota_headers(&response);
    let blacklisted_body: serde_json::Value = response.json().await.unwrap();

    // Another address is unaffected.
    let response = server.client.admission("createDebate", "2.2.2.2", Some("userA")).await;
    let other_address = quota_headers(&response);

    insta::assert_json_snapshot!(json!({
        "userA": results,
        "userB": { "headers": blacklisted_headers, "body": blacklisted_body },
        "other_address": other_address,
    }), @r#"
    {
      "other_address": {
        "limit": "10",
        "remaining": "9",
        "reset": true,
        "retry_after": null,
        "status": 204
      },
      "userA": [
        {
          "limit": "10",
          "remaining": "9",
          "request": 1,
          "reset": true,
          "retry_after": null,
          "status": 204
        },
        {
          "limit": "10",
          "remaining": "0",
          "request": 10,
          "reset": true,
          "retry_after": null,
          "status": 204
        },
        {
          "limit": "10",
          "remaining": "0",
          "request": 11,
          "reset": true,
          "retry_after": "60",
          "status": 429
        },
        {
          "limit": "10",
          "remaining": "0",
          "request": 20,
          "reset": true,
          "retry_after": "60",
          "status": 429
        },
        {
          "limit": "10",
          "remaining": "0",
          "request": 21,
          "reset": true,
          "retry_after": "60",
          "status": 429
        }
      ],
      "userB": {
        "body": {
          "message": "Access denied",
          "statusCode": 403
        },
        "headers": {
          "limit": "10",
          "remaining": "9",
          "reset": true,
          "retry_after": null,
          "status": 403
        }
      }
    }
    "#);
}

#[tokio::test]
async fn exceeded_body() {
    let server = TestServer::start(CONFIG).await;

    for _ in 1..=10 {
        server.client.admission("createDebate", "3.3.3.3", Some("userA")).await;
    }

    let response = server.client.admission("createDebate", "3.3.3.3", Some("userA")).await;
    let body: serde_json::Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "current": 11,
      "limit": 10,
      "message": "Too many requests",
      "retryAfter": 60,
      "statusCode": 429
    }
    "#);
}

#[tokio::test]
async fn operations_are_counted_separately() {
    let config = indoc! {r#"
        [guard]
        principal_header = "x-user-id"

        [guard.operations.createDebate]
        limit = 1
        window = "60s"

        [guard.operations.createComment]
        limit = 1
        window = "60s"
    "#};

    let server = TestServer::start(config).await;

    let debate = server.client.admission("createDebate", "1.1.1.1", Some("userA")).await;
    let comment = server.client.admission("createComment", "1.1.1.1", Some("userA")).await;
    let debate_again = server.client.admission("createDebate", "1.1.1.1", Some("userA")).await;

    let statuses = [debate.status(), comment.status(), debate_again.status()].map(|status| status.as_u16());

    assert_eq!(statuses, [204, 204, 429]);
}

#[tokio::test]
async fn anonymous_callers_share_their_address_counter() {
    let config = indoc! {r#"
        [guard.operations.createDebate]
        limit = 1
        window = "60s"
    "#};

    let server = TestServer::start(config).await;

    // Without a trusted principal header the user id is ignored.
    let first = server.client.admission("createDebate", "4.4.4.4", Some("userA")).await;
    let second = server.client.admission("createDebate", "4.4.4.4", Some("userB")).await;

    assert_eq!(first.status().as_u16(), 204);
    assert_eq!(second.status().as_u16(), 429);
}

#[tokio::test]
async fn first_forwarded_address_is_tracked() {
    let server = TestServer::start(CONFIG).await;

    let first = server
        .client
        .admission("createDebate", "5.5.5.5, 10.0.0.1", Some("userA"))
        .await;

    let second = server.client.admission("createDebate", "5.5.5.5", Some("userA")).await;

    assert_eq!(first.headers()["x-ratelimit-remaining"], "9");
    assert_eq!(second.headers()["x-ratelimit-remaining"], "8");
}

#[tokio::test]
async fn default_quota_covers_unlisted_operations() {
    let config = indoc! {r#"
        [guard.default]
        limit = 5
        window = "10s"
    "#};

    let server = TestServer::start(config).await;
    let response = server.client.admission("anything", "1.1.1.1", None).await;

    insta::assert_json_snapshot!(quota_headers(&response), @r#"
    {
      "limit": "5",
      "remaining": "4",
      "reset": true,
      "retry_after": null,
      "status": 204
    }
    "#);
}

#[tokio::test]
async fn unknown_operation() {
    let server = TestServer::start(CONFIG).await;

    let response = server.client.admission("deleteEverything", "1.1.1.1", None).await;
    let status = response.status().as_u16();
    let body: serde_json::Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(json!({ "status": status, "body": body }), @r#"
    {
      "body": {
        "message": "Unknown operation",
        "statusCode": 404
      },
      "status": 404
    }
    "#);
}

#[tokio::test]
async fn disabled_guard_admits_without_headers() {
    let config = indoc! {r#"
        [guard]
        enabled = false

        [guard.operations.createDebate]
        limit = 1
        window = "60s"
    "#};

    let server = TestServer::start(config).await;
    let mut statuses = Vec::new();

    for _ in 1..=3 {
        let response = server.client.admission("createDebate", "1.1.1.1", None).await;
        assert!(response.headers().get("x-ratelimit-limit").is_none());
        statuses.push(response.status().as_u16());
    }

    assert_eq!(statuses, [204, 204, 204]);
}
