//! Requires a Redis server on localhost:6379.

use std::time::{SystemTime, UNIX_EPOCH};

use indoc::formatdoc;
use integration_tests::{TestServer, quota_headers};

fn config(prefix: &str) -> String {
    formatdoc! {r#"
        [guard]
        principal_header = "x-user-id"

        [guard.storage]
        type = "redis"
        url = "redis://localhost:6379/0"
        key_prefix = "{prefix}:"

        [guard.operations.createDebate]
        limit = 2
        window = "60s"
    "#}
}

fn unique_prefix(name: &str) -> String {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
    format!("test_{name}_{timestamp}")
}

#[tokio::test]
#[ignore = "requires a Redis server on localhost:6379"]
async fn counters_are_shared_between_instances() {
    let config = config(&unique_prefix("shared"));

    let first = TestServer::start(&config).await;
    let second = TestServer::start(&config).await;

    let a = first.client.admission("createDebate", "1.1.1.1", Some("userA")).await;
    let b = second.client.admission("createDebate", "1.1.1.1", Some("userA")).await;
    let c = first.client.admission("createDebate", "1.1.1.1", Some("userA")).await;

    insta::assert_json_snapshot!([quota_headers(&a), quota_headers(&b), quota_headers(&c)], @r#"
    [
      {
        "limit": "2",
        "remaining": "1",
        "reset": true,
        "retry_after": null,
        "status": 204
      },
      {
        "limit": "2",
        "remaining": "0",
        "reset": true,
        "retry_after": null,
        "status": 204
      },
      {
        "limit": "2",
        "remaining": "0",
        "reset": true,
        "retry_after": "60",
        "status": 429
      }
    ]
    "#);
}

#[tokio::test]
#[ignore = "requires a Redis server on localhost:6379"]
async fn blacklist_is_shared_between_instances() {
    let config = config(&unique_prefix("blacklist"));

    let first = TestServer::start(&config).await;
    let second = TestServer::start(&config).await;

    for _ in 1..=5 {
        first.client.admission("createDebate", "2.2.2.2", Some("userA")).await;
    }

    let response = second.client.admission("createDebate", "2.2.2.2", Some("userB")).await;

    assert_eq!(response.status().as_u16(), 403);
}
