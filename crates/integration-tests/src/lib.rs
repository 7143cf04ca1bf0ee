use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use config::Config;
use server::ServeConfig;
use tokio::net::TcpListener;
use tokio::time::timeout;

static INIT: Once = Once::new();

fn init_crypto_provider() {
    INIT.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("Failed to install default crypto provider");
    });
}

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        init_crypto_provider();

        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    /// Start building a request to the given path
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Ask for admission to `operation` as `user` calling from `forwarded_for`.
    ///
    /// The principal travels in the `x-user-id` header, which the test
    /// configurations mark as trusted.
    pub async fn admission(&self, operation: &str, forwarded_for: &str, user: Option<&str>) -> reqwest::Response {
        let mut request = self
            .request(reqwest::Method::POST, &format!("/admission/{operation}"))
            .header("x-forwarded-for", forwarded_for);

        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }

        request.send().await.unwrap()
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with the given TOML configuration
    pub async fn start(config_toml: &str) -> Self {
        let config: Config = toml::from_str(config_toml).unwrap();
        config.validate().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            // Free the port for the server to bind
            drop(listener);

            let _ = tx.send(server::serve(serve_config).await);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        if let Ok(Err(e)) = rx.try_recv() {
            eprintln!("Server failed to start: {e}");
            std::process::exit(1);
        }

        let client = TestClient::new(format!("http://{address}"));

        let mut retries = 10;
        while retries > 0 {
            let probe = client.request(reqwest::Method::GET, "/health").send();

            if matches!(timeout(Duration::from_millis(100), probe).await, Ok(Ok(_))) {
                break;
            }
            retries -= 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestServer {
            client,
            address,
            _handle: handle,
        }
    }
}

/// Collect the rate-limit headers of a response, with the reset timestamp reduced to its presence.
pub fn quota_headers(response: &reqwest::Response) -> serde_json::Value {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .map(|value| value.to_str().unwrap_or("invalid").to_string())
    };

    serde_json::json!({
        "status": response.status().as_u16(),
        "limit": header("x-ratelimit-limit"),
        "remaining": header("x-ratelimit-remaining"),
        "reset": header("x-ratelimit-reset").is_some(),
        "retry_after": header("retry-after"),
    })
}
