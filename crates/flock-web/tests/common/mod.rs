#![allow(dead_code)]

use std::time::Duration;

use flock_web::{Opts, Server};
use futures::StreamExt as _;
use futures::stream::BoxStream;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A test server running on a random port with ephemeral storage.
pub struct TestServer {
    _temp_dir: TempDir,
    base_url: String,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), String>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut opts = Opts::new("127.0.0.1:0".into(), temp_dir.path().to_path_buf());
        opts.keep_alive = Duration::from_secs(1);

        let server = Server::init(opts)
            .await
            .expect("Failed to start test server");
        let base_url = format!("http://{}", server.addr().expect("Has an address"));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        // `WebServerError` is not `Send`, so carry the error out as its message
        let handle = tokio::spawn(async move {
            server
                .run_until(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|e| e.to_string())
        });

        Self {
            _temp_dir: temp_dir,
            base_url,
            shutdown_tx,
            handle,
        }
    }

    pub fn driver(&self) -> ApiDriver {
        ApiDriver::new(self.base_url.clone())
    }

    /// Shut down the server cleanly.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("Server shutdown timed out")
            .expect("Server task panicked")
            .expect("Server shutdown failed");
    }
}

/// HTTP client for the JSON API.
pub struct ApiDriver {
    client: reqwest::Client,
    base_url: String,
}

impl ApiDriver {
    fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn patch_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PATCH request failed")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("DELETE request failed")
    }

    /// Create a user and return their id.
    pub async fn create_user(&self, username: &str) -> String {
        let resp = self
            .post_json("/api/users", &json!({ "username": username }))
            .await;
        assert_eq!(resp.status(), 201, "Creating {username} should succeed");
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().unwrap().to_owned()
    }

    /// Create a post and return its JSON.
    pub async fn create_post(&self, user_id: &str, text: &str) -> Value {
        let resp = self
            .post_json("/api/posts", &json!({ "user_id": user_id, "text": text }))
            .await;
        assert_eq!(resp.status(), 201, "Posting should succeed");
        resp.json().await.unwrap()
    }

    pub async fn follow(&self, follower: &str, followee: &str) {
        let resp = self
            .post_json(
                &format!("/api/users/{follower}/following"),
                &json!({ "target_user_id": followee }),
            )
            .await;
        assert_eq!(resp.status(), 201, "Following should succeed");
    }

    pub async fn fanout_debug(&self) -> Value {
        self.get("/api/debug/fanout").await.json().await.unwrap()
    }

    /// Open a timeline stream, asserting it was accepted.
    pub async fn stream(&self, user_id: &str) -> EventStream {
        let resp = self.get(&format!("/api/users/{user_id}/timeline/stream")).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        EventStream::new(resp)
    }
}

/// Reads server-sent events off a streaming response.
pub struct EventStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buf: String,
}

/// One received event: its name and its JSON data
#[derive(Debug)]
pub struct SseEvent {
    pub event: String,
    pub data: Value,
}

impl EventStream {
    fn new(resp: reqwest::Response) -> Self {
        Self {
            body: resp
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            buf: String::new(),
        }
    }

    /// Next event, skipping keep-alives. `None` once the server ended the stream.
    pub async fn next(&mut self) -> Option<SseEvent> {
        tokio::time::timeout(Duration::from_secs(5), self.next_inner())
            .await
            .expect("Timed out waiting for a server-sent event")
    }

    /// Asserts no event arrives for a while.
    pub async fn assert_quiet(&mut self) {
        if let Ok(event) =
            tokio::time::timeout(Duration::from_millis(200), self.next_inner()).await
        {
            panic!("Unexpected server-sent event: {event:?}");
        }
    }

    async fn next_inner(&mut self) -> Option<SseEvent> {
        loop {
            while let Some(end) = self.buf.find("\n\n") {
                let frame: String = self.buf.drain(..end + 2).collect();
                if let Some(event) = parse_frame(&frame) {
                    return Some(event);
                }
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.buf.push_str(&String::from_utf8_lossy(&chunk)),
                Some(Err(_)) | None => return None,
            }
        }
    }
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data = String::new();

    for line in frame.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim().to_owned());
        } else if let Some(chunk) = line.strip_prefix("data:") {
            data.push_str(chunk.trim_start());
        }
    }

    Some(SseEvent {
        event: event?,
        data: serde_json::from_str(&data).expect("Event data is JSON"),
    })
}
