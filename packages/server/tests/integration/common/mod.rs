use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filehub_common::StorageConfig;
use filehub_common::storage::filesystem::FilesystemBlobStore;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tempfile::TempDir;

use filehub_server::config::{AppConfig, CorsConfig, DatabaseConfig, ServerConfig};
use filehub_server::state::AppState;

pub mod routes {
    pub const FILES: &str = "/api/v1/files";
    pub const STATS: &str = "/api/v1/files/stats";
    pub const DEDUP_CHECK: &str = "/api/v1/files/dedup-check";

    pub fn file(id: &str) -> String {
        format!("/api/v1/files/{id}")
    }

    pub fn download(id: &str) -> String {
        format!("/api/v1/files/{id}/download")
    }
}

/// A running test server backed by an in-memory SQLite database and a
/// temp-dir blob store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub blob_dir: PathBuf,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let blob_dir = dir.path().join("blobs");

        let mut config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            storage: StorageConfig {
                blob_dir: blob_dir.clone(),
                ..Default::default()
            },
        };
        configure(&mut config);

        let db = filehub_server::database::init_db(&config.database)
            .await
            .expect("Failed to initialize test database");
        let blobs = FilesystemBlobStore::new(blob_dir.clone(), config.storage.max_blob_size)
            .await
            .expect("Failed to create blob store");

        let app = filehub_server::build_router(AppState::new(config, db, Arc::new(blobs)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            blob_dir,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut req = self.client.get(self.url(path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let res = req.send().await.expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_raw(&self, path: &str, content_type: &str, body: Vec<u8>) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_form(&self, path: &str, form: reqwest::multipart::Form) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Upload `bytes` as a `text/plain` file named `file_name`.
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("text/plain")
            .expect("Failed to set MIME type");
        let form = reqwest::multipart::Form::new().part("file", part);

        self.post_form(routes::FILES, form).await
    }

    /// Upload and assert success, returning the record body.
    pub async fn upload_ok(&self, file_name: &str, bytes: &[u8]) -> Value {
        let res = self.upload(file_name, bytes).await;
        assert_eq!(res.status, 201, "upload failed: {}", res.text);
        res.body
    }

    /// Number of blobs on disk, ignoring in-flight scratch and temp files.
    pub fn blob_files(&self) -> usize {
        count_files(&self.blob_dir)
    }
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let path = entry.path();
            let name = entry.file_name();
            if name == ".tmp" || name == ".incoming" {
                0
            } else if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            headers,
            text,
            body,
        }
    }

    pub fn id(&self) -> String {
        self.body["id"]
            .as_str()
            .expect("response body should contain 'id'")
            .to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
