use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Routes served by the stub catalog. Anything not configured answers 404,
/// which is how the real catalog reports unknown ids.
#[derive(Debug, Default, Clone)]
pub struct CatalogStubConfig {
    /// external work id -> JSON body
    pub works: HashMap<String, String>,
    /// author id -> JSON body
    pub authors: HashMap<String, String>,
    /// cover id -> image bytes
    pub covers: HashMap<i64, Vec<u8>>,
    /// body for /search.json
    pub search_body: Option<String>,
    /// answer every /works/ request with a 500
    pub fail_works: bool,
}

/// A local Open Library lookalike for integration tests. Counts every
/// request so tests can assert that cache hits skip the network.
pub struct CatalogStub {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CatalogStub {
    pub fn spawn(config: CatalogStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start catalog stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            counter.fetch_add(1, Ordering::SeqCst);
            respond(request, &config);
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for CatalogStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn respond(request: tiny_http::Request, config: &CatalogStubConfig) {
    let path = request.url().to_string();

    if let Some(id) = path
        .strip_prefix("/works/")
        .and_then(|rest| rest.strip_suffix(".json"))
    {
        if config.fail_works {
            let _ = request.respond(
                tiny_http::Response::from_string("catalog exploded").with_status_code(500),
            );
            return;
        }
        match config.works.get(id) {
            Some(body) => respond_json(request, body),
            None => respond_not_found(request),
        }
        return;
    }

    if let Some(id) = path
        .strip_prefix("/authors/")
        .and_then(|rest| rest.strip_suffix(".json"))
    {
        match config.authors.get(id) {
            Some(body) => respond_json(request, body),
            None => respond_not_found(request),
        }
        return;
    }

    if let Some(id) = path
        .strip_prefix("/b/id/")
        .and_then(|rest| rest.strip_suffix("-L.jpg"))
        .and_then(|rest| rest.parse::<i64>().ok())
    {
        match config.covers.get(&id) {
            Some(bytes) => {
                let response = tiny_http::Response::from_data(bytes.clone()).with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"image/jpeg"[..])
                        .expect("build header"),
                );
                let _ = request.respond(response);
            }
            None => respond_not_found(request),
        }
        return;
    }

    if path.starts_with("/search.json") {
        match config.search_body.as_deref() {
            Some(body) => respond_json(request, body),
            None => respond_not_found(request),
        }
        return;
    }

    respond_not_found(request);
}

fn respond_json(request: tiny_http::Request, body: &str) {
    let response = tiny_http::Response::from_string(body).with_header(
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            .expect("build header"),
    );
    let _ = request.respond(response);
}

fn respond_not_found(request: tiny_http::Request) {
    let _ = request.respond(tiny_http::Response::from_string("not found").with_status_code(404));
}

pub fn work_json(title: Option<&str>, author_ids: &[&str], cover_id: Option<i64>) -> String {
    let authors: Vec<serde_json::Value> = author_ids
        .iter()
        .map(|id| serde_json::json!({"author": {"key": format!("/authors/{id}")}}))
        .collect();
    let mut body = serde_json::json!({ "authors": authors });
    if let Some(title) = title {
        body["title"] = serde_json::Value::String(title.to_string());
    }
    if let Some(cover_id) = cover_id {
        body["covers"] = serde_json::json!([cover_id]);
    }
    body.to_string()
}

pub fn author_json(name: &str) -> String {
    serde_json::json!({ "name": name }).to_string()
}
