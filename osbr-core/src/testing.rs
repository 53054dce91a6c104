//! In-process stand-in for the sidecar's send endpoint.

use crate::broker::ConnectionManager;
use crate::config::SidecarConfig;
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use osbr_sdk::objects::SendRequest;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

#[derive(Default)]
struct Recorded {
    requests: Mutex<Vec<SendRequest>>,
    status: AtomicU16,
    delay_ms: AtomicU64,
}

/// Records every delivery and answers with a scripted status.
pub struct StubSidecar {
    pub send_url: Url,
    recorded: Arc<Recorded>,
}

impl StubSidecar {
    pub async fn spawn() -> Self {
        let recorded = Arc::new(Recorded::default());
        recorded.status.store(200, Ordering::SeqCst);

        let app = Router::new()
            .route("/send", post(receive))
            .with_state(recorded.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            send_url: Url::parse(&format!("http://{addr}/send")).unwrap(),
            recorded,
        }
    }

    pub fn manager(&self, send_timeout: Duration) -> ConnectionManager {
        ConnectionManager::new(&SidecarConfig {
            send_url: self.send_url.clone(),
            send_timeout,
        })
        .unwrap()
    }

    pub fn respond_with(&self, status: u16) {
        self.recorded.status.store(status, Ordering::SeqCst);
    }

    pub fn delay_by(&self, delay: Duration) {
        self.recorded
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<SendRequest> {
        self.recorded.requests.lock().unwrap().clone()
    }

    /// Wait up to two seconds for at least `count` requests.
    pub async fn wait_for(&self, count: usize) -> Vec<SendRequest> {
        for _ in 0..200 {
            let requests = self.requests();
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.requests()
    }
}

async fn receive(
    State(recorded): State<Arc<Recorded>>,
    Json(request): Json<SendRequest>,
) -> StatusCode {
    recorded.requests.lock().unwrap().push(request);
    let delay = recorded.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    StatusCode::from_u16(recorded.status.load(Ordering::SeqCst)).unwrap()
}
