//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use tokio::net::TcpListener;

use service_bootstrap::config::{AuthConfig, CorsConfig, ServiceConfig, TokenConfig};
use service_bootstrap::lifecycle::{self, Application};
use service_bootstrap::observability::{LatencySample, MetricSink};
use service_bootstrap::AppState;

pub const AUDIENCE: &str = "example.org";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const READER_TOKEN: &str = "reader-token";
pub const ALLOWED_ORIGIN: &str = "https://app.example.org";

/// Sink that keeps every observation in memory.
#[derive(Default)]
pub struct CaptureSink {
    samples: Mutex<Vec<LatencySample>>,
    failures: Mutex<Vec<Vec<(&'static str, String)>>>,
}

impl CaptureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn samples(&self) -> Vec<LatencySample> {
        self.samples.lock().unwrap().clone()
    }

    pub fn failures(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl MetricSink for CaptureSink {
    fn record(&self, labels: &[(&'static str, String)], seconds: f64) {
        self.samples.lock().unwrap().push(LatencySample {
            labels: labels.to_vec(),
            seconds,
        });
    }

    fn record_failure(&self, labels: &[(&'static str, String)]) {
        self.failures.lock().unwrap().push(labels.to_vec());
    }
}

/// Config with two tokens for [`AUDIENCE`]: an admin and a read-only user.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.database.max_idle_conns = 0;
    config.cors = CorsConfig {
        allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
        max_age_secs: 600,
    };
    config.auth = AuthConfig {
        tokens: vec![
            TokenConfig {
                audience: AUDIENCE.to_string(),
                token: ADMIN_TOKEN.to_string(),
                subject: "admin".to_string(),
                actions: vec!["*".to_string()],
            },
            TokenConfig {
                audience: AUDIENCE.to_string(),
                token: READER_TOKEN.to_string(),
                subject: "reader".to_string(),
                actions: vec!["read".to_string()],
            },
        ],
    };
    config
}

/// Wire the whole application around `api`. Storage connects lazily, so no
/// database is needed unless a handler touches it.
pub fn test_app(api: Router<AppState>) -> Application {
    lifecycle::build(test_config(), api).expect("application should build")
}

/// Bind an ephemeral loopback port.
pub async fn ephemeral_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Serve `router` on an ephemeral port in the background.
pub async fn start_backend(router: Router) -> SocketAddr {
    let (listener, addr) = ephemeral_listener().await;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let (listener, addr) = ephemeral_listener().await;
    drop(listener);
    addr
}
