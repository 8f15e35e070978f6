//! Credentials never reach log output.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use catalogue_sync_core::{Credentials, SyncConfig, sync_once};
mod support;
use support::socket_guard::start_mock_server_or_skip;

const PASSWORD: &str = "hunter2-very-secret";

#[derive(Default)]
struct FieldVisitor {
    values: Vec<String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.values.push(format!("{}={value}", field.name()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.values.push(format!("{}={value:?}", field.name()));
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureLayer {
    fn push(&self, visitor: FieldVisitor) {
        self.lines.lock().unwrap().extend(visitor.values);
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        self.push(visitor);
    }

    fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        self.push(visitor);
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.push(visitor);
    }
}

#[test]
fn test_credentials_debug_is_redacted() {
    let credentials = Credentials::new("reader@example.com", PASSWORD);
    let rendered = format!("{credentials:?}");
    assert!(!rendered.contains(PASSWORD), "{rendered}");
    assert!(rendered.contains("reader@example.com"));
}

#[tokio::test]
async fn test_password_never_appears_in_trace_output() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ajax/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"success": false, "alert": "Credenciales incorrectas"}"#),
        )
        .mount(&server)
        .await;

    let layer = CaptureLayer::default();
    let lines = Arc::clone(&layer.lines);
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(layer);
    let _guard = tracing::subscriber::set_default(subscriber);
    tracing::callsite::rebuild_interest_cache();

    let dir = tempfile::TempDir::new().unwrap();
    let mut config = SyncConfig::new(server.uri(), dir.path());
    config.session.login_delay = Duration::ZERO;
    let err = sync_once(
        config,
        Credentials::new("reader@example.com", PASSWORD),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(!err.to_string().contains(PASSWORD));

    let lines = lines.lock().unwrap();
    assert!(!lines.is_empty(), "no trace output captured");
    let leaked: Vec<&String> = lines.iter().filter(|line| line.contains(PASSWORD)).collect();
    assert!(leaked.is_empty(), "password leaked into: {leaked:?}");
}
