use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crux_http::protocol::{HttpRequest, HttpResponse};
use serde_json::{json, Value};
use shared::reconcile::RolePanel;
use shared::{Event, Settings, TaxiId, ViewModel, ViewState};
use taxi_dash_shell::{Renderer, Shell, ShellError, Transport};

const BASE: &str = "http://127.0.0.1:8000";

#[derive(Clone)]
struct FakeTransport {
    log: Arc<Mutex<Vec<HttpRequest>>>,
    snapshot: Value,
    poll_delay: Duration,
}

impl FakeTransport {
    fn new(snapshot: Value) -> Self {
        Self {
            log: Arc::default(),
            snapshot,
            poll_delay: Duration::ZERO,
        }
    }

    fn polls(&self) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| path(r) == "/estado")
            .count()
    }

    fn sent(&self, method: &str, target: &str) -> bool {
        self.log
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.method == method && path(r) == target)
    }
}

fn path(request: &HttpRequest) -> &str {
    request.url.strip_prefix(BASE).unwrap_or(&request.url)
}

fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: serde_json::to_vec(body).unwrap(),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: &HttpRequest) -> HttpResponse {
        self.log.lock().unwrap().push(request.clone());
        match (request.method.as_str(), path(request)) {
            ("GET", "/estado") => {
                tokio::time::sleep(self.poll_delay).await;
                json_response(200, &self.snapshot)
            }
            ("DELETE", _) => HttpResponse {
                status: 204,
                headers: Vec::new(),
                body: Vec::new(),
            },
            _ => json_response(200, &json!({"id": 99})),
        }
    }
}

#[derive(Clone, Default)]
struct RecordingRenderer {
    views: Arc<Mutex<Vec<ViewModel>>>,
}

impl RecordingRenderer {
    fn last(&self) -> Option<ViewModel> {
        self.views.lock().unwrap().last().cloned()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, view: &ViewModel) {
        self.views.lock().unwrap().push(view.clone());
    }
}

fn snapshot() -> Value {
    json!({
        "taxis": [{
            "id": 5, "model": "Kia Niro", "plate": "ABC-123", "status": "FREE",
            "x": 10.0, "y": 20.0, "earnings": 0.0, "trips": 0, "rating": 5.0
        }],
        "clients": [],
        "company": {"revenue": 0.0, "trips": 0},
        "simulationActive": false,
        "simulationClock": "00:00"
    })
}

fn mounted(interval_ms: u64) -> Event {
    Event::Mounted {
        settings: Settings {
            poll_interval_ms: interval_ms,
            rng_seed: Some(1),
            ..Settings::default()
        },
    }
}

#[tokio::test(start_paused = true)]
async fn polls_on_the_configured_interval() {
    let transport = FakeTransport::new(snapshot());
    let renderer = RecordingRenderer::default();
    let shell = Shell::new(transport.clone(), renderer.clone());
    let handle = shell.handle();
    let task = tokio::spawn(shell.run());

    handle.send(mounted(100)).unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    let polls = transport.polls();
    assert!((3..=5).contains(&polls), "unexpected poll count {polls}");
    assert!(matches!(
        renderer.last().unwrap().state,
        ViewState::Ready { .. }
    ));

    handle.send(Event::Unmounted).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_poll_is_never_overlapped() {
    let mut transport = FakeTransport::new(snapshot());
    transport.poll_delay = Duration::from_secs(1);
    let shell = Shell::new(transport.clone(), RecordingRenderer::default());
    let handle = shell.handle();
    let task = tokio::spawn(shell.run());

    handle.send(mounted(100)).unwrap();
    tokio::time::sleep(Duration::from_millis(550)).await;
    assert_eq!(transport.polls(), 1);

    handle.send(Event::Unmounted).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn delete_command_round_trip() {
    let transport = FakeTransport::new(snapshot());
    let renderer = RecordingRenderer::default();
    let shell = Shell::new(transport.clone(), renderer.clone());
    let handle = shell.handle();
    let task = tokio::spawn(shell.run());

    handle.send(mounted(1_000)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle
        .send(Event::DeleteTaxiRequested { taxi_id: TaxiId(5) })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(transport.sent("DELETE", "/taxis/5"));
    let view = renderer.last().unwrap();
    assert_eq!(view.status.unwrap().text, "Taxi 5 deleted");
    let ViewState::Ready {
        panel: RolePanel::Admin { roster, .. },
        ..
    } = view.state
    else {
        panic!("expected the admin roster");
    };
    assert!(roster.iter().all(|row| !row.delete_pending));

    handle.send(Event::Unmounted).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unmount_stops_polling() {
    let transport = FakeTransport::new(snapshot());
    let shell = Shell::new(transport.clone(), RecordingRenderer::default());
    let handle = shell.handle();
    let task = tokio::spawn(shell.run());

    handle.send(mounted(100)).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.send(Event::Unmounted).unwrap();
    let last = task.await.unwrap();
    assert!(matches!(last.state, ViewState::NoData { .. }));

    let before = transport.polls();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.polls(), before);
}

#[tokio::test(start_paused = true)]
async fn shutdown_after_stop_is_quiet() {
    let transport = FakeTransport::new(snapshot());
    let shell = Shell::new(transport, RecordingRenderer::default());
    let handle = shell.handle();
    let task = tokio::spawn(shell.run());

    handle.send(mounted(100)).unwrap();
    handle.shutdown();
    task.await.unwrap();

    handle.shutdown();
    assert!(matches!(handle.send(Event::Tick), Err(ShellError::Closed)));
}
