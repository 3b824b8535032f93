//! The shell event loop: feeds events to the core and executes the effects
//! it returns.

use std::sync::Arc;
use std::time::Duration;

use crux_core::{Core, Request};
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use shared::capabilities::{Capabilities, TimerOperation};
use shared::{App, Effect, Event, ViewModel};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::ShellError;
use crate::render::Renderer;
use crate::transport::Transport;

enum Message {
    Event(Event),
    HttpDone {
        request: Request<HttpRequest>,
        response: HttpResponse,
    },
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Self::HttpDone { response, .. } => f
                .debug_struct("HttpDone")
                .field("status", &response.status)
                .finish_non_exhaustive(),
        }
    }
}

/// Cloneable sender for feeding events into a running [`Shell`].
#[derive(Debug, Clone)]
pub struct ShellHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl ShellHandle {
    pub fn send(&self, event: Event) -> Result<(), ShellError> {
        self.tx
            .send(Message::Event(event))
            .map_err(|_| ShellError::Closed)
    }

    /// Asks the shell to unmount the core. A shell that has already
    /// stopped is left alone.
    pub fn shutdown(&self) {
        if let Err(err) = self.send(Event::Unmounted) {
            tracing::debug!(error = %err, "shell already stopped");
        }
    }
}

pub struct Shell<T, R> {
    core: Core<Effect, App>,
    transport: Arc<T>,
    renderer: R,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    ticker: Option<JoinHandle<()>>,
}

impl<T: Transport, R: Renderer> Shell<T, R> {
    pub fn new(transport: T, renderer: R) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            core: Core::new::<Capabilities>(),
            transport: Arc::new(transport),
            renderer,
            tx,
            rx,
            ticker: None,
        }
    }

    #[must_use]
    pub fn handle(&self) -> ShellHandle {
        ShellHandle {
            tx: self.tx.clone(),
        }
    }

    /// Runs until an [`Event::Unmounted`] has been processed and returns the
    /// final view.
    pub async fn run(mut self) -> ViewModel {
        while let Some(message) = self.rx.recv().await {
            match message {
                Message::Event(event) => {
                    let unmounting = matches!(event, Event::Unmounted);
                    let effects = self.core.process_event(event);
                    self.execute(effects);
                    if unmounting {
                        break;
                    }
                }
                Message::HttpDone {
                    mut request,
                    response,
                } => {
                    let effects = self.core.resolve(&mut request, HttpResult::Ok(response));
                    self.execute(effects);
                }
            }
        }
        self.stop_ticker();
        tracing::debug!("shell loop finished");
        self.core.view()
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Render(_) => self.renderer.render(&self.core.view()),
                Effect::Http(request) => {
                    let transport = Arc::clone(&self.transport);
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let response = transport.execute(&request.operation).await;
                        if tx.send(Message::HttpDone { request, response }).is_err() {
                            tracing::debug!("response arrived after shell stopped");
                        }
                    });
                }
                Effect::Timer(request) => match request.operation {
                    TimerOperation::Start { interval_ms } => {
                        self.start_ticker(Duration::from_millis(interval_ms));
                    }
                    TimerOperation::Stop => self.stop_ticker(),
                },
            }
        }
    }

    fn start_ticker(&mut self, period: Duration) {
        self.stop_ticker();
        let tx = self.tx.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the core polls on mount, so skip the immediate first tick
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(Message::Event(Event::Tick)).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}
