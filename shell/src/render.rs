//! Presents view models produced by the core.

use shared::reconcile::{BestTaxiBadge, MapView};
use shared::{ViewModel, ViewState};

pub trait Renderer: Send + 'static {
    fn render(&mut self, view: &ViewModel);
}

/// Logs a one-line summary per render, skipping renders that change nothing.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Option<String>,
}

impl Renderer for LogRenderer {
    fn render(&mut self, view: &ViewModel) {
        let line = summarize(view);
        if self.last.as_deref() == Some(line.as_str()) {
            return;
        }
        tracing::info!(target: "taxi_dash::view", "{line}");
        self.last = Some(line);
    }
}

#[must_use]
pub fn summarize(view: &ViewModel) -> String {
    let mut parts = vec![format!("[{}]", view.role)];

    match &view.state {
        ViewState::NoData { message } => parts.push(message.clone()),
        ViewState::Ready { best_taxi, map, .. } => {
            parts.push(taxi_counts(map));
            if let BestTaxiBadge::Taxi {
                taxi_id,
                earnings_text,
                ..
            } = best_taxi
            {
                parts.push(format!("best #{taxi_id} {earnings_text}"));
            }
        }
    }

    let sim = &view.simulation;
    let mut sim_text = format!(
        "sim {} {}",
        if sim.active { "on" } else { "off" },
        sim.clock
    );
    if let Some(secs) = sim.interval_secs {
        sim_text.push_str(&format!(" every {secs}s"));
    }
    if sim.is_pending {
        sim_text.push('*');
    }
    parts.push(sim_text);

    if view.connection.is_stale {
        parts.push(format!(
            "STALE ({} failed)",
            view.connection.consecutive_failures
        ));
    }
    if let Some(status) = &view.status {
        parts.push(format!("{:?}: {}", status.kind, status.text));
    }

    parts.join(" | ")
}

fn taxi_counts(map: &MapView) -> String {
    format!("{} taxis", map.markers.len())
}
