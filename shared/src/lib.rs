// lib.rs - Taxi dispatch dashboard core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod actions;
pub mod app;
pub mod capabilities;
pub mod error;
pub mod event;
pub mod model;
pub mod reconcile;
pub mod snapshot;
pub mod snapshot_client;
pub mod snapshot_store;
pub mod ui_state;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use error::{ActionError, ActionKind, LocalInvariantRepair, RejectedAction, TransportError};
pub use event::{CardNumber, Event};
pub use model::{Lifecycle, Model, SessionEpoch, Settings};
pub use reconcile::{compute_view_model, ViewModel, ViewState};
pub use snapshot::{Client, ClientId, CompanyTotals, Snapshot, Taxi, TaxiId, TaxiStatus};
pub use snapshot_client::{PollSeq, SnapshotClient};
pub use snapshot_store::SnapshotStore;
pub use ui_state::{Role, StatusKind, StatusMessage, UiState};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const MIN_POLL_INTERVAL_MS: u64 = 50;
pub const MAP_LOGICAL_EXTENT: f64 = 100.0;
pub const DEFAULT_MAP_SCALE_PX: f64 = 5.0;
pub const MIN_MAP_SCALE_PX: f64 = 0.5;
pub const MAX_MAP_SCALE_PX: f64 = 50.0;
pub const MAX_SIMULATION_INTERVAL_SECS: f64 = 60.0;
pub const MAX_REASON_LENGTH: usize = 512;
pub const MIN_CARD_DIGITS: usize = 12;
pub const MAX_CARD_DIGITS: usize = 19;

pub const TAXI_MODELS: &[&str] = &[
    "Toyota Prius",
    "Nissan Versa",
    "Hyundai Ioniq",
    "Kia Niro",
    "Chevrolet Aveo",
    "Renault Logan",
];

#[must_use]
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return "n/a".to_string();
    }
    format!("${amount:.2}")
}

#[must_use]
pub fn format_rating(rating: f64) -> String {
    if !rating.is_finite() {
        return "n/a".to_string();
    }
    format!("{rating:.2}")
}

/// Bounds a server-provided reason so a misbehaving service cannot flood the
/// status line.
#[must_use]
pub fn truncate_reason(reason: &str) -> String {
    let trimmed = reason.trim();
    if trimmed.chars().count() <= MAX_REASON_LENGTH {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_REASON_LENGTH).collect();
    out.push_str("...");
    out
}
