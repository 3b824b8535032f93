//! Client-only state that never comes from the server.
//!
//! Everything here is mutated only through the setters below. Snapshot
//! replacement goes through [`UiState::on_snapshot_replaced`], which repairs
//! any field that now points at data the snapshot no longer has.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ActionError, LocalInvariantRepair};
use crate::event::CardNumber;
use crate::snapshot::{ClientId, Snapshot, TaxiId, TaxiStatus};
use crate::snapshot_client::PollSeq;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Admin,
    Client,
    Driver,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::Admin, Self::Client, Self::Driver];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Client => "CLIENT",
            Self::Driver => "DRIVER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
}

/// Identifies one simulation config request so a late response cannot
/// settle a value set by a newer request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Settle {
    InFlight,
    After(PollSeq),
}

/// A control value shown ahead of server confirmation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Optimistic<T> {
    value: T,
    token: ConfigToken,
    settle: Settle,
}

impl<T: Copy> Optimistic<T> {
    const fn in_flight(value: T, token: ConfigToken) -> Self {
        Self {
            value,
            token,
            settle: Settle::InFlight,
        }
    }

    #[must_use]
    pub const fn value(&self) -> T {
        self.value
    }

    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self.settle, Settle::InFlight)
    }

    /// True once a poll issued after the config response has come back.
    fn superseded_by(&self, poll: PollSeq) -> bool {
        matches!(self.settle, Settle::After(first) if poll >= first)
    }

    fn respond(&mut self, token: ConfigToken, next_poll: PollSeq) -> bool {
        if self.token != token || !self.is_in_flight() {
            return false;
        }
        self.settle = Settle::After(next_poll);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationControls {
    active: Option<Optimistic<bool>>,
    interval_secs: Option<Optimistic<f64>>,
}

impl SimulationControls {
    #[must_use]
    pub const fn active(&self) -> Option<&Optimistic<bool>> {
        self.active.as_ref()
    }

    #[must_use]
    pub const fn interval_secs(&self) -> Option<&Optimistic<f64>> {
        self.interval_secs.as_ref()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.active.is_some_and(|o| o.is_in_flight())
            || self.interval_secs.is_some_and(|o| o.is_in_flight())
    }
}

#[derive(Debug, Default)]
pub struct Drafts {
    pub client_id: String,
    pub taxi_id: String,
    pub client_name: String,
    pub card_number: Option<CardNumber>,
}

#[derive(Debug, Default)]
pub struct UiState {
    role: Role,
    selected_taxi: Option<TaxiId>,
    drafts: Drafts,
    status: Option<StatusMessage>,
    pending_deletion: BTreeSet<TaxiId>,
    simulation: SimulationControls,
    next_config_token: ConfigToken,
}

/// Parses a free-text id field. Surrounding whitespace is ignored and a
/// whole-number decimal such as `7.0` is accepted. Anything else is `None`.
#[must_use]
pub fn parse_entity_id(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(id) = text.parse::<u64>() {
        return Some(id);
    }
    let (whole, fraction) = text.split_once('.')?;
    if whole.is_empty() || !fraction.chars().all(|c| c == '0') {
        return None;
    }
    whole.parse::<u64>().ok()
}

impl UiState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to defaults. Config tokens keep counting so a response from
    /// before the reset never matches a later request.
    pub fn reset(&mut self) {
        let next = self.next_config_token;
        *self = Self::default();
        self.next_config_token = next;
    }

    // --- role ---

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    // --- selection ---

    #[must_use]
    pub const fn selected_taxi(&self) -> Option<TaxiId> {
        self.selected_taxi
    }

    /// Selects `taxi_id` if the current snapshot contains it.
    pub fn select_taxi(&mut self, taxi_id: TaxiId, snapshot: Option<&Snapshot>) -> bool {
        if snapshot.is_some_and(|s| s.contains_taxi(taxi_id)) {
            self.selected_taxi = Some(taxi_id);
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_taxi = None;
    }

    // --- drafts ---

    #[must_use]
    pub const fn drafts(&self) -> &Drafts {
        &self.drafts
    }

    pub fn set_client_id_text(&mut self, text: String) {
        self.drafts.client_id = text;
    }

    pub fn set_taxi_id_text(&mut self, text: String) {
        self.drafts.taxi_id = text;
    }

    pub fn set_client_name(&mut self, text: String) {
        self.drafts.client_name = text;
    }

    pub fn set_card_number(&mut self, card: CardNumber) {
        self.drafts.card_number = if card.is_empty() { None } else { Some(card) };
    }

    pub fn clear_registration_drafts(&mut self) {
        self.drafts.client_name.clear();
        self.drafts.card_number = None;
    }

    #[must_use]
    pub fn my_client_id(&self) -> Option<ClientId> {
        parse_entity_id(&self.drafts.client_id).map(ClientId)
    }

    #[must_use]
    pub fn my_taxi_id(&self) -> Option<TaxiId> {
        parse_entity_id(&self.drafts.taxi_id).map(TaxiId)
    }

    // --- status line ---

    #[must_use]
    pub const fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn set_status(&mut self, text: impl Into<String>, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    pub fn report(&mut self, error: &ActionError) {
        let kind = if error.is_local() {
            StatusKind::Warning
        } else {
            StatusKind::Error
        };
        self.set_status(error.user_facing_message(), kind);
    }

    // --- pending deletion ---

    #[must_use]
    pub const fn pending_deletion(&self) -> &BTreeSet<TaxiId> {
        &self.pending_deletion
    }

    #[must_use]
    pub fn is_pending_deletion(&self, taxi_id: TaxiId) -> bool {
        self.pending_deletion.contains(&taxi_id)
    }

    /// Marks `taxi_id` as being deleted. Busy taxis and taxis that already
    /// have a delete in flight are refused.
    pub fn begin_deletion(
        &mut self,
        taxi_id: TaxiId,
        status: TaxiStatus,
    ) -> Result<(), ActionError> {
        if self.pending_deletion.contains(&taxi_id) {
            return Err(ActionError::AlreadyPending(taxi_id));
        }
        if status == TaxiStatus::Busy {
            return Err(ActionError::Busy(taxi_id));
        }
        self.pending_deletion.insert(taxi_id);
        Ok(())
    }

    pub fn finish_deletion(&mut self, taxi_id: TaxiId) -> bool {
        self.pending_deletion.remove(&taxi_id)
    }

    // --- simulation controls ---

    #[must_use]
    pub const fn simulation(&self) -> &SimulationControls {
        &self.simulation
    }

    /// Shows the requested values right away and returns the token the
    /// response must echo.
    pub fn begin_simulation_config(
        &mut self,
        active: Option<bool>,
        interval_secs: Option<f64>,
    ) -> ConfigToken {
        let token = self.next_config_token;
        self.next_config_token = ConfigToken(token.0.wrapping_add(1));
        if let Some(active) = active {
            self.simulation.active = Some(Optimistic::in_flight(active, token));
        }
        if let Some(interval) = interval_secs {
            self.simulation.interval_secs = Some(Optimistic::in_flight(interval, token));
        }
        token
    }

    /// Records the response for `token`. The optimistic values stay until a
    /// poll numbered `next_poll` or later reports the server's state.
    pub fn finish_simulation_config(&mut self, token: ConfigToken, next_poll: PollSeq) -> bool {
        let mut matched = false;
        if let Some(active) = self.simulation.active.as_mut() {
            matched |= active.respond(token, next_poll);
        }
        if let Some(interval) = self.simulation.interval_secs.as_mut() {
            matched |= interval.respond(token, next_poll);
        }
        matched
    }

    /// Repairs derived fields after `snapshot` from `poll` replaced the old
    /// one. Runs before any view is computed from the new snapshot.
    pub fn on_snapshot_replaced(
        &mut self,
        snapshot: &Snapshot,
        poll: PollSeq,
    ) -> Vec<LocalInvariantRepair> {
        let mut repairs = Vec::new();

        if let Some(taxi_id) = self.selected_taxi {
            if !snapshot.contains_taxi(taxi_id) {
                self.selected_taxi = None;
                repairs.push(LocalInvariantRepair::SelectionCleared { taxi_id });
            }
        }

        if self.simulation.active.is_some_and(|o| o.superseded_by(poll)) {
            self.simulation.active = None;
            repairs.push(LocalInvariantRepair::SimulationActiveSettled);
        }
        if self
            .simulation
            .interval_secs
            .is_some_and(|o| o.superseded_by(poll))
        {
            self.simulation.interval_secs = None;
            repairs.push(LocalInvariantRepair::SimulationIntervalSettled);
        }

        repairs
    }
}
