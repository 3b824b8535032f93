//! User-initiated commands against the dispatch service.
//!
//! Each command validates locally, records one HTTP effect and reports its
//! outcome through the status line. None of them touch the snapshot: the
//! next poll is the only way server-side changes reach the view.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::{Capabilities, HttpError, HttpResponse, HttpResult, ServiceRequest};
use crate::error::{
    rejection_reason, ActionError, ActionKind, RejectedAction, TransportError, REASON_KEYS,
};
use crate::event::Event;
use crate::model::{Model, SessionEpoch};
use crate::snapshot::{ClientId, CoordinateError, LogicalPoint, TaxiId};
use crate::ui_state::{parse_entity_id, ConfigToken, StatusKind};
use crate::{
    MAP_LOGICAL_EXTENT, MAX_CARD_DIGITS, MAX_SIMULATION_INTERVAL_SECS,
    MIN_CARD_DIGITS, TAXI_MODELS,
};

pub const TAXIS_PATH: &str = "/taxis";
pub const TRIP_PATH: &str = "/solicitar_viaje";
pub const SIMULATION_CONFIG_PATH: &str = "/simulacion/config";
pub const CLIENTS_PATH: &str = "/clientes";

pub const MAX_CLIENT_NAME_LENGTH: usize = 100;

// --- request bodies ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxi {
    pub model: String,
    pub plate: String,
}

impl NewTaxi {
    /// A catalogue model and an `AAA-123` style plate.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let model = TAXI_MODELS[rng.gen_range(0..TAXI_MODELS.len())].to_string();
        let letters: String = (0..3).map(|_| char::from(rng.gen_range(b'A'..=b'Z'))).collect();
        let digits: u16 = rng.gen_range(0..1000);
        Self {
            model,
            plate: format!("{letters}-{digits:03}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub client_id: ClientId,
    pub origin_x: f64,
    pub origin_y: f64,
    pub dest_x: f64,
    pub dest_y: f64,
}

impl TripRequest {
    /// Random origin and destination on the grid, rounded to two decimals.
    pub fn generate<R: Rng + ?Sized>(
        client_id: ClientId,
        rng: &mut R,
    ) -> Result<Self, CoordinateError> {
        let mut point = || {
            let x = round2(rng.gen_range(0.0..=MAP_LOGICAL_EXTENT));
            let y = round2(rng.gen_range(0.0..=MAP_LOGICAL_EXTENT));
            LogicalPoint::new(x, y)
        };
        let origin = point()?;
        let dest = point()?;
        Ok(Self {
            client_id,
            origin_x: origin.x(),
            origin_y: origin.y(),
            dest_x: dest.x(),
            dest_y: dest.y(),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(rename = "interval", skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<f64>,
}

impl SimulationConfig {
    pub fn new(active: Option<bool>, interval_secs: Option<f64>) -> Result<Self, ActionError> {
        if active.is_none() && interval_secs.is_none() {
            return Err(ActionError::validation("Nothing to change in the simulation"));
        }
        if let Some(interval) = interval_secs {
            if !interval.is_finite() || interval <= 0.0 || interval > MAX_SIMULATION_INTERVAL_SECS
            {
                return Err(ActionError::validation(format!(
                    "Simulation interval must be between 0 and {MAX_SIMULATION_INTERVAL_SECS} seconds"
                )));
            }
        }
        Ok(Self {
            active,
            interval_secs,
        })
    }
}

#[derive(Serialize)]
struct ClientRegistration<'a> {
    name: &'a str,
    card: &'a str,
}

// --- response decoding ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripOutcome {
    Assigned { taxi_id: TaxiId },
    /// The service answered without assigning a taxi.
    Unassigned { message: String },
}

pub const NO_TAXI_MESSAGE: &str = "No taxi available right now";

/// Splits a raw result into a 2xx response or the action error. Network
/// failures and 5xx are transport errors; 4xx is a rejection carrying the
/// server's reason.
fn accepted(action: ActionKind, result: HttpResult) -> Result<HttpResponse, ActionError> {
    let response = result?;
    if response.is_success() {
        return Ok(response);
    }
    if response.is_server_error() {
        return Err(TransportError::from_response(&response).into());
    }
    let reason = rejection_reason(&response)
        .unwrap_or_else(|| format!("HTTP error {}", response.status()));
    Err(RejectedAction::new(action, reason).into())
}

fn body_value(response: &HttpResponse) -> Value {
    if response.body().is_empty() {
        return Value::Null;
    }
    response.json::<Value>().unwrap_or(Value::Null)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn id_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => parse_entity_id(s),
        Value::Object(map) => map.get("id").and_then(id_value),
        _ => None,
    }
}

fn find_id(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| value.get(key).and_then(id_value))
}

fn find_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(crate::truncate_reason)
    })
}

pub fn decode_created_taxi(result: HttpResult) -> Result<TaxiId, ActionError> {
    let response = accepted(ActionKind::CreateTaxi, result)?;
    let body = body_value(&response);
    if let Some(id) = find_id(&body, &["id", "taxiId", "taxi_id"]) {
        return Ok(TaxiId(id));
    }
    let reason = find_text(&body, REASON_KEYS)
        .unwrap_or_else(|| "the service did not return the new taxi".to_string());
    Err(RejectedAction::new(ActionKind::CreateTaxi, reason).into())
}

pub fn decode_deleted(result: HttpResult) -> Result<(), ActionError> {
    accepted(ActionKind::DeleteTaxi, result).map(|_| ())
}

pub fn decode_config_ack(result: HttpResult) -> Result<(), ActionError> {
    accepted(ActionKind::ConfigureSimulation, result).map(|_| ())
}

pub fn decode_trip(result: HttpResult) -> Result<TripOutcome, ActionError> {
    let response = accepted(ActionKind::RequestTrip, result)?;
    let body = body_value(&response);
    if let Some(id) = find_id(
        &body,
        &["taxiId", "taxi_id", "taxi", "taxiAsignado", "taxi_asignado"],
    ) {
        return Ok(TripOutcome::Assigned {
            taxi_id: TaxiId(id),
        });
    }
    let message = find_text(
        &body,
        &["message", "mensaje", "detail", "status", "estado", "resultado"],
    )
    .or_else(|| body.as_str().map(crate::truncate_reason))
    .unwrap_or_else(|| NO_TAXI_MESSAGE.to_string());
    Ok(TripOutcome::Unassigned { message })
}

pub fn decode_registered_client(result: HttpResult) -> Result<ClientId, ActionError> {
    let response = accepted(ActionKind::RegisterClient, result)?;
    let body = body_value(&response);
    find_id(&body, &["id", "clientId", "client_id", "client", "cliente"])
        .map(ClientId)
        .ok_or_else(|| {
            let reason = find_text(&body, REASON_KEYS)
                .unwrap_or_else(|| "the service did not return the new client".to_string());
            RejectedAction::new(ActionKind::RegisterClient, reason).into()
        })
}

// --- commands ---

fn fail(model: &mut Model, action: ActionKind, error: &ActionError) {
    tracing::warn!(action = %action, error = %error, "action failed");
    model.ui.report(error);
}

/// Sends `request` to the configured service. Nothing is recorded when the
/// request or the base url is invalid.
fn dispatch<F>(
    model: &Model,
    caps: &Capabilities,
    request: Result<ServiceRequest, HttpError>,
    callback: F,
) -> Result<(), HttpError>
where
    F: FnOnce(HttpResult) -> Event + Send + 'static,
{
    let base = model.service_url()?;
    request?.send(base, &caps.http, callback)
}

/// True when `session` is the one currently mounted. Responses from an
/// ended session must not touch the new one.
#[must_use]
pub fn is_current(model: &Model, session: SessionEpoch) -> bool {
    model.is_mounted() && model.session == session
}

pub fn create_taxi(model: &mut Model, caps: &Capabilities) {
    let taxi = NewTaxi::generate(&mut model.rng);
    let plate = taxi.plate.clone();
    let session = model.session;
    let request = ServiceRequest::post(TAXIS_PATH).and_then(|r| r.with_json(&taxi));
    let sent = dispatch(model, caps, request, {
        let plate = plate.clone();
        move |result| Event::TaxiCreated {
            session,
            plate,
            result: decode_created_taxi(result),
        }
    });

    match sent {
        Ok(()) => {
            tracing::info!(plate = %plate, model = %taxi.model, "registering taxi");
            model
                .ui
                .set_status(format!("Registering taxi {plate}..."), StatusKind::Info);
        }
        Err(err) => fail(model, ActionKind::CreateTaxi, &err.into()),
    }
}

pub fn on_taxi_created(model: &mut Model, plate: &str, result: Result<TaxiId, ActionError>) {
    match result {
        Ok(taxi_id) => {
            tracing::info!(taxi_id = %taxi_id, plate, "taxi registered");
            model.ui.set_status(
                format!("Taxi {taxi_id} registered ({plate})"),
                StatusKind::Success,
            );
        }
        Err(err) => fail(model, ActionKind::CreateTaxi, &err),
    }
}

pub fn delete_taxi(model: &mut Model, caps: &Capabilities, taxi_id: TaxiId) {
    let Some(status) = model
        .store
        .current()
        .and_then(|s| s.taxi(taxi_id))
        .map(|t| t.status)
    else {
        let err = ActionError::validation(format!("Taxi {taxi_id} is not in the current snapshot"));
        fail(model, ActionKind::DeleteTaxi, &err);
        return;
    };

    // guard runs before any effect is recorded
    if let Err(err) = model.ui.begin_deletion(taxi_id, status) {
        fail(model, ActionKind::DeleteTaxi, &err);
        return;
    }

    let session = model.session;
    let request = ServiceRequest::delete(format!("{TAXIS_PATH}/{taxi_id}"));
    let sent = dispatch(model, caps, request, move |result| Event::TaxiDeleted {
        session,
        taxi_id,
        result: decode_deleted(result),
    });

    match sent {
        Ok(()) => {
            tracing::info!(taxi_id = %taxi_id, "deleting taxi");
            model
                .ui
                .set_status(format!("Deleting taxi {taxi_id}..."), StatusKind::Info);
        }
        Err(err) => {
            model.ui.finish_deletion(taxi_id);
            fail(model, ActionKind::DeleteTaxi, &err.into());
        }
    }
}

pub fn on_taxi_deleted(model: &mut Model, taxi_id: TaxiId, result: Result<(), ActionError>) {
    if !model.ui.finish_deletion(taxi_id) {
        tracing::debug!(taxi_id = %taxi_id, "delete response with no pending entry");
    }
    match result {
        Ok(()) => {
            tracing::info!(taxi_id = %taxi_id, "taxi deleted");
            model
                .ui
                .set_status(format!("Taxi {taxi_id} deleted"), StatusKind::Success);
        }
        Err(err) => fail(model, ActionKind::DeleteTaxi, &err),
    }
}

pub fn configure_simulation(
    model: &mut Model,
    caps: &Capabilities,
    active: Option<bool>,
    interval_secs: Option<f64>,
) {
    let config = match SimulationConfig::new(active, interval_secs) {
        Ok(config) => config,
        Err(err) => {
            fail(model, ActionKind::ConfigureSimulation, &err);
            return;
        }
    };

    let token = model.ui.begin_simulation_config(active, interval_secs);
    let session = model.session;
    let request = ServiceRequest::post(SIMULATION_CONFIG_PATH).and_then(|r| r.with_json(&config));
    let sent = dispatch(model, caps, request, move |result| {
        Event::SimulationConfigured {
            session,
            token,
            result: decode_config_ack(result),
        }
    });

    match sent {
        Ok(()) => {
            tracing::info!(?active, ?interval_secs, "updating simulation");
        }
        Err(err) => {
            // nothing was sent; let the next poll restore server truth
            model
                .ui
                .finish_simulation_config(token, model.client.next_seq());
            fail(model, ActionKind::ConfigureSimulation, &err.into());
        }
    }
}

pub fn on_simulation_configured(
    model: &mut Model,
    token: ConfigToken,
    result: Result<(), ActionError>,
) {
    let next_poll = model.client.next_seq();
    if !model.ui.finish_simulation_config(token, next_poll) {
        tracing::debug!(?token, "config response superseded by a newer request");
    }
    match result {
        Ok(()) => {
            tracing::info!(?token, "simulation updated");
        }
        Err(err) => {
            // no status line: the next snapshot shows what actually applies
            tracing::warn!(?token, error = %err, "simulation update failed");
        }
    }
}

pub fn request_trip(model: &mut Model, caps: &Capabilities) {
    let Some(client_id) = model.ui.my_client_id() else {
        let err = ActionError::validation("Enter your client id before requesting a trip");
        fail(model, ActionKind::RequestTrip, &err);
        return;
    };

    let trip = match TripRequest::generate(client_id, &mut model.rng) {
        Ok(trip) => trip,
        Err(err) => {
            fail(
                model,
                ActionKind::RequestTrip,
                &ActionError::validation(err.to_string()),
            );
            return;
        }
    };

    let session = model.session;
    let request = ServiceRequest::post(TRIP_PATH).and_then(|r| r.with_json(&trip));
    let sent = dispatch(model, caps, request, move |result| Event::TripResolved {
        session,
        client_id,
        result: decode_trip(result),
    });

    match sent {
        Ok(()) => {
            tracing::info!(
                client_id = %client_id,
                origin_x = trip.origin_x,
                origin_y = trip.origin_y,
                dest_x = trip.dest_x,
                dest_y = trip.dest_y,
                "requesting trip"
            );
            model
                .ui
                .set_status("Looking for a taxi...", StatusKind::Info);
        }
        Err(err) => fail(model, ActionKind::RequestTrip, &err.into()),
    }
}

pub fn on_trip_resolved(
    model: &mut Model,
    client_id: ClientId,
    result: Result<TripOutcome, ActionError>,
) {
    match result {
        Ok(TripOutcome::Assigned { taxi_id }) => {
            tracing::info!(client_id = %client_id, taxi_id = %taxi_id, "trip assigned");
            model.ui.set_status(
                format!("Taxi {taxi_id} is on its way"),
                StatusKind::Success,
            );
        }
        Ok(TripOutcome::Unassigned { message }) => {
            tracing::info!(client_id = %client_id, message = %message, "trip not assigned");
            model.ui.set_status(message, StatusKind::Warning);
        }
        Err(err) => fail(model, ActionKind::RequestTrip, &err),
    }
}

fn validate_registration(model: &Model) -> Result<(String, String), ActionError> {
    let drafts = model.ui.drafts();
    let name = drafts.client_name.trim();
    if name.is_empty() {
        return Err(ActionError::validation("Enter a name to register"));
    }
    if name.chars().count() > MAX_CLIENT_NAME_LENGTH {
        return Err(ActionError::validation(format!(
            "Name must be at most {MAX_CLIENT_NAME_LENGTH} characters"
        )));
    }
    let digits = drafts
        .card_number
        .as_ref()
        .and_then(crate::event::CardNumber::digits)
        .filter(|d| (MIN_CARD_DIGITS..=MAX_CARD_DIGITS).contains(&d.len()))
        .ok_or_else(|| {
            ActionError::validation(format!(
                "Card number must have {MIN_CARD_DIGITS} to {MAX_CARD_DIGITS} digits"
            ))
        })?;
    Ok((name.to_string(), digits))
}

pub fn register_client(model: &mut Model, caps: &Capabilities) {
    let (name, card) = match validate_registration(model) {
        Ok(fields) => fields,
        Err(err) => {
            fail(model, ActionKind::RegisterClient, &err);
            return;
        }
    };

    let session = model.session;
    let request = ServiceRequest::post(CLIENTS_PATH).and_then(|r| {
        r.with_json(&ClientRegistration {
            name: &name,
            card: &card,
        })
    });
    let sent = dispatch(model, caps, request, move |result| Event::ClientRegistered {
        session,
        result: decode_registered_client(result),
    });

    match sent {
        Ok(()) => {
            tracing::info!(name = %name, "registering client");
            model
                .ui
                .set_status(format!("Registering {name}..."), StatusKind::Info);
        }
        Err(err) => fail(model, ActionKind::RegisterClient, &err.into()),
    }
}

pub fn on_client_registered(model: &mut Model, result: Result<ClientId, ActionError>) {
    match result {
        Ok(client_id) => {
            tracing::info!(client_id = %client_id, "client registered");
            model.ui.set_client_id_text(client_id.to_string());
            model.ui.clear_registration_drafts();
            model.ui.set_status(
                format!("Registered as client {client_id}"),
                StatusKind::Success,
            );
        }
        Err(err) => fail(model, ActionKind::RegisterClient, &err),
    }
}
