use crate::actions;
use crate::capabilities::Capabilities;
use crate::error::TransportError;
use crate::event::Event;
use crate::model::Model;
use crate::reconcile::{compute_view_model, ViewModel};
use crate::snapshot::Snapshot;
use crate::snapshot_client::{PollDecision, PollSeq};
use crate::snapshot_store::ApplyOutcome;

#[derive(Default, Debug, Clone, Copy)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let event_name = event.name();

        if !model.is_mounted() && !event.allowed_unmounted() {
            tracing::debug!(event = event_name, "ignoring event while unmounted");
            return;
        }

        if let Some(session) = event.session() {
            if !actions::is_current(model, session) {
                tracing::debug!(
                    event = event_name,
                    issued_in = %session,
                    current = %model.session,
                    "dropping response from an ended session"
                );
                return;
            }
        }

        if event.is_user_initiated() {
            tracing::debug!(event = event_name, "user action");
        } else {
            tracing::trace!(event = event_name, "event");
        }

        match event {
            // --- lifecycle & polling ---
            Event::Mounted { settings } => {
                if model.is_mounted() {
                    tracing::debug!("already mounted");
                    return;
                }
                let interval = settings.poll_interval();
                model.mount(settings);
                tracing::info!(
                    poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                    "dashboard mounted"
                );
                caps.timer.start(interval);
                Self::poll(model, caps);
                caps.render.render();
            }

            Event::Unmounted => {
                caps.timer.stop();
                model.unmount();
                tracing::info!("dashboard unmounted");
                caps.render.render();
            }

            Event::Tick | Event::RefreshRequested => {
                Self::poll(model, caps);
            }

            Event::SnapshotFetched { poll, result } => {
                Self::apply_snapshot(model, poll, *result);
                caps.render.render();
            }

            // --- local UI state ---
            Event::RoleSelected { role } => {
                model.ui.set_role(role);
                caps.render.render();
            }

            Event::TaxiSelected { taxi_id } => {
                if !model.ui.select_taxi(taxi_id, model.store.current()) {
                    tracing::debug!(taxi_id = %taxi_id, "selection ignored, taxi not in snapshot");
                }
                caps.render.render();
            }

            Event::TaxiDeselected => {
                model.ui.clear_selection();
                caps.render.render();
            }

            Event::MyClientIdEdited { text } => {
                model.ui.set_client_id_text(text);
                caps.render.render();
            }

            Event::MyTaxiIdEdited { text } => {
                model.ui.set_taxi_id_text(text);
                caps.render.render();
            }

            Event::ClientNameEdited { text } => {
                model.ui.set_client_name(text);
                caps.render.render();
            }

            Event::CardNumberEdited { card } => {
                model.ui.set_card_number(card);
                caps.render.render();
            }

            // --- commands ---
            Event::CreateTaxiRequested => {
                actions::create_taxi(model, caps);
                caps.render.render();
            }

            Event::TaxiCreated { plate, result, .. } => {
                actions::on_taxi_created(model, &plate, result);
                caps.render.render();
            }

            Event::DeleteTaxiRequested { taxi_id } => {
                actions::delete_taxi(model, caps, taxi_id);
                caps.render.render();
            }

            Event::TaxiDeleted {
                taxi_id, result, ..
            } => {
                actions::on_taxi_deleted(model, taxi_id, result);
                caps.render.render();
            }

            Event::ConfigureSimulationRequested {
                active,
                interval_secs,
            } => {
                actions::configure_simulation(model, caps, active, interval_secs);
                caps.render.render();
            }

            Event::SimulationConfigured { token, result, .. } => {
                actions::on_simulation_configured(model, token, result);
                caps.render.render();
            }

            Event::TripRequested => {
                actions::request_trip(model, caps);
                caps.render.render();
            }

            Event::TripResolved {
                client_id, result, ..
            } => {
                actions::on_trip_resolved(model, client_id, result);
                caps.render.render();
            }

            Event::RegisterClientRequested => {
                actions::register_client(model, caps);
                caps.render.render();
            }

            Event::ClientRegistered { result, .. } => {
                actions::on_client_registered(model, result);
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        compute_view_model(
            model.store.current(),
            &model.ui,
            &model.connection_health(),
            &model.settings,
        )
    }
}

impl App {
    fn poll(model: &mut Model, caps: &Capabilities) {
        let Some(base) = model.base_url.as_ref() else {
            tracing::warn!("no usable dispatch service url, poll not sent");
            return;
        };
        match model.client.poll(base, &caps.http) {
            PollDecision::Issued(seq) => {
                tracing::trace!(poll = %seq, "poll issued");
            }
            PollDecision::Skipped { outstanding } => {
                tracing::debug!(
                    outstanding = %outstanding,
                    skipped = model.client.polls_skipped(),
                    "poll skipped, previous still in flight"
                );
            }
        }
    }

    fn apply_snapshot(model: &mut Model, poll: PollSeq, result: Result<Snapshot, TransportError>) {
        // only the outstanding poll may land; anything else predates a reset
        if !model.client.finish_poll(poll) {
            tracing::debug!(poll = %poll, "discarding response for a poll no longer tracked");
            return;
        }

        match model.store.apply(poll, result) {
            ApplyOutcome::Replaced => {
                if let Some(snapshot) = model.store.current() {
                    for repair in model.ui.on_snapshot_replaced(snapshot, poll) {
                        tracing::info!(repair = %repair, "local state repaired");
                    }
                }
            }
            ApplyOutcome::Retained { .. } | ApplyOutcome::Stale { .. } => {}
        }
    }
}
