//! Pure projection of (snapshot, UI state) into the view model.
//!
//! [`compute_view_model`] reads its inputs and nothing else. Calling it twice
//! with the same inputs gives equal outputs, so the shell may call it as
//! often as it likes.

use serde::{Deserialize, Serialize};

use crate::model::Settings;
use crate::snapshot::{ClientId, CompanyTotals, Snapshot, Taxi, TaxiId, TaxiStatus};
use crate::ui_state::{Optimistic, Role, StatusMessage, UiState};
use crate::{format_currency, format_rating, MAP_LOGICAL_EXTENT};

/// Poll health as shown in the connection indicator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub polls_skipped: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub role: Role,
    pub state: ViewState,
    pub status: Option<StatusMessage>,
    pub connection: ConnectionView,
    pub simulation: SimulationView,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    NoData {
        message: String,
    },
    Ready {
        panel: RolePanel,
        best_taxi: BestTaxiBadge,
        map: MapView,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RolePanel {
    Admin {
        roster: Vec<TaxiRow>,
        focus: AdminFocus,
    },
    Client {
        client_id_text: String,
        client: Option<ClientCard>,
        can_request_trip: bool,
        can_register: bool,
    },
    Driver {
        taxi_id_text: String,
        taxi: Option<TaxiCard>,
    },
}

/// The admin side panel shows the selected taxi, or company totals when
/// nothing is selected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminFocus {
    Taxi(TaxiCard),
    Company(CompanyCard),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxiRow {
    pub taxi_id: TaxiId,
    pub model: String,
    pub plate: String,
    pub status: TaxiStatus,
    pub earnings_text: String,
    pub trips: u64,
    pub rating_text: String,
    pub is_selected: bool,
    pub delete_pending: bool,
    pub can_delete: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxiCard {
    pub taxi_id: TaxiId,
    pub model: String,
    pub plate: String,
    pub status: TaxiStatus,
    pub x: f64,
    pub y: f64,
    pub earnings: f64,
    pub earnings_text: String,
    pub trips: u64,
    pub rating_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCard {
    pub client_id: ClientId,
    pub name: String,
    pub trips: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyCard {
    pub revenue: f64,
    pub revenue_text: String,
    pub trips: u64,
    pub taxi_count: usize,
    pub free_count: usize,
    pub busy_count: usize,
    pub client_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BestTaxiBadge {
    Empty,
    Taxi {
        taxi_id: TaxiId,
        model: String,
        plate: String,
        earnings_text: String,
        rating_text: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub width_px: f64,
    pub height_px: f64,
    pub markers: Vec<TaxiMarker>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerColor {
    Free,
    Busy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    Selected,
    Mine,
    Default,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxiMarker {
    pub taxi_id: TaxiId,
    pub label: String,
    pub x_px: f64,
    pub y_px: f64,
    pub color: MarkerColor,
    pub highlight: Highlight,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionView {
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub polls_skipped: u64,
    /// True while the shown snapshot is older than the latest poll attempt.
    pub is_stale: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationView {
    pub active: bool,
    pub interval_secs: Option<f64>,
    pub clock: String,
    /// A config change is waiting for the service.
    pub is_pending: bool,
}

pub const NO_DATA_MESSAGE: &str = "Waiting for dispatch data...";

#[must_use]
pub fn compute_view_model(
    snapshot: Option<&Snapshot>,
    ui: &UiState,
    health: &ConnectionHealth,
    settings: &Settings,
) -> ViewModel {
    let state = snapshot.map_or_else(
        || ViewState::NoData {
            message: NO_DATA_MESSAGE.to_string(),
        },
        |snapshot| ViewState::Ready {
            panel: role_panel(snapshot, ui),
            best_taxi: best_taxi(snapshot.top_taxi.as_ref()),
            map: map_view(snapshot, ui, settings.map_scale()),
        },
    );

    ViewModel {
        role: ui.role(),
        state,
        status: ui.status().cloned(),
        connection: ConnectionView {
            last_error: health.last_error.clone(),
            consecutive_failures: health.consecutive_failures,
            total_failures: health.total_failures,
            polls_skipped: health.polls_skipped,
            is_stale: health.consecutive_failures > 0,
        },
        simulation: simulation_view(snapshot, ui),
    }
}

fn role_panel(snapshot: &Snapshot, ui: &UiState) -> RolePanel {
    match ui.role() {
        Role::Admin => RolePanel::Admin {
            roster: snapshot
                .taxis
                .iter()
                .map(|taxi| taxi_row(taxi, ui))
                .collect(),
            focus: ui
                .selected_taxi()
                .and_then(|id| snapshot.taxi(id))
                .map_or_else(
                    || AdminFocus::Company(company_card(snapshot, &snapshot.company)),
                    |taxi| AdminFocus::Taxi(taxi_card(taxi)),
                ),
        },
        Role::Client => {
            let my_id = ui.my_client_id();
            let drafts = ui.drafts();
            RolePanel::Client {
                client_id_text: drafts.client_id.clone(),
                client: my_id.and_then(|id| snapshot.client(id)).map(|c| ClientCard {
                    client_id: c.id,
                    name: c.name.clone(),
                    trips: c.trips,
                }),
                can_request_trip: my_id.is_some(),
                can_register: !drafts.client_name.trim().is_empty()
                    && drafts.card_number.is_some(),
            }
        }
        Role::Driver => RolePanel::Driver {
            taxi_id_text: ui.drafts().taxi_id.clone(),
            taxi: ui
                .my_taxi_id()
                .and_then(|id| snapshot.taxi(id))
                .map(taxi_card),
        },
    }
}

fn taxi_row(taxi: &Taxi, ui: &UiState) -> TaxiRow {
    let delete_pending = ui.is_pending_deletion(taxi.id);
    TaxiRow {
        taxi_id: taxi.id,
        model: taxi.model.clone(),
        plate: taxi.plate.clone(),
        status: taxi.status,
        earnings_text: format_currency(taxi.earnings),
        trips: taxi.trips,
        rating_text: format_rating(taxi.rating),
        is_selected: ui.selected_taxi() == Some(taxi.id),
        delete_pending,
        can_delete: !delete_pending && taxi.status.is_free(),
    }
}

fn taxi_card(taxi: &Taxi) -> TaxiCard {
    TaxiCard {
        taxi_id: taxi.id,
        model: taxi.model.clone(),
        plate: taxi.plate.clone(),
        status: taxi.status,
        x: taxi.x,
        y: taxi.y,
        earnings: taxi.earnings,
        earnings_text: format_currency(taxi.earnings),
        trips: taxi.trips,
        rating_text: format_rating(taxi.rating),
    }
}

fn company_card(snapshot: &Snapshot, company: &CompanyTotals) -> CompanyCard {
    let free_count = snapshot.free_taxis();
    CompanyCard {
        revenue: company.revenue,
        revenue_text: format_currency(company.revenue),
        trips: company.trips,
        taxi_count: snapshot.taxis.len(),
        free_count,
        busy_count: snapshot.taxis.len() - free_count,
        client_count: snapshot.clients.len(),
    }
}

fn best_taxi(top: Option<&Taxi>) -> BestTaxiBadge {
    top.map_or(BestTaxiBadge::Empty, |taxi| BestTaxiBadge::Taxi {
        taxi_id: taxi.id,
        model: taxi.model.clone(),
        plate: taxi.plate.clone(),
        earnings_text: format_currency(taxi.earnings),
        rating_text: format_rating(taxi.rating),
    })
}

/// Selected wins over mine, mine over default. A taxi is "mine" only while
/// the driver role is active.
#[must_use]
pub fn highlight_for(taxi_id: TaxiId, ui: &UiState) -> Highlight {
    if ui.selected_taxi() == Some(taxi_id) {
        Highlight::Selected
    } else if ui.role() == Role::Driver && ui.my_taxi_id() == Some(taxi_id) {
        Highlight::Mine
    } else {
        Highlight::Default
    }
}

fn map_view(snapshot: &Snapshot, ui: &UiState, scale: f64) -> MapView {
    let markers = snapshot
        .taxis
        .iter()
        .filter_map(|taxi| {
            // validated snapshots always have a point; skip rather than panic
            let (x_px, y_px) = taxi.position().ok()?.to_pixels(scale);
            Some(TaxiMarker {
                taxi_id: taxi.id,
                label: taxi.plate.clone(),
                x_px,
                y_px,
                color: if taxi.status.is_free() {
                    MarkerColor::Free
                } else {
                    MarkerColor::Busy
                },
                highlight: highlight_for(taxi.id, ui),
            })
        })
        .collect();

    MapView {
        width_px: MAP_LOGICAL_EXTENT * scale,
        height_px: MAP_LOGICAL_EXTENT * scale,
        markers,
    }
}

fn simulation_view(snapshot: Option<&Snapshot>, ui: &UiState) -> SimulationView {
    let controls = ui.simulation();
    SimulationView {
        active: controls.active().map_or_else(
            || snapshot.is_some_and(|s| s.simulation_active),
            Optimistic::value,
        ),
        interval_secs: controls
            .interval_secs()
            .map(Optimistic::value)
            .or_else(|| snapshot.and_then(|s| s.simulation_interval)),
        clock: snapshot
            .map(|s| s.simulation_clock.clone())
            .unwrap_or_default(),
        is_pending: controls.is_pending(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::snapshot::Client;

    fn taxi(id: u64, status: TaxiStatus, x: f64, y: f64) -> Taxi {
        Taxi {
            id: TaxiId(id),
            model: "Nissan Versa".into(),
            plate: format!("TX{id}"),
            status,
            x,
            y,
            earnings: 12.5,
            trips: 2,
            rating: 4.5,
        }
    }

    fn sample() -> Snapshot {
        Snapshot {
            taxis: vec![
                taxi(1, TaxiStatus::Free, 10.0, 20.0),
                taxi(2, TaxiStatus::Busy, 50.0, 50.0),
            ],
            clients: vec![Client {
                id: ClientId(4),
                name: "Ana".into(),
                trips: 3,
            }],
            company: CompanyTotals {
                revenue: 99.0,
                trips: 7,
            },
            top_taxi: Some(taxi(2, TaxiStatus::Busy, 50.0, 50.0)),
            simulation_active: true,
            simulation_clock: "10:30".into(),
            simulation_interval: Some(1.0),
        }
    }

    fn view(snapshot: Option<&Snapshot>, ui: &UiState) -> ViewModel {
        compute_view_model(snapshot, ui, &ConnectionHealth::default(), &Settings::default())
    }

    fn ready(vm: &ViewModel) -> (&RolePanel, &BestTaxiBadge, &MapView) {
        match &vm.state {
            ViewState::Ready {
                panel,
                best_taxi,
                map,
            } => (panel, best_taxi, map),
            ViewState::NoData { .. } => panic!("expected ready state"),
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn test_no_snapshot_is_no_data() {
            let vm = view(None, &UiState::new());
            assert!(matches!(vm.state, ViewState::NoData { .. }));
            assert!(!vm.simulation.active);
        }

        #[test]
        fn test_best_taxi_badge() {
            let snapshot = sample();
            let vm = view(Some(&snapshot), &UiState::new());
            let (_, badge, _) = ready(&vm);
            assert!(matches!(
                badge,
                BestTaxiBadge::Taxi {
                    taxi_id: TaxiId(2),
                    ..
                }
            ));
        }

        #[test]
        fn test_best_taxi_absent_is_empty() {
            let snapshot = Snapshot {
                top_taxi: None,
                ..sample()
            };
            let vm = view(Some(&snapshot), &UiState::new());
            assert_eq!(ready(&vm).1, &BestTaxiBadge::Empty);
        }

        #[test]
        fn test_idempotent() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.select_taxi(TaxiId(1), Some(&snapshot));
            assert_eq!(view(Some(&snapshot), &ui), view(Some(&snapshot), &ui));
        }

        #[test]
        fn test_stale_flag_follows_failures() {
            let health = ConnectionHealth {
                last_error: Some("service unreachable: refused".into()),
                consecutive_failures: 2,
                total_failures: 2,
                polls_skipped: 1,
            };
            let snapshot = sample();
            let vm =
                compute_view_model(Some(&snapshot), &UiState::new(), &health, &Settings::default());
            assert!(vm.connection.is_stale);
            assert_eq!(vm.connection.polls_skipped, 1);
            assert!(matches!(vm.state, ViewState::Ready { .. }));
        }
    }

    mod admin_tests {
        use super::*;

        #[test]
        fn test_company_focus_without_selection() {
            let snapshot = sample();
            let vm = view(Some(&snapshot), &UiState::new());
            let RolePanel::Admin { roster, focus } = ready(&vm).0 else {
                panic!("expected admin panel");
            };
            assert_eq!(roster.len(), 2);
            let AdminFocus::Company(company) = focus else {
                panic!("expected company focus");
            };
            assert_eq!(company.revenue_text, "$99.00");
            assert_eq!(company.free_count, 1);
            assert_eq!(company.busy_count, 1);
            assert_eq!(company.client_count, 1);
        }

        #[test]
        fn test_selected_taxi_replaces_company() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.select_taxi(TaxiId(1), Some(&snapshot));
            let vm = view(Some(&snapshot), &ui);
            let RolePanel::Admin { focus, roster } = ready(&vm).0 else {
                panic!("expected admin panel");
            };
            assert!(matches!(focus, AdminFocus::Taxi(card) if card.taxi_id == TaxiId(1)));
            assert!(roster[0].is_selected);
            assert!(!roster[1].is_selected);
        }

        #[test]
        fn test_delete_flags() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.begin_deletion(TaxiId(1), TaxiStatus::Free).unwrap();
            let vm = view(Some(&snapshot), &ui);
            let RolePanel::Admin { roster, .. } = ready(&vm).0 else {
                panic!("expected admin panel");
            };
            assert!(roster[0].delete_pending);
            assert!(!roster[0].can_delete);
            // busy taxi can never be deleted
            assert!(!roster[1].can_delete);
            assert!(!roster[1].delete_pending);
        }
    }

    mod role_tests {
        use super::*;

        #[test]
        fn test_client_panel_resolves_record() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.set_role(Role::Client);
            ui.set_client_id_text(" 4 ".into());
            let vm = view(Some(&snapshot), &ui);
            let RolePanel::Client {
                client,
                can_request_trip,
                ..
            } = ready(&vm).0
            else {
                panic!("expected client panel");
            };
            assert_eq!(client.as_ref().map(|c| c.name.as_str()), Some("Ana"));
            assert!(*can_request_trip);
        }

        #[test]
        fn test_client_panel_unknown_id() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.set_role(Role::Client);
            ui.set_client_id_text("77".into());
            let vm = view(Some(&snapshot), &ui);
            let RolePanel::Client {
                client,
                can_request_trip,
                ..
            } = ready(&vm).0
            else {
                panic!("expected client panel");
            };
            assert!(client.is_none());
            assert!(*can_request_trip);
        }

        #[test]
        fn test_client_panel_without_id_cannot_request() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.set_role(Role::Client);
            ui.set_client_id_text("abc".into());
            let vm = view(Some(&snapshot), &ui);
            assert!(matches!(
                ready(&vm).0,
                RolePanel::Client {
                    can_request_trip: false,
                    ..
                }
            ));
        }

        #[test]
        fn test_driver_panel() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.set_role(Role::Driver);
            ui.set_taxi_id_text("2".into());
            let vm = view(Some(&snapshot), &ui);
            let RolePanel::Driver { taxi, .. } = ready(&vm).0 else {
                panic!("expected driver panel");
            };
            assert_eq!(taxi.as_ref().map(|t| t.status), Some(TaxiStatus::Busy));
        }
    }

    mod map_tests {
        use super::*;

        #[test]
        fn test_markers_projected() {
            let snapshot = sample();
            let vm = view(Some(&snapshot), &UiState::new());
            let map = ready(&vm).2;
            assert!((map.width_px - 500.0).abs() < f64::EPSILON);
            assert_eq!(map.markers[0].x_px, 50.0);
            assert_eq!(map.markers[0].y_px, 100.0);
            assert_eq!(map.markers[0].color, MarkerColor::Free);
            assert_eq!(map.markers[1].color, MarkerColor::Busy);
        }

        #[test]
        fn test_selected_beats_mine() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.set_role(Role::Driver);
            ui.set_taxi_id_text("1".into());
            assert_eq!(highlight_for(TaxiId(1), &ui), Highlight::Mine);
            ui.select_taxi(TaxiId(1), Some(&snapshot));
            assert_eq!(highlight_for(TaxiId(1), &ui), Highlight::Selected);
            assert_eq!(highlight_for(TaxiId(2), &ui), Highlight::Default);
        }

        #[test]
        fn test_mine_only_in_driver_role() {
            let mut ui = UiState::new();
            ui.set_taxi_id_text("1".into());
            assert_eq!(highlight_for(TaxiId(1), &ui), Highlight::Default);
        }
    }

    mod simulation_tests {
        use super::*;

        #[test]
        fn test_server_values_without_override() {
            let snapshot = sample();
            let vm = view(Some(&snapshot), &UiState::new());
            assert!(vm.simulation.active);
            assert_eq!(vm.simulation.interval_secs, Some(1.0));
            assert_eq!(vm.simulation.clock, "10:30");
            assert!(!vm.simulation.is_pending);
        }

        #[test]
        fn test_optimistic_override_shown() {
            let snapshot = sample();
            let mut ui = UiState::new();
            ui.begin_simulation_config(Some(false), Some(3.0));
            let vm = view(Some(&snapshot), &ui);
            assert!(!vm.simulation.active);
            assert_eq!(vm.simulation.interval_secs, Some(3.0));
            assert!(vm.simulation.is_pending);
        }

        #[test]
        fn test_status_message_passed_through() {
            let mut ui = UiState::new();
            ui.report(&ActionError::Busy(TaxiId(2)));
            let vm = view(None, &ui);
            assert_eq!(
                vm.status.map(|s| s.text),
                Some("Taxi 2 is busy and cannot be deleted".to_string())
            );
        }
    }
}
