//! Effect capabilities available to the core.
//!
//! HTTP and render come straight from Crux. The timer is ours: it tells the
//! shell to start or stop the periodic `Tick` source.

mod http;
mod timer;

pub use self::http::{
    transport_failure, HttpError, HttpHeaders, HttpMethod, HttpResponse, HttpResult,
    ServicePath, ServiceRequest, REQUEST_ID_HEADER, TRANSPORT_FAILURE_STATUS,
};
pub use self::timer::{Timer, TimerOperation};

pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub timer: Timer<Event>,
}
