mod http;

pub use self::http::{
    Endpoint, HttpError, HttpHeaders, AUTHORIZATION_HEADER, MAX_HEADERS_COUNT,
};

// Crux's built-in Render capability covers view updates; no wrapper needed.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;
use crate::App;

pub type AppHttp = Http<Event>;
pub type AppRender = Render<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}
