//! HTTP collaborators for the redirection core.
//!
//! This crate plugs `autoredirect-core` into a minimal HTTP/1.1 stack:
//! [`Request`] implements `RequestContext`, [`CookieFlash`] is the one-shot
//! store, [`RouteTable`] resolves routes, and [`ResponseDelivery`] turns the
//! resolver's decision into a [`Response`]. [`BookStore`] is a small demo
//! application and [`testing::Session`] drives any [`Application`]
//! in-process for integration tests.

pub mod bookstore;
pub mod error;
pub mod flash;
pub mod render;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod testing;

pub use bookstore::BookStore;
pub use error::{HttpError, HttpServeError};
pub use flash::CookieFlash;
pub use render::render_form_page;
pub use request::Request;
pub use response::{Response, ResponseDelivery};
pub use routes::RouteTable;
pub use server::{Application, HttpServerConfig, serve, serve_with_limit};
