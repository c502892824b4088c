//! Demo application: a book store where posting a comment needs a login.
//!
//! The flow exercises every redirection path: a visitor reading a book
//! posts a comment, is sent to the login form, and after logging in the
//! comment POST is replayed through a self-submitting form, which in turn
//! sends the visitor back to the book.

use crate::error::HttpError;
use crate::flash::CookieFlash;
use crate::request::Request;
use crate::response::{Response, ResponseDelivery};
use crate::routes::RouteTable;
use crate::server::Application;
use autoredirect_core::markup::{escape_html, void_close};
use autoredirect_core::{
    RedirectConfig, RequestContext, Resolver, SaveLocation, pass_redirection_information,
};
use tracing::info;

pub const SESSION_COOKIE: &str = "_session";
pub const DEMO_PASSWORD: &str = "secret";

const LOGGED_IN: &str = "logged_in";

pub struct BookStore {
    config: RedirectConfig,
    routes: RouteTable,
}

impl BookStore {
    pub fn new(config: RedirectConfig) -> Self {
        Self {
            config,
            routes: Self::route_table(),
        }
    }

    pub fn route_table() -> RouteTable {
        RouteTable::new()
            .route("books", "index", "/")
            .route("books", "show", "/books/show/:id")
            .route("comments", "create", "/comments/create")
            .route("login", "login_form", "/login/login_form")
            .route("login", "process_login", "/login/process_login")
    }

    fn index(&self) -> Response {
        let body = (1..=3)
            .map(|id| format!("<li><a href=\"/books/show/{id}\">Book {id}</a></li>"))
            .collect::<Vec<_>>()
            .join("\n");
        page("Books", &format!("<ul>\n{body}\n</ul>"))
    }

    fn show_book(&self, request: &Request) -> Response {
        let id = escape_html(request.param("id").unwrap_or_default());
        let close = void_close(self.config.xhtml());
        page(
            &format!("Book {id}"),
            &format!(
                "<form action=\"/comments/create\" method=\"post\">\n<input type=\"text\" name=\"summary\"{close}\n<input type=\"submit\" value=\"Submit\"{close}\n</form>\n<a href=\"/login/login_form\">Log in</a>"
            ),
        )
    }

    fn create_comment(&self, request: &Request) -> Result<Response, HttpError> {
        let mut flash = CookieFlash::from_request(request);
        let response = if logged_in(request) {
            let mut delivery = ResponseDelivery::new(self.config.xhtml());
            Resolver::new(&self.config, request, &self.routes)
                .with_store(&mut flash)
                .attempt_resolve(&mut delivery)?;
            match delivery.into_response() {
                Some(response) => response,
                None => {
                    let summary = request.param("summary").unwrap_or_default();
                    info!(summary = %summary, "comment created");
                    Response::text(200, format!("Comment '{summary}' created!"))
                }
            }
        } else {
            Resolver::new(&self.config, request, &self.routes)
                .with_store(&mut flash)
                .save_current_request(SaveLocation::Here)?;
            Response::redirect("/login/login_form")
        };
        Ok(flash.apply(response))
    }

    fn login_form(&self, request: &Request) -> Result<Response, HttpError> {
        let mut flash = CookieFlash::from_request(request);
        let hidden = {
            let mut resolver =
                Resolver::new(&self.config, request, &self.routes).with_store(&mut flash);
            pass_redirection_information(&mut resolver)?
        };
        let close = void_close(self.config.xhtml());
        let response = page(
            "Log in",
            &format!(
                "<form action=\"/login/process_login\" method=\"post\">\n<div class=\"redirection_info\">\n{}\n</div>\n<input type=\"password\" name=\"password\"{close}\n<input type=\"submit\" value=\"Login\"{close}\n</form>",
                hidden.unwrap_or_default()
            ),
        );
        Ok(flash.apply(response))
    }

    fn process_login(&self, request: &Request) -> Result<Response, HttpError> {
        if request.param("password") != Some(DEMO_PASSWORD) {
            info!("login failed");
            return self.login_form(request);
        }
        let mut flash = CookieFlash::from_request(request);
        let mut delivery = ResponseDelivery::new(self.config.xhtml());
        Resolver::new(&self.config, request, &self.routes)
            .with_store(&mut flash)
            .auto_redirect(&mut delivery)?;
        let response = delivery
            .into_response()
            .ok_or_else(|| HttpError::Internal("auto-redirection delivered nothing".to_string()))?;
        Ok(flash
            .apply(response)
            .with_header("Set-Cookie", format!("{SESSION_COOKIE}={LOGGED_IN}; Path=/; HttpOnly")))
    }
}

impl Application for BookStore {
    fn config(&self) -> &RedirectConfig {
        &self.config
    }

    fn routes(&self) -> &RouteTable {
        &self.routes
    }

    fn dispatch(&self, request: &Request) -> Result<Response, HttpError> {
        match (request.operation_id(), request.action_id()) {
            ("books", "index") => Ok(self.index()),
            ("books", "show") => Ok(self.show_book(request)),
            ("comments", "create") => self.create_comment(request),
            ("login", "login_form") => self.login_form(request),
            ("login", "process_login") => self.process_login(request),
            (operation, action) => Err(HttpError::NotFound(format!("{operation}/{action}"))),
        }
    }
}

fn logged_in(request: &Request) -> bool {
    request.cookie(SESSION_COOKIE) == Some(LOGGED_IN)
}

fn page(title: &str, body: &str) -> Response {
    Response::html(
        200,
        format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n"
        ),
    )
}
