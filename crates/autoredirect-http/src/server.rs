use crate::error::{HttpError, HttpServeError};
use crate::request::Request;
use crate::response::Response;
use crate::routes::RouteTable;
use autoredirect_core::RedirectConfig;
use std::net::{SocketAddr, TcpListener, TcpStream};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub bind: SocketAddr,
}

/// A web application built on the redirection core.
pub trait Application {
    fn config(&self) -> &RedirectConfig;
    fn routes(&self) -> &RouteTable;
    /// Handle a request already routed by [`Application::routes`].
    fn dispatch(&self, request: &Request) -> Result<Response, HttpError>;

    /// Route and dispatch, turning failures into error responses.
    fn handle(&self, request: Request) -> Response {
        let result = self
            .routes()
            .route_request(request)
            .and_then(|routed| self.dispatch(&routed));
        match result {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "request failed");
                Response::error(&err)
            }
        }
    }
}

pub fn serve(config: HttpServerConfig, app: &impl Application) -> Result<(), HttpServeError> {
    serve_with_limit(config, app, None)
}

pub fn serve_with_limit(
    config: HttpServerConfig,
    app: &impl Application,
    max_requests: Option<usize>,
) -> Result<(), HttpServeError> {
    let listener = TcpListener::bind(config.bind).map_err(HttpServeError::Bind)?;
    let mut served = 0usize;

    for stream in listener.incoming() {
        if let Some(limit) = max_requests
            && served >= limit
        {
            break;
        }

        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream, app) {
                    warn!(error = %err, "failed to write response");
                }
                served += 1;
                if let Some(limit) = max_requests
                    && served >= limit
                {
                    break;
                }
            }
            Err(err) => return Err(HttpServeError::Accept(err)),
        }
    }

    Ok(())
}

fn handle_connection(stream: &mut TcpStream, app: &impl Application) -> std::io::Result<()> {
    let response = match Request::read_from(stream) {
        Ok(request) => {
            debug!(path = %request.path(), "handling request");
            app.handle(request)
        }
        Err(err) => Response::error(&err),
    };
    response.write_to(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookstore::BookStore;
    use std::io::{Read, Write};

    #[test]
    fn serves_one_request_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let app = BookStore::new(
            RedirectConfig::builder()
                .encryption_key("server test")
                .build(),
        );
        let server = std::thread::spawn(move || {
            serve_with_limit(HttpServerConfig { bind: addr }, &app, Some(1))
        });

        let mut stream = loop {
            match TcpStream::connect(addr) {
                Ok(stream) => break stream,
                Err(_) => std::thread::sleep(std::time::Duration::from_millis(10)),
            }
        };
        stream
            .write_all(b"GET /books/show/1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();
        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
        assert!(text.contains("action=\"/comments/create\""));

        server.join().unwrap().unwrap();
    }
}
