use crate::error::HttpError;
use crate::render::render_form_page;
use autoredirect_core::{Delivery, FormPage};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "text/html; charset=utf-8".to_string(),
            )],
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.into(),
        }
    }

    /// `302 Found` to `location`.
    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".to_string(), location.to_string())],
            body: String::new(),
        }
    }

    pub fn error(err: &HttpError) -> Self {
        Self::text(err.status(), err.to_string())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// First header called `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("Set-Cookie"))
            .map(|(_, v)| v.as_str())
    }

    pub fn write_to(&self, stream: &mut impl Write) -> std::io::Result<()> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        stream.write_all(head.as_bytes())?;
        stream.write_all(self.body.as_bytes())?;
        stream.flush()
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// [`Delivery`] that produces a [`Response`]: a `302` for redirects and an
/// HTML page for forms.
#[derive(Debug, Default)]
pub struct ResponseDelivery {
    xhtml: bool,
    response: Option<Response>,
}

impl ResponseDelivery {
    pub fn new(xhtml: bool) -> Self {
        Self {
            xhtml,
            response: None,
        }
    }

    /// The delivered response, if the resolver delivered one.
    pub fn into_response(self) -> Option<Response> {
        self.response
    }
}

impl Delivery for ResponseDelivery {
    fn redirect(&mut self, location: &str) {
        self.response = Some(Response::redirect(location));
    }

    fn render_form(&mut self, page: &FormPage) {
        self.response = Some(Response::html(200, render_form_page(page, self.xhtml)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_status_headers_and_body() {
        let mut out = Vec::new();
        Response::redirect("/books/show/1")
            .with_header("Set-Cookie", "_flash=; Path=/; Max-Age=0")
            .write_to(&mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 302 Found\r\n"));
        assert!(text.contains("Location: /books/show/1\r\n"));
        assert!(text.contains("Set-Cookie: _flash=; Path=/; Max-Age=0\r\n"));
        assert!(text.ends_with("Content-Length: 0\r\nConnection: close\r\n\r\n"));
    }

    #[test]
    fn delivery_keeps_the_last_decision() {
        let mut delivery = ResponseDelivery::new(true);
        delivery.redirect("/a");
        delivery.redirect("/b");
        assert_eq!(delivery.into_response().unwrap().location(), Some("/b"));
        assert!(ResponseDelivery::new(false).into_response().is_none());
    }
}
