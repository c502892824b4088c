//! In-process integration testing for applications using auto-redirection.
//!
//! A [`Session`] behaves like a browser with one tab: each request sends the
//! previous request's path as `Referer`, carries cookies set by earlier
//! responses, and forwards the `_redirection_information` hidden field of
//! the last page unless the caller passes one explicitly.
//!
//! ```ignore
//! let mut session = Session::new(BookStore::new(config));
//! session.post("/comments/create", Parameters::new().with("summary", "hi"));
//! session.assert_redirected_to("/login/login_form");
//! session.get("/login/login_form", Parameters::new());
//! session.post("/login/process_login", Parameters::new().with("password", "secret"));
//! session.assert_redirection_with_method(RedirectMethod::Post, "/comments/create", None);
//! session.follow_redirection_with_method();
//! ```
//!
//! Assertion helpers panic with a descriptive message, like `assert!`.

use crate::flash::CookieFlash;
use crate::request::{Request, params_from_pairs};
use crate::response::Response;
use crate::server::Application;
use autoredirect_core::form::{FORM_ID, METHOD_OVERRIDE_FIELD};
use autoredirect_core::{
    Parameters, REDIRECTION_INFORMATION_KEY, RedirectDescriptor, RedirectMethod, Resolver,
};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use url::{Url, form_urlencoded};

/// What a self-submitting redirection page would send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionPage {
    pub path: String,
    pub method: RedirectMethod,
    pub parameters: Parameters,
    /// Nested token carried by the page, if any.
    pub redirection_data: Option<String>,
}

pub struct Session<A> {
    app: A,
    cookies: BTreeMap<String, String>,
    referer: Option<String>,
    last_request: Option<Request>,
    last_response: Option<Response>,
}

impl<A: Application> Session<A> {
    pub fn new(app: A) -> Self {
        Self {
            app,
            cookies: BTreeMap::new(),
            referer: None,
            last_request: None,
            last_response: None,
        }
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn get(&mut self, path: &str, parameters: Parameters) -> &Response {
        self.request(RedirectMethod::Get, path, parameters, &[])
    }

    pub fn post(&mut self, path: &str, parameters: Parameters) -> &Response {
        self.request(RedirectMethod::Post, path, parameters, &[])
    }

    pub fn put(&mut self, path: &str, parameters: Parameters) -> &Response {
        self.request(RedirectMethod::Put, path, parameters, &[])
    }

    pub fn delete(&mut self, path: &str, parameters: Parameters) -> &Response {
        self.request(RedirectMethod::Delete, path, parameters, &[])
    }

    /// Send a request. An explicit `Referer` in `headers` overrides the
    /// recorded one.
    pub fn request(
        &mut self,
        method: RedirectMethod,
        path: &str,
        mut parameters: Parameters,
        headers: &[(&str, &str)],
    ) -> &Response {
        if !parameters.contains_key(REDIRECTION_INFORMATION_KEY)
            && let Some(token) = self.try_redirection_information_from_form()
        {
            parameters.insert(REDIRECTION_INFORMATION_KEY, token);
        }
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(parameters.flatten())
            .finish();

        let mut target = path.to_string();
        let mut body = String::new();
        if method.is_get() {
            if !encoded.is_empty() {
                target.push(if path.contains('?') { '&' } else { '?' });
                target.push_str(&encoded);
            }
        } else {
            body = encoded;
        }

        let mut raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n");
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        let explicit_referer = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("referer"));
        if !explicit_referer && let Some(referer) = &self.referer {
            raw.push_str(&format!("Referer: {referer}\r\n"));
        }
        if !self.cookies.is_empty() {
            let jar = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            raw.push_str(&format!("Cookie: {jar}\r\n"));
        }
        if !method.is_get() {
            raw.push_str(&format!(
                "Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n",
                body.len()
            ));
        }
        raw.push_str("\r\n");
        raw.push_str(&body);

        let request = match Request::parse(raw.as_bytes()) {
            Ok(request) => request,
            Err(err) => panic!("test request to {path} did not parse: {err}"),
        };
        let response = match self.app.routes().route_request(request) {
            Ok(routed) => {
                let response = self
                    .app
                    .dispatch(&routed)
                    .unwrap_or_else(|err| Response::error(&err));
                self.last_request = Some(routed);
                response
            }
            Err(err) => {
                self.last_request = None;
                Response::error(&err)
            }
        };
        self.store_cookies(&response);
        self.referer = Some(path.to_string());
        self.last_response.insert(response)
    }

    pub fn response(&self) -> &Response {
        match &self.last_response {
            Some(response) => response,
            None => panic!("no request has been made yet"),
        }
    }

    pub fn assert_response(&self, status: u16) {
        let response = self.response();
        assert_eq!(
            response.status, status,
            "unexpected status; body:\n{}",
            response.body
        );
    }

    pub fn assert_redirected_to(&self, location: &str) {
        let response = self.response();
        assert_eq!(response.status, 302, "expected a redirect; body:\n{}", response.body);
        assert_eq!(response.location(), Some(location));
    }

    /// Assert that the last request received redirection information
    /// leading to `path`. When `parameters` is given, the information's
    /// parameters (nested token excluded) must equal it too.
    pub fn assert_came_from(&self, path: &str, parameters: Option<&Parameters>) {
        let Some(request) = &self.last_request else {
            panic!("no routed request has been made yet");
        };
        let mut flash = CookieFlash::from_request(request);
        let info = {
            let mut resolver = Resolver::new(self.app.config(), request, self.app.routes())
                .with_store(&mut flash);
            match resolver.redirection_information() {
                Ok(Some(info)) => info.clone(),
                Ok(None) => panic!("No redirection information."),
                Err(err) => panic!("redirection information was rejected: {err}"),
            }
        };
        match info.path(self.app.routes()) {
            Ok(actual) => assert_eq!(actual, path),
            Err(err) => panic!("redirection information has no path: {err}"),
        }
        if let Some(expected) = parameters {
            let actual = match &info {
                RedirectDescriptor::Operation(op) => op.parameters.split_nested_token().0,
                RedirectDescriptor::Url(target) => url_query_parameters(&target.url),
            };
            assert_eq!(&actual, expected);
        }
    }

    /// Hidden `_redirection_information` value in the last page, if any.
    pub fn try_redirection_information_from_form(&self) -> Option<String> {
        let response = self.last_response.as_ref()?;
        input_tags(&response.body)
            .into_iter()
            .find(|attrs| attrs.get("name").map(String::as_str) == Some(REDIRECTION_INFORMATION_KEY))
            .and_then(|mut attrs| attrs.remove("value"))
    }

    pub fn redirection_information_from_form(&self) -> String {
        match self.try_redirection_information_from_form() {
            Some(value) => value,
            None => panic!("There is no redirection information inside the form."),
        }
    }

    /// Value of the first `<input>` after the element with class `class`.
    pub fn input_value_within(&self, class: &str) -> Option<String> {
        let body = &self.last_response.as_ref()?.body;
        let start = body.find(&format!("class=\"{class}\""))?;
        input_tags(&body[start..])
            .into_iter()
            .next()
            .and_then(|mut attrs| attrs.remove("value"))
    }

    pub fn parse_redirection_page(&self) -> RedirectionPage {
        let response = self.response();
        assert_eq!(
            response.status, 200,
            "Controller did not render a redirection page."
        );
        let Some(form) = redirection_form(&response.body) else {
            panic!("Controller did not render a redirection page.");
        };
        let Some(action) = form.attributes.get("action") else {
            panic!("redirection form has no action");
        };
        let (path, query) = action.split_once('?').unwrap_or((action.as_str(), ""));

        let mut method = RedirectMethod::Post;
        let mut redirection_data = None;
        let mut pairs: Vec<(String, String)> =
            form_urlencoded::parse(query.as_bytes()).into_owned().collect();
        for mut input in input_tags(&form.inner) {
            let (Some(name), Some(value)) = (input.remove("name"), input.remove("value")) else {
                continue;
            };
            if name == METHOD_OVERRIDE_FIELD {
                method = match value.parse() {
                    Ok(method) => method,
                    Err(err) => panic!("bad method override: {err}"),
                };
            } else if name == REDIRECTION_INFORMATION_KEY {
                redirection_data = Some(value);
            } else {
                pairs.push((name, value));
            }
        }

        RedirectionPage {
            path: path.to_string(),
            method,
            parameters: params_from_pairs(pairs),
            redirection_data,
        }
    }

    /// Assert that the last response asks the browser to replay a non-GET
    /// request. Use [`Session::assert_redirected_to`] for GET redirects.
    pub fn assert_redirection_with_method(
        &self,
        method: RedirectMethod,
        path: &str,
        parameters: Option<&Parameters>,
    ) {
        let page = self.parse_redirection_page();
        assert_eq!(page.path, path);
        assert_eq!(
            page.method, method,
            "<{method}> redirection expected, but <{}> redirection found.",
            page.method
        );
        if let Some(expected) = parameters {
            assert_eq!(&page.parameters, expected);
        }
    }

    /// Submit the redirection page the way its script would.
    pub fn follow_redirection_with_method(&mut self) -> &Response {
        let page = self.parse_redirection_page();
        let mut parameters = page.parameters;
        if let Some(token) = page.redirection_data {
            parameters.insert(REDIRECTION_INFORMATION_KEY, token);
        }
        self.request(page.method, &page.path, parameters, &[])
    }

    fn store_cookies(&mut self, response: &Response) {
        for header in response.set_cookies() {
            let pair = header.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let expired = header
                .split(';')
                .any(|attr| attr.trim().eq_ignore_ascii_case("Max-Age=0"));
            if expired || value.is_empty() {
                self.cookies.remove(name.trim());
            } else {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
}

struct FormElement {
    attributes: BTreeMap<String, String>,
    inner: String,
}

fn form_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<form\b([^>]*)>").expect("form regex must compile"))
}

fn input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("input regex must compile"))
}

fn attribute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*"([^"]*)""#)
            .expect("attribute regex must compile")
    })
}

fn attributes(tag_body: &str) -> BTreeMap<String, String> {
    attribute_re()
        .captures_iter(tag_body)
        .map(|c| (c[1].to_ascii_lowercase(), unescape_html(&c[2])))
        .collect()
}

fn input_tags(html: &str) -> Vec<BTreeMap<String, String>> {
    input_re()
        .captures_iter(html)
        .map(|c| attributes(&c[1]))
        .collect()
}

fn redirection_form(html: &str) -> Option<FormElement> {
    form_open_re().captures_iter(html).find_map(|c| {
        let attributes = attributes(&c[1]);
        if attributes.get("id").map(String::as_str) != Some(FORM_ID) {
            return None;
        }
        let open_end = c.get(0)?.end();
        let close = html[open_end..].find("</form>")?;
        Some(FormElement {
            attributes,
            inner: html[open_end..open_end + close].to_string(),
        })
    })
}

fn unescape_html(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn url_query_parameters(raw: &str) -> Parameters {
    let parsed = Url::parse(raw).or_else(|_| {
        Url::parse("http://localhost/").and_then(|base| base.join(raw))
    });
    match parsed {
        Ok(url) => params_from_pairs(url.query_pairs().into_owned()),
        Err(_) => Parameters::new(),
    }
}
