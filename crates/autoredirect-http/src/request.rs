//! HTTP/1.1 request parsing.
//!
//! Query string and `application/x-www-form-urlencoded` bodies are merged
//! into one [`Parameters`] value. Bracketed keys nest: `comment[body]=x`
//! becomes a map and `tags[]=a&tags[]=b` a sequence. A POST carrying a
//! `_method` field of `put` or `delete` is treated as that method.

use crate::error::HttpError;
use autoredirect_core::form::METHOD_OVERRIDE_FIELD;
use autoredirect_core::{ParamValue, Parameters, RequestContext};
use std::collections::BTreeMap;
use std::io::Read;
use url::form_urlencoded;

/// Requests larger than this are refused.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

const HEAD_END: &[u8] = b"\r\n\r\n";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
    parameters: Parameters,
    headers: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    operation_id: String,
    action_id: String,
}

impl Request {
    /// Parse a complete request: head, blank line, and body.
    pub fn parse(raw: &[u8]) -> Result<Self, HttpError> {
        let head_end = find_head_end(raw)
            .ok_or_else(|| HttpError::BadRequest("incomplete request head".to_string()))?;
        let head = std::str::from_utf8(&raw[..head_end])
            .map_err(|_| HttpError::BadRequest("request head is not utf-8".to_string()))?;
        let mut lines = head.split("\r\n");
        let line = lines
            .next()
            .ok_or_else(|| HttpError::BadRequest("missing request line".to_string()))?;
        let (mut method, target) = parse_request_line(line)?;

        let mut headers = BTreeMap::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| HttpError::BadRequest(format!("malformed header: {line}")))?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let body = &raw[head_end + HEAD_END.len()..];
        let length = match headers.get("content-length") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| HttpError::BadRequest(format!("bad content-length: {value}")))?,
            None => 0,
        };
        if body.len() < length {
            return Err(HttpError::BadRequest("truncated body".to_string()));
        }
        let body = &body[..length];

        let (path, query) = split_target(&target);
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let is_form = headers
            .get("content-type")
            .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
        if is_form {
            pairs.extend(form_urlencoded::parse(body).into_owned());
        }

        if let Some(index) = pairs.iter().position(|(k, _)| k == METHOD_OVERRIDE_FIELD) {
            let (_, value) = pairs.remove(index);
            if method == "POST" {
                method = match value.to_ascii_uppercase().as_str() {
                    "PUT" => "PUT".to_string(),
                    "DELETE" => "DELETE".to_string(),
                    _ => {
                        return Err(HttpError::BadRequest(format!(
                            "unsupported {METHOD_OVERRIDE_FIELD} override: {value}"
                        )));
                    }
                };
            }
            pairs.retain(|(k, _)| k != METHOD_OVERRIDE_FIELD);
        }

        let cookies = headers
            .get("cookie")
            .map(|raw| parse_cookies(raw.as_str()))
            .unwrap_or_default();

        Ok(Self {
            method,
            path: path.to_string(),
            parameters: params_from_pairs(pairs),
            headers,
            cookies,
            operation_id: String::new(),
            action_id: String::new(),
        })
    }

    /// Read one request from `stream`, stopping after the declared body.
    pub fn read_from(stream: &mut impl Read) -> Result<Self, HttpError> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            if let Some(head_end) = find_head_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..head_end]);
                let needed = head_end + HEAD_END.len() + declared_length(&head);
                if buf.len() >= needed {
                    break;
                }
            }
            let n = stream
                .read(&mut chunk)
                .map_err(|e| HttpError::BadRequest(format!("failed to read request: {e}")))?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.len() > MAX_REQUEST_BYTES {
                return Err(HttpError::BadRequest("request too large".to_string()));
            }
        }
        if buf.is_empty() {
            return Err(HttpError::BadRequest("empty request".to_string()));
        }
        Self::parse(&buf)
    }

    /// Attach the operation this request was routed to, merging any
    /// parameters captured from the path.
    pub fn with_route(
        mut self,
        operation_id: impl Into<String>,
        action_id: impl Into<String>,
        captured: &Parameters,
    ) -> Self {
        self.operation_id = operation_id.into();
        self.action_id = action_id.into();
        self.parameters = self.parameters.merged(captured);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(ParamValue::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

impl RequestContext for Request {
    fn operation_id(&self) -> &str {
        &self.operation_id
    }

    fn action_id(&self) -> &str {
        &self.action_id
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Build parameters from decoded `name=value` pairs, expanding bracketed
/// names. A repeated plain name keeps the last value.
pub fn params_from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Parameters {
    let mut root: BTreeMap<String, ParamValue> = BTreeMap::new();
    for (name, value) in pairs {
        let (base, path) = split_bracketed(&name);
        if base.is_empty() {
            continue;
        }
        let existing = root.remove(&base);
        root.insert(base, assign(existing, &path, value));
    }
    Parameters::from(root)
}

fn split_bracketed(name: &str) -> (String, Vec<String>) {
    let Some(open) = name.find('[') else {
        return (name.to_string(), Vec::new());
    };
    let base = &name[..open];
    let mut rest = &name[open..];
    let mut path = Vec::new();
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return (name.to_string(), Vec::new());
        };
        path.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }
    if !rest.is_empty() {
        return (name.to_string(), Vec::new());
    }
    (base.to_string(), path)
}

fn assign(existing: Option<ParamValue>, path: &[String], value: String) -> ParamValue {
    match path.split_first() {
        None => ParamValue::Text(value),
        Some((segment, rest)) if segment.is_empty() => {
            let mut items = match existing {
                Some(ParamValue::List(items)) => items,
                _ => Vec::new(),
            };
            items.push(assign(None, rest, value));
            ParamValue::List(items)
        }
        Some((segment, rest)) => {
            let mut map = match existing {
                Some(ParamValue::Map(map)) => map,
                _ => BTreeMap::new(),
            };
            let child = map.remove(segment);
            map.insert(segment.clone(), assign(child, rest, value));
            ParamValue::Map(map)
        }
    }
}

fn parse_request_line(line: &str) -> Result<(String, String), HttpError> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| HttpError::BadRequest("missing method".to_string()))?;
    let target = parts
        .next()
        .ok_or_else(|| HttpError::BadRequest("missing target".to_string()))?;
    Ok((method.to_ascii_uppercase(), target.to_string()))
}

fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

fn parse_cookies(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_END.len()).position(|w| w == HEAD_END)
}

fn declared_length(head: &str) -> usize {
    head.split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoredirect_core::REDIRECTION_INFORMATION_KEY;

    fn post(body: &str) -> Vec<u8> {
        format!(
            "POST /comments/create?page=2 HTTP/1.1\r\nHost: localhost\r\nReferer: /books/show/1\r\nCookie: a=1; _flash=xyz\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
        .into_bytes()
    }

    #[test]
    fn query_and_body_are_merged() {
        let request = Request::parse(&post("summary=hi+there&tags[]=a&tags[]=b")).unwrap();
        assert_eq!(request.method(), "POST");
        assert_eq!(request.path(), "/comments/create");
        assert_eq!(request.param("page"), Some("2"));
        assert_eq!(request.param("summary"), Some("hi there"));
        assert_eq!(
            request.parameters().get("tags"),
            Some(&ParamValue::List(vec![
                ParamValue::text("a"),
                ParamValue::text("b")
            ]))
        );
        assert_eq!(request.header("REFERER"), Some("/books/show/1"));
        assert_eq!(request.cookie("_flash"), Some("xyz"));
    }

    #[test]
    fn bracketed_names_nest() {
        let params = params_from_pairs(vec![
            ("comment[body]".to_string(), "nice".to_string()),
            ("comment[meta][lang]".to_string(), "en".to_string()),
            ("odd[".to_string(), "kept".to_string()),
        ]);
        let Some(ParamValue::Map(comment)) = params.get("comment") else {
            panic!("comment should be a map");
        };
        assert_eq!(comment.get("body"), Some(&ParamValue::text("nice")));
        assert!(matches!(comment.get("meta"), Some(ParamValue::Map(_))));
        assert_eq!(params.get("odd["), Some(&ParamValue::text("kept")));
    }

    #[test]
    fn method_override_applies_to_post_only() {
        let request = Request::parse(&post("_method=delete&id=4")).unwrap();
        assert_eq!(request.method(), "DELETE");
        assert!(!request.parameters().contains_key("_method"));

        let request = Request::parse(b"GET /x?_method=delete HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.method(), "GET");

        assert!(matches!(
            Request::parse(&post("_method=patch")),
            Err(HttpError::BadRequest(_))
        ));
    }

    #[test]
    fn reserved_parameter_is_a_token() {
        let request = Request::parse(&post("_redirection_information=abc-_")).unwrap();
        assert_eq!(request.parameters().nested_token(), Some("abc-_"));
        assert!(matches!(
            request.parameters().get(REDIRECTION_INFORMATION_KEY),
            Some(ParamValue::Token(_))
        ));
    }

    #[test]
    fn malformed_requests_are_rejected() {
        for raw in [
            &b"GET / HTTP/1.1\r\n"[..],
            &b"\r\n\r\n"[..],
            &b"GET / HTTP/1.1\r\nno colon\r\n\r\n"[..],
            &b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort"[..],
        ] {
            assert!(Request::parse(raw).is_err(), "{:?}", String::from_utf8_lossy(raw));
        }
    }

    #[test]
    fn read_from_stops_after_the_declared_body() {
        let mut raw = post("summary=hi");
        raw.extend_from_slice(b"trailing garbage");
        let request = Request::read_from(&mut raw.as_slice()).unwrap();
        assert_eq!(request.param("summary"), Some("hi"));
    }

    #[test]
    fn route_merges_captured_parameters() {
        let request = Request::parse(b"GET /books/show/1 HTTP/1.1\r\n\r\n")
            .unwrap()
            .with_route("books", "show", &Parameters::new().with("id", "1"));
        assert_eq!(request.operation_id(), "books");
        assert_eq!(request.action_id(), "show");
        assert_eq!(request.param("id"), Some("1"));
    }
}
