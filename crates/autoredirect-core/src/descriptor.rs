//! Return-to descriptors and their token encoding.
//!
//! A descriptor says where a visitor should end up: either a plain URL, or
//! an operation (with action, parameters and HTTP method) that must be
//! replayed. Descriptors are serialized as a small JSON record and then
//! sealed with an [`Envelope`]:
//!
//! ```text
//! { "method": "GET", "url": "/books/show/1" }
//! { "method": "POST", "operationId": "comments", "actionId": "create",
//!   "parameters": { "summary": "hi" } }
//! ```

use crate::envelope::Envelope;
use crate::error::{RedirectError, Result};
use crate::interfaces::RouteResolver;
use crate::params::Parameters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// HTTP verb a descriptor is replayed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RedirectMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl RedirectMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    pub fn is_get(self) -> bool {
        self == Self::Get
    }
}

impl fmt::Display for RedirectMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedirectMethod {
    type Err = RedirectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(RedirectError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for RedirectMethod {
    type Error = RedirectError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RedirectMethod> for String {
    fn from(method: RedirectMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Return to a plain URL. Always replayed with GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTarget {
    pub url: String,
}

/// Return to a named operation, replaying its parameters and method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTarget {
    pub operation_id: String,
    pub action_id: String,
    pub parameters: Parameters,
    pub method: RedirectMethod,
}

impl OperationTarget {
    pub fn new(
        operation_id: impl Into<String>,
        action_id: impl Into<String>,
        parameters: Parameters,
        method: RedirectMethod,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            action_id: action_id.into(),
            parameters,
            method,
        }
    }
}

/// Where a visitor should be sent back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDescriptor {
    Url(UrlTarget),
    Operation(OperationTarget),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorRecord {
    #[serde(default)]
    method: RedirectMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<Parameters>,
}

impl RedirectDescriptor {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(UrlTarget { url: url.into() })
    }

    pub fn operation(
        operation_id: impl Into<String>,
        action_id: impl Into<String>,
        parameters: Parameters,
        method: RedirectMethod,
    ) -> Self {
        Self::Operation(OperationTarget::new(
            operation_id,
            action_id,
            parameters,
            method,
        ))
    }

    pub fn method(&self) -> RedirectMethod {
        match self {
            Self::Url(_) => RedirectMethod::Get,
            Self::Operation(op) => op.method,
        }
    }

    /// Path this descriptor leads to, without any query string.
    pub fn path(&self, routes: &dyn RouteResolver) -> Result<String> {
        match self {
            Self::Url(target) => url_path(&target.url),
            Self::Operation(op) => {
                routes.path_for(&op.operation_id, &op.action_id, &op.parameters)
            }
        }
    }

    /// Serialize to the unencrypted JSON record.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let record = match self {
            Self::Url(target) => DescriptorRecord {
                method: RedirectMethod::Get,
                url: Some(target.url.clone()),
                operation_id: None,
                action_id: None,
                parameters: None,
            },
            Self::Operation(op) => DescriptorRecord {
                method: op.method,
                url: None,
                operation_id: Some(op.operation_id.clone()),
                action_id: Some(op.action_id.clone()),
                parameters: Some(op.parameters.clone()),
            },
        };
        serde_json::to_vec(&record).map_err(|e| RedirectError::Serialization(e.to_string()))
    }

    /// Parse an unencrypted JSON record.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let record: DescriptorRecord = serde_json::from_slice(data)
            .map_err(|e| RedirectError::InvalidToken(format!("not a descriptor record: {e}")))?;
        if let Some(url) = record.url {
            return Ok(Self::url(url));
        }
        let operation_id = record
            .operation_id
            .ok_or_else(|| RedirectError::InvalidToken("record lacks operationId".to_string()))?;
        let action_id = record
            .action_id
            .ok_or_else(|| RedirectError::InvalidToken("record lacks actionId".to_string()))?;
        Ok(Self::operation(
            operation_id,
            action_id,
            record.parameters.unwrap_or_default(),
            record.method,
        ))
    }

    /// Encrypted, text-safe token for query strings and form fields.
    pub fn save(&self, envelope: &Envelope) -> Result<String> {
        Ok(envelope.seal_text(&self.to_json()?))
    }

    /// Encrypted binary token for stores that carry arbitrary bytes.
    pub fn save_sealed(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        Ok(envelope.seal(&self.to_json()?))
    }

    /// Decode a token produced by [`RedirectDescriptor::save`].
    pub fn load(token: Option<&str>, envelope: &Envelope) -> Result<Self> {
        let data = envelope
            .open_text_opt(token)?
            .ok_or_else(|| RedirectError::InvalidToken("no token given".to_string()))?;
        Self::from_json(&data)
    }

    /// Decode a token produced by [`RedirectDescriptor::save_sealed`].
    pub fn load_sealed(sealed: Option<&[u8]>, envelope: &Envelope) -> Result<Self> {
        let sealed =
            sealed.ok_or_else(|| RedirectError::InvalidToken("no token given".to_string()))?;
        Self::from_json(&envelope.open(sealed)?)
    }
}

impl fmt::Display for RedirectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(target) => write!(f, "{} (GET)", target.url),
            Self::Operation(op) => write!(
                f,
                "{}/{} ({})",
                op.operation_id, op.action_id, op.method
            ),
        }
    }
}

/// Path component of an absolute or site-relative URL.
fn url_path(raw: &str) -> Result<String> {
    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost/")
            .and_then(|base| base.join(raw))
            .map_err(|e| RedirectError::InvalidToken(format!("bad url {raw}: {e}")))?,
        Err(e) => return Err(RedirectError::InvalidToken(format!("bad url {raw}: {e}"))),
    };
    Ok(parsed.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EnvelopeKey, IvMode};
    use crate::params::{ParamValue, REDIRECTION_INFORMATION_KEY};

    fn envelope() -> Envelope {
        Envelope::new(EnvelopeKey::derive("descriptor tests"), IvMode::Random)
    }

    struct SlashRoutes;

    impl RouteResolver for SlashRoutes {
        fn path_for(&self, operation_id: &str, action_id: &str, _: &Parameters) -> Result<String> {
            Ok(format!("/{operation_id}/{action_id}"))
        }
    }

    #[test]
    fn url_record_encoding_is_stable() {
        let json = RedirectDescriptor::url("/books/show/1").to_json().unwrap();
        insta::assert_snapshot!(
            String::from_utf8(json).unwrap(),
            @r#"{"method":"GET","url":"/books/show/1"}"#
        );
    }

    #[test]
    fn operation_record_encoding_is_stable() {
        let desc = RedirectDescriptor::operation(
            "comments",
            "create",
            Parameters::new().with("summary", "hi"),
            RedirectMethod::Post,
        );
        let json = desc.to_json().unwrap();
        insta::assert_snapshot!(
            String::from_utf8(json).unwrap(),
            @r#"{"method":"POST","operationId":"comments","actionId":"create","parameters":{"summary":"hi"}}"#
        );
    }

    #[test]
    fn sealed_round_trip_keeps_nested_token_opaque() {
        let env = envelope();
        let inner = RedirectDescriptor::url("/books/show/1").save(&env).unwrap();
        let outer = RedirectDescriptor::operation(
            "comments",
            "create",
            Parameters::new().with("summary", "hi").with_nested_token(inner.clone()),
            RedirectMethod::Post,
        );
        let bytes = outer.save_sealed(&env).unwrap();
        let loaded = RedirectDescriptor::load_sealed(Some(bytes.as_slice()), &env).unwrap();
        assert_eq!(loaded, outer);
        let RedirectDescriptor::Operation(op) = loaded else {
            panic!("expected operation target");
        };
        assert_eq!(op.parameters.nested_token(), Some(inner.as_str()));
        assert!(op.parameters.contains_key(REDIRECTION_INFORMATION_KEY));
    }

    #[test]
    fn tokens_under_ordinary_keys_round_trip_as_text() {
        let env = envelope();
        let desc = RedirectDescriptor::operation(
            "comments",
            "create",
            Parameters::new()
                .with("x", ParamValue::Token("tok".to_string()))
                .with(
                    "l",
                    ParamValue::List(vec![ParamValue::Token("t2".to_string())]),
                ),
            RedirectMethod::Post,
        );
        let loaded = RedirectDescriptor::load(Some(&desc.save(&env).unwrap()), &env).unwrap();
        assert_eq!(loaded, desc);
    }

    #[test]
    fn absent_token_is_invalid() {
        assert!(matches!(
            RedirectDescriptor::load(None, &envelope()),
            Err(RedirectError::InvalidToken(_))
        ));
        assert!(matches!(
            RedirectDescriptor::load_sealed(None, &envelope()),
            Err(RedirectError::InvalidToken(_))
        ));
    }

    #[test]
    fn sealed_garbage_json_is_invalid_not_tamper() {
        let env = envelope();
        let token = env.seal_text(b"[1,2,3]");
        assert!(matches!(
            RedirectDescriptor::load(Some(&token), &env),
            Err(RedirectError::InvalidToken(_))
        ));
    }

    #[test]
    fn record_without_method_defaults_to_get() {
        let desc =
            RedirectDescriptor::from_json(br#"{"operationId":"books","actionId":"index"}"#)
                .unwrap();
        assert_eq!(desc.method(), RedirectMethod::Get);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = RedirectDescriptor::from_json(
            br#"{"method":"PATCH","operationId":"books","actionId":"index"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RedirectError::InvalidToken(_)));
        assert!(matches!(
            "patch".parse::<RedirectMethod>(),
            Err(RedirectError::UnsupportedMethod(_))
        ));
        assert_eq!("delete".parse::<RedirectMethod>().unwrap(), RedirectMethod::Delete);
    }

    #[test]
    fn paths_strip_host_and_query() {
        let routes = SlashRoutes;
        assert_eq!(
            RedirectDescriptor::url("http://example.com/books/show/1?page=2")
                .path(&routes)
                .unwrap(),
            "/books/show/1"
        );
        assert_eq!(
            RedirectDescriptor::url("/login/login_form").path(&routes).unwrap(),
            "/login/login_form"
        );
        let op = RedirectDescriptor::operation(
            "comments",
            "create",
            Parameters::new().with("summary", "hi"),
            RedirectMethod::Post,
        );
        assert_eq!(op.path(&routes).unwrap(), "/comments/create");
    }
}
