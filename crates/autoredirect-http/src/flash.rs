//! One-shot store backed by a cookie.
//!
//! Slots set while handling a request are written to the `_flash` cookie
//! and readable by the next request only: any request that arrives with a
//! flash cookie clears it unless it sets new slots. The cookie value is
//! base64url over a JSON object whose values are base64url too.

use crate::request::Request;
use crate::response::Response;
use autoredirect_core::EphemeralStore;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

pub const FLASH_COOKIE: &str = "_flash";

#[derive(Debug, Default, Clone)]
pub struct CookieFlash {
    incoming: BTreeMap<String, Vec<u8>>,
    outgoing: BTreeMap<String, Vec<u8>>,
    received_cookie: bool,
}

impl CookieFlash {
    pub fn from_request(request: &Request) -> Self {
        let Some(raw) = request.cookie(FLASH_COOKIE).filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };
        let incoming = decode_cookie(raw).unwrap_or_else(|| {
            warn!("discarding unreadable flash cookie");
            BTreeMap::new()
        });
        Self {
            incoming,
            outgoing: BTreeMap::new(),
            received_cookie: true,
        }
    }

    /// `Set-Cookie` value carrying this request's slots to the next one,
    /// or clearing the cookie that was received.
    pub fn set_cookie(&self) -> Option<String> {
        if !self.outgoing.is_empty() {
            return Some(format!(
                "{FLASH_COOKIE}={}; Path=/; HttpOnly",
                encode_cookie(&self.outgoing)
            ));
        }
        self.received_cookie
            .then(|| format!("{FLASH_COOKIE}=; Path=/; Max-Age=0"))
    }

    /// Attach [`CookieFlash::set_cookie`] to `response`.
    pub fn apply(&self, response: Response) -> Response {
        match self.set_cookie() {
            Some(cookie) => response.with_header("Set-Cookie", cookie),
            None => response,
        }
    }
}

impl EphemeralStore for CookieFlash {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.incoming.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Vec<u8>) {
        self.outgoing.insert(key.to_string(), value);
    }
}

fn encode_cookie(slots: &BTreeMap<String, Vec<u8>>) -> String {
    let encoded: Map<String, Value> = slots
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(URL_SAFE_NO_PAD.encode(v))))
        .collect();
    URL_SAFE_NO_PAD.encode(Value::Object(encoded).to_string())
}

fn decode_cookie(raw: &str) -> Option<BTreeMap<String, Vec<u8>>> {
    let json = URL_SAFE_NO_PAD.decode(raw).ok()?;
    let encoded: BTreeMap<String, String> = serde_json::from_slice(&json).ok()?;
    encoded
        .into_iter()
        .map(|(k, v)| URL_SAFE_NO_PAD.decode(v).ok().map(|v| (k, v)))
        .collect()
}
