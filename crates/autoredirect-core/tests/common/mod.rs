#![allow(dead_code)]

use autoredirect_core::error::Result;
use autoredirect_core::{
    Delivery, EphemeralStore, FormPage, Parameters, RedirectConfig, RequestContext, RouteResolver,
};
use std::cell::Cell;
use std::collections::BTreeMap;

pub fn config() -> RedirectConfig {
    RedirectConfig::builder()
        .encryption_key("integration secret")
        .debug(false)
        .build()
}

pub struct FakeRequest {
    pub operation: String,
    pub action: String,
    pub method: String,
    pub params: Parameters,
    pub headers: BTreeMap<String, String>,
}

impl FakeRequest {
    pub fn new(operation: &str, action: &str, method: &str) -> Self {
        Self {
            operation: operation.to_string(),
            action: action.to_string(),
            method: method.to_string(),
            params: Parameters::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn referer(mut self, url: &str) -> Self {
        self.headers.insert("referer".to_string(), url.to_string());
        self
    }
}

impl RequestContext for FakeRequest {
    fn operation_id(&self) -> &str {
        &self.operation
    }

    fn action_id(&self) -> &str {
        &self.action
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Default)]
pub struct MemoryFlash {
    pub slots: BTreeMap<String, Vec<u8>>,
    pub reads: Cell<usize>,
}

impl EphemeralStore for MemoryFlash {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.reads.set(self.reads.get() + 1);
        self.slots.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Vec<u8>) {
        self.slots.insert(key.to_string(), value);
    }
}

/// `/{operation}/{action}`, with an `id` parameter appended as a segment.
pub struct SlashRoutes;

impl RouteResolver for SlashRoutes {
    fn path_for(&self, operation_id: &str, action_id: &str, parameters: &Parameters) -> Result<String> {
        match parameters.get("id").and_then(|v| v.as_str()) {
            Some(id) => Ok(format!("/{operation_id}/{action_id}/{id}")),
            None => Ok(format!("/{operation_id}/{action_id}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Redirect(String),
    Form(FormPage),
}

#[derive(Default)]
pub struct Recorder {
    pub delivered: Vec<Delivered>,
}

impl Delivery for Recorder {
    fn redirect(&mut self, location: &str) {
        self.delivered.push(Delivered::Redirect(location.to_string()));
    }

    fn render_form(&mut self, page: &FormPage) {
        self.delivered.push(Delivered::Form(page.clone()));
    }
}
