//! Collaborator contracts the resolver depends on.
//!
//! The host web framework supplies these: access to the current request,
//! a one-shot store slot, route resolution, and a way to deliver the
//! chosen response. The core never touches sockets or markup.

use crate::error::Result;
use crate::form::FormPage;
use crate::params::Parameters;
use url::form_urlencoded;

/// Name of the header consulted as the last-resort source.
pub const REFERER_HEADER: &str = "Referer";

/// Read access to the request being handled.
pub trait RequestContext {
    /// Operation (controller) handling this request.
    fn operation_id(&self) -> &str;
    /// Action within the operation.
    fn action_id(&self) -> &str;
    /// HTTP method as received, e.g. `"POST"`.
    fn method(&self) -> &str;
    /// Merged query and body parameters.
    fn parameters(&self) -> &Parameters;
    /// Header lookup; names compare case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;
}

/// A storage slot that is delivered to the next request only.
pub trait EphemeralStore {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&mut self, key: &str, value: Vec<u8>);
}

/// Turns operation names into paths.
pub trait RouteResolver {
    /// Path for an operation, query construction suppressed.
    fn path_for(&self, operation_id: &str, action_id: &str, parameters: &Parameters)
    -> Result<String>;

    /// Location for a GET redirect: the path plus every parameter as query.
    fn location_for(
        &self,
        operation_id: &str,
        action_id: &str,
        parameters: &Parameters,
    ) -> Result<String> {
        let path = self.path_for(operation_id, action_id, parameters)?;
        let pairs = parameters.flatten();
        if pairs.is_empty() {
            return Ok(path);
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        Ok(format!("{path}?{query}"))
    }
}

/// Sink for the resolver's decision.
pub trait Delivery {
    /// Respond with a redirect to `location`.
    fn redirect(&mut self, location: &str);
    /// Respond with a self-submitting form page.
    fn render_form(&mut self, page: &FormPage);
}

/// Store that never holds anything, for hosts without sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

impl EphemeralStore for NoStore {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&mut self, _key: &str, _value: Vec<u8>) {}
}
