//! Description of the self-submitting form used for non-GET redirections.
//!
//! Browsers can only be redirected with GET, so replaying a POST/PUT/DELETE
//! means rendering a page whose form posts itself. This module only
//! describes that page; a renderer collaborator turns it into markup.

use crate::descriptor::{OperationTarget, RedirectMethod};
use crate::error::Result;
use crate::interfaces::RouteResolver;
use crate::params::Parameters;

/// Element id of the auto-submitting form.
pub const FORM_ID: &str = "_auto_redirection_form";

/// Element id of the "still here" message.
pub const MESSAGE_ID: &str = "message";

/// Delay before the fallback message is revealed.
pub const FALLBACK_DELAY_MS: u32 = 1000;

/// Field used to tunnel PUT/DELETE through an HTML form.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPage {
    /// Path the form submits to.
    pub action: String,
    pub method: RedirectMethod,
    /// Parameters replayed as form fields, reserved key excluded.
    pub parameters: Parameters,
    /// Nested descriptor token, carried in its own hidden field.
    pub nested_token: Option<String>,
}

impl FormPage {
    pub fn for_operation(target: &OperationTarget, routes: &dyn RouteResolver) -> Result<Self> {
        let (parameters, nested_token) = target.parameters.split_nested_token();
        let action = routes.path_for(&target.operation_id, &target.action_id, &parameters)?;
        Ok(Self {
            action,
            method: target.method,
            parameters,
            nested_token,
        })
    }

    /// Method attribute the HTML form must carry.
    pub fn form_method(&self) -> &'static str {
        if self.method.is_get() { "get" } else { "post" }
    }

    /// Value for the method override field, when one is needed.
    pub fn method_override(&self) -> Option<&'static str> {
        match self.method {
            RedirectMethod::Put => Some("put"),
            RedirectMethod::Delete => Some("delete"),
            RedirectMethod::Get | RedirectMethod::Post => None,
        }
    }

    /// Flattened `name=value` pairs for the visible parameter fields.
    pub fn fields(&self) -> Vec<(String, String)> {
        self.parameters.flatten()
    }
}
