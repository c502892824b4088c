//! View helpers that pass redirection information on through a form.
//!
//! A login page that should remember where the visitor came from embeds
//! [`pass_redirection_information`] inside its form; the next request then
//! receives the token as the `_redirection_information` parameter instead
//! of relying on the (by then useless) referrer.

use crate::config::RedirectConfig;
use crate::descriptor::RedirectDescriptor;
use crate::error::Result;
use crate::markup;
use crate::params::{Parameters, REDIRECTION_INFORMATION_KEY};
use crate::resolver::Resolver;
use tracing::info;

/// Hidden field carrying the redirection information this request
/// received, or `None` when there is none.
pub fn pass_redirection_information(resolver: &mut Resolver<'_>) -> Result<Option<String>> {
    let config = resolver.config();
    match resolver.redirection_information()? {
        Some(descriptor) => hidden_field(descriptor, config).map(Some),
        None => Ok(None),
    }
}

/// Hidden field that sends the visitor back to the current request, with
/// `extra` merged over its parameters.
pub fn auto_redirect_to_here(resolver: &Resolver<'_>, extra: &Parameters) -> Result<String> {
    let parameters = resolver.request_parameters().merged(extra);
    let descriptor = resolver.request_descriptor(parameters)?;
    hidden_field(&descriptor, resolver.config())
}

/// Hidden `_redirection_information` field for `descriptor`.
pub fn hidden_field(descriptor: &RedirectDescriptor, config: &RedirectConfig) -> Result<String> {
    info!(descriptor = %descriptor, "auto-redirection: passing redirection information");
    let token = descriptor.save(config.envelope())?;
    let mut html = markup::hidden_input(REDIRECTION_INFORMATION_KEY, &token, config.xhtml());
    if config.debug() {
        html.push('\n');
        html.push_str(&markup::comment(&format!("{descriptor:?}")));
    }
    Ok(html)
}
