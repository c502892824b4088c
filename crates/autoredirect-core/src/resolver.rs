//! Per-request redirection resolution.
//!
//! A [`Resolver`] is created for one request. It looks for redirection
//! information in three places, in order, and stops at the first hit:
//!
//! 1. the `_redirection_information` request parameter,
//! 2. the `_redirection_information` slot of the ephemeral store,
//! 3. the `Referer` header, taken as a plain URL.
//!
//! The first two are sealed tokens; tampering with them aborts resolution
//! with [`RedirectError::TamperDetected`]. The referrer is never decrypted.
//! Whatever was found is memoized for the lifetime of the resolver.

use crate::config::RedirectConfig;
use crate::descriptor::{RedirectDescriptor, RedirectMethod};
use crate::error::{RedirectError, Result};
use crate::exclusion::ExclusionRule;
use crate::form::FormPage;
use crate::interfaces::{Delivery, EphemeralStore, REFERER_HEADER, RequestContext, RouteResolver};
use crate::params::{ParamValue, Parameters, REDIRECTION_INFORMATION_KEY};
use std::fmt;
use tracing::{debug, warn};

/// Where the held descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationSource {
    Parameter,
    Store,
    Referer,
}

impl fmt::Display for InformationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parameter => "request parameter",
            Self::Store => "ephemeral store",
            Self::Referer => "Referer header",
        })
    }
}

/// What resolution decided, before anything is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Redirect(String),
    Form(FormPage),
}

/// Where [`Resolver::save_current_request`] should send the visitor back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveLocation {
    /// The request being handled, with its parameters and method.
    Here,
    /// A plain URL.
    Url(String),
}

#[derive(Debug, Clone)]
struct Held {
    source: InformationSource,
    descriptor: RedirectDescriptor,
}

pub struct Resolver<'a> {
    config: &'a RedirectConfig,
    request: &'a dyn RequestContext,
    routes: &'a dyn RouteResolver,
    store: Option<&'a mut dyn EphemeralStore>,
    held: Option<Option<Held>>,
    current_token: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        config: &'a RedirectConfig,
        request: &'a dyn RequestContext,
        routes: &'a dyn RouteResolver,
    ) -> Self {
        Self {
            config,
            request,
            routes,
            store: None,
            held: None,
            current_token: None,
        }
    }

    /// Attach the ephemeral store. Without one, only the request parameter
    /// and the referrer are consulted and nothing can be saved.
    pub fn with_store(mut self, store: &'a mut dyn EphemeralStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &'a RedirectConfig {
        self.config
    }

    pub fn routes(&self) -> &'a dyn RouteResolver {
        self.routes
    }

    /// Parameters of the request being handled.
    pub fn request_parameters(&self) -> &'a Parameters {
        self.request.parameters()
    }

    /// The redirection information passed to this request, if any.
    pub fn redirection_information(&mut self) -> Result<Option<&RedirectDescriptor>> {
        self.ensure_held()?;
        Ok(self.held_ref().map(|h| &h.descriptor))
    }

    /// Which source the held descriptor was taken from.
    pub fn information_source(&mut self) -> Result<Option<InformationSource>> {
        self.ensure_held()?;
        Ok(self.held_ref().map(|h| h.source))
    }

    /// Decide what to do without delivering anything. `None` means no
    /// redirection information was available.
    pub fn plan(&mut self) -> Result<Option<Resolution>> {
        self.ensure_held()?;
        let Some(held) = self.held_ref() else {
            return Ok(None);
        };
        let resolution = match &held.descriptor {
            RedirectDescriptor::Url(target) => {
                debug!(url = %target.url, source = %held.source, "auto-redirection: redirect to URL");
                Resolution::Redirect(target.url.clone())
            }
            RedirectDescriptor::Operation(op) if op.method.is_get() => {
                debug!(
                    operation = %op.operation_id,
                    action = %op.action_id,
                    parameters = ?op.parameters,
                    "auto-redirection: redirecting (GET)"
                );
                Resolution::Redirect(self.routes.location_for(
                    &op.operation_id,
                    &op.action_id,
                    &op.parameters,
                )?)
            }
            RedirectDescriptor::Operation(op) => {
                debug!(
                    operation = %op.operation_id,
                    action = %op.action_id,
                    method = %op.method,
                    parameters = ?op.parameters,
                    "auto-redirection: rendering self-submitting form"
                );
                Resolution::Form(FormPage::for_operation(op, self.routes)?)
            }
        };
        Ok(Some(resolution))
    }

    /// Redirect or render according to the held descriptor. Returns `false`
    /// when there was nothing to act on; the caller picks a fallback.
    pub fn attempt_resolve(&mut self, delivery: &mut dyn Delivery) -> Result<bool> {
        match self.plan()? {
            None => Ok(false),
            Some(Resolution::Redirect(location)) => {
                delivery.redirect(&location);
                Ok(true)
            }
            Some(Resolution::Form(page)) => {
                delivery.render_form(&page);
                Ok(true)
            }
        }
    }

    /// Resolve, or redirect to `default_target` (the configured landing
    /// location when `None`) if nothing is held or the held destination
    /// is excluded.
    pub fn resolve_with_fallback(
        &mut self,
        default_target: Option<&str>,
        exclusions: Option<&ExclusionRule>,
        delivery: &mut dyn Delivery,
    ) -> Result<()> {
        self.ensure_held()?;
        let mut use_default = false;
        if let (Some(rule), Some(held)) = (exclusions, self.held_ref()) {
            match held.descriptor.path(self.routes) {
                Ok(path) => {
                    if rule.matches(&path, self.routes)? {
                        debug!(path = %path, "auto-redirection: destination excluded, using default");
                        use_default = true;
                    }
                }
                // The referrer is untrusted input; an unusable one is ignored.
                Err(err) if held.source == InformationSource::Referer => {
                    debug!(error = %err, "auto-redirection: unusable referrer, using default");
                    use_default = true;
                }
                Err(err) => return Err(err),
            }
        }
        if !use_default {
            use_default = !self.attempt_resolve(delivery)?;
        }
        if use_default {
            let target = default_target.unwrap_or(self.config.default_target());
            debug!(target = %target, "auto-redirection: redirecting to default target");
            delivery.redirect(target);
        }
        Ok(())
    }

    /// [`Resolver::resolve_with_fallback`] with the configured default and
    /// exclusions.
    pub fn auto_redirect(&mut self, delivery: &mut dyn Delivery) -> Result<()> {
        let config = self.config;
        self.resolve_with_fallback(None, config.exclusions(), delivery)
    }

    /// Store where the visitor should come back to in the ephemeral store,
    /// for the next request to pick up.
    pub fn save_current_request(&mut self, location: SaveLocation) -> Result<()> {
        let descriptor = match location {
            SaveLocation::Here => {
                self.ensure_held()?;
                let parameters = match self.held_ref() {
                    Some(held) => self
                        .request
                        .parameters()
                        .with_nested_token(held.descriptor.save(self.config.envelope())?),
                    None => self.request.parameters().clone(),
                };
                let descriptor = self.request_descriptor(parameters)?;
                debug!(
                    operation = %self.request.operation_id(),
                    action = %self.request.action_id(),
                    method = %descriptor.method(),
                    "auto-redirection: saving redirection information"
                );
                descriptor
            }
            SaveLocation::Url(url) => {
                debug!(url = %url, "auto-redirection: saving redirection information");
                RedirectDescriptor::url(url)
            }
        };
        let sealed = descriptor.save_sealed(self.config.envelope())?;
        let store = self.store.as_deref_mut().ok_or_else(|| {
            RedirectError::Config(
                "no ephemeral store available; pass current_request_token() instead".to_string(),
            )
        })?;
        store.set(REDIRECTION_INFORMATION_KEY, sealed);
        Ok(())
    }

    /// Token describing this request, for embedding in a link when there
    /// is no ephemeral store. Held redirection information is not folded in.
    pub fn current_request_token(&mut self) -> Result<String> {
        if let Some(token) = &self.current_token {
            return Ok(token.clone());
        }
        let descriptor = self.request_descriptor(self.request.parameters().clone())?;
        let token = descriptor.save(self.config.envelope())?;
        self.current_token = Some(token.clone());
        Ok(token)
    }

    /// Descriptor for this request with the given parameters.
    pub fn request_descriptor(&self, parameters: Parameters) -> Result<RedirectDescriptor> {
        let method: RedirectMethod = self.request.method().parse()?;
        Ok(RedirectDescriptor::operation(
            self.request.operation_id(),
            self.request.action_id(),
            parameters,
            method,
        ))
    }

    fn held_ref(&self) -> Option<&Held> {
        self.held.as_ref().and_then(Option::as_ref)
    }

    fn ensure_held(&mut self) -> Result<()> {
        if self.held.is_none() {
            let found = self.retrieve()?;
            self.held = Some(found);
        }
        Ok(())
    }

    fn retrieve(&self) -> Result<Option<Held>> {
        let envelope = self.config.envelope();

        if let Some(value) = self.request.parameters().get(REDIRECTION_INFORMATION_KEY) {
            let token = match value {
                ParamValue::Token(t) | ParamValue::Text(t) => t.as_str(),
                ParamValue::List(_) | ParamValue::Map(_) => {
                    return Err(RedirectError::InvalidToken(format!(
                        "{REDIRECTION_INFORMATION_KEY} must be a single value"
                    )));
                }
            };
            let descriptor = RedirectDescriptor::load(Some(token), envelope)
                .inspect_err(|e| log_rejection(InformationSource::Parameter, e))?;
            return Ok(Some(Held {
                source: InformationSource::Parameter,
                descriptor,
            }));
        }

        if let Some(sealed) = self
            .store
            .as_deref()
            .and_then(|store| store.get(REDIRECTION_INFORMATION_KEY))
        {
            let descriptor = RedirectDescriptor::load_sealed(Some(sealed.as_slice()), envelope)
                .inspect_err(|e| log_rejection(InformationSource::Store, e))?;
            return Ok(Some(Held {
                source: InformationSource::Store,
                descriptor,
            }));
        }

        if let Some(referer) = self
            .request
            .header(REFERER_HEADER)
            .filter(|r| !r.trim().is_empty())
        {
            return Ok(Some(Held {
                source: InformationSource::Referer,
                descriptor: RedirectDescriptor::url(referer),
            }));
        }

        Ok(None)
    }
}

fn log_rejection(source: InformationSource, err: &RedirectError) {
    if err.is_tamper() {
        warn!(source = %source, "auto-redirection: rejecting tampered redirection information");
    } else {
        warn!(source = %source, error = %err, "auto-redirection: rejecting redirection information");
    }
}
