//! # autoredirect core
//!
//! Deferred redirections without server-side sessions: "where should this
//! visitor end up" travels between requests as an encrypted, tamper-evident
//! token in a request parameter, a one-shot store slot, or (as a plain URL)
//! in the `Referer` header.
//!
//! ## Architecture
//!
//! ```text
//! Resolver            ← per-request: find, decide, deliver
//!     │          ╲
//! Descriptor      ExclusionRule   ← "return to URL" | "replay operation"
//!     │
//! Envelope            ← SHA-512 signature + AES-256-CBC + base64url
//! ```
//!
//! The host framework plugs in through the traits in [`interfaces`].

pub mod config;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod exclusion;
pub mod form;
pub mod hidden_field;
pub mod interfaces;
pub mod markup;
pub mod params;
pub mod resolver;

pub use config::{RedirectConfig, RedirectConfigBuilder};
pub use descriptor::{OperationTarget, RedirectDescriptor, RedirectMethod, UrlTarget};
pub use envelope::{Envelope, EnvelopeKey, IvMode};
pub use error::RedirectError;
pub use exclusion::ExclusionRule;
pub use form::FormPage;
pub use hidden_field::{auto_redirect_to_here, hidden_field, pass_redirection_information};
pub use interfaces::{Delivery, EphemeralStore, NoStore, RequestContext, RouteResolver};
pub use params::{ParamValue, Parameters, REDIRECTION_INFORMATION_KEY};
pub use resolver::{InformationSource, Resolution, Resolver, SaveLocation};
