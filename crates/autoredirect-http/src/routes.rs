//! Route table: operation/action pairs bound to path templates.
//!
//! Templates are literal segments plus `:name` captures, e.g.
//! `/books/show/:id`. The table works in both directions: it recognizes
//! incoming paths and builds paths for the resolver.

use crate::error::HttpError;
use crate::request::Request;
use autoredirect_core::error::{RedirectError, Result};
use autoredirect_core::{ParamValue, Parameters, RouteResolver};
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub operation_id: String,
    pub action_id: String,
    template: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

impl Route {
    fn captures(&self) -> impl Iterator<Item = &str> {
        self.template.iter().filter_map(|s| match s {
            Segment::Capture(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    fn recognize(&self, path: &str) -> Option<Parameters> {
        let segments: Vec<&str> = split_path(path).collect();
        if segments.len() != self.template.len() {
            return None;
        }
        let mut captured = Parameters::new();
        for (segment, part) in self.template.iter().zip(segments) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Capture(name) => captured.insert(name.clone(), part),
            }
        }
        Some(captured)
    }

    fn build(&self, parameters: &Parameters) -> Result<String> {
        let mut path = String::new();
        for segment in &self.template {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Capture(name) => {
                    let value = parameters
                        .get(name)
                        .and_then(ParamValue::as_str)
                        .ok_or_else(|| {
                            RedirectError::Route(format!(
                                "{}/{} needs a `{name}` parameter",
                                self.operation_id, self.action_id
                            ))
                        })?;
                    path.extend(form_urlencoded::byte_serialize(value.as_bytes()));
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        operation_id: impl Into<String>,
        action_id: impl Into<String>,
        template: &str,
    ) -> Self {
        let template = split_path(template)
            .map(|part| match part.strip_prefix(':') {
                Some(name) => Segment::Capture(name.to_string()),
                None => Segment::Literal(part.to_string()),
            })
            .collect();
        self.routes.push(Route {
            operation_id: operation_id.into(),
            action_id: action_id.into(),
            template,
        });
        self
    }

    /// First route matching `path`, with its captured parameters.
    pub fn recognize(&self, path: &str) -> Option<(&Route, Parameters)> {
        self.routes
            .iter()
            .find_map(|route| route.recognize(path).map(|captured| (route, captured)))
    }

    /// Recognize `request`'s path and attach the matched operation to it.
    pub fn route_request(&self, request: Request) -> std::result::Result<Request, HttpError> {
        let (route, captured) = self
            .recognize(request.path())
            .ok_or_else(|| HttpError::NotFound(format!("unknown route: {}", request.path())))?;
        let (operation_id, action_id) = (route.operation_id.clone(), route.action_id.clone());
        Ok(request.with_route(operation_id, action_id, &captured))
    }

    fn find(&self, operation_id: &str, action_id: &str) -> Result<&Route> {
        self.routes
            .iter()
            .find(|r| r.operation_id == operation_id && r.action_id == action_id)
            .ok_or_else(|| RedirectError::Route(format!("no route for {operation_id}/{action_id}")))
    }
}

impl RouteResolver for RouteTable {
    fn path_for(&self, operation_id: &str, action_id: &str, parameters: &Parameters) -> Result<String> {
        self.find(operation_id, action_id)?.build(parameters)
    }

    /// Parameters consumed by the path are left out of the query.
    fn location_for(
        &self,
        operation_id: &str,
        action_id: &str,
        parameters: &Parameters,
    ) -> Result<String> {
        let route = self.find(operation_id, action_id)?;
        let path = route.build(parameters)?;
        let mut rest = parameters.clone();
        for name in route.captures() {
            rest.remove(name);
        }
        let pairs = rest.flatten();
        if pairs.is_empty() {
            return Ok(path);
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        Ok(format!("{path}?{query}"))
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}
