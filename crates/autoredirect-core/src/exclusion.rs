//! Destinations that must never be redirected back to.
//!
//! Typical use is keeping a login form from redirecting to itself. Rules are
//! parsed once at configuration time; an unknown rule shape is a
//! configuration error, not a per-request failure.

use crate::error::{RedirectError, Result};
use crate::interfaces::RouteResolver;
use crate::params::{ParamValue, Parameters};
use regex::Regex;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub enum ExclusionRule {
    /// Matches when any member matches.
    Any(Vec<ExclusionRule>),
    /// Exact path equality.
    Literal(String),
    /// Regular expression search over the path.
    Pattern(Regex),
    /// Path produced by the route resolver for these criteria.
    Route {
        operation_id: String,
        action_id: String,
        parameters: Parameters,
    },
}

impl ExclusionRule {
    pub fn literal(path: impl Into<String>) -> Self {
        Self::Literal(path.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| RedirectError::MalformedExclusionRule(format!("bad pattern: {e}")))
    }

    pub fn route(operation_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self::Route {
            operation_id: operation_id.into(),
            action_id: action_id.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn any(rules: impl IntoIterator<Item = ExclusionRule>) -> Self {
        Self::Any(rules.into_iter().collect())
    }

    /// Parse a rule from its configuration form:
    ///
    /// ```toml
    /// exclusions = [
    ///     "/login/login_form",
    ///     { pattern = "^/admin/" },
    ///     { operation = "login", action = "process_login" },
    /// ]
    /// ```
    pub fn from_toml(value: &toml::Value) -> Result<Self> {
        match value {
            toml::Value::String(path) => Ok(Self::literal(path.clone())),
            toml::Value::Array(items) => items
                .iter()
                .map(Self::from_toml)
                .collect::<Result<Vec<_>>>()
                .map(Self::Any),
            toml::Value::Table(table) => {
                if let Some(pattern) = table.get("pattern") {
                    if table.len() != 1 {
                        return Err(malformed("pattern rules take no other keys"));
                    }
                    let pattern = pattern
                        .as_str()
                        .ok_or_else(|| malformed("pattern must be a string"))?;
                    return Self::pattern(pattern);
                }
                route_from_table(table)
            }
            other => Err(malformed(&format!(
                "unsupported rule of type {}",
                other.type_str()
            ))),
        }
    }

    /// Whether `path` is excluded by this rule.
    pub fn matches(&self, path: &str, routes: &dyn RouteResolver) -> Result<bool> {
        match self {
            Self::Any(rules) => {
                for rule in rules {
                    if rule.matches(path, routes)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Literal(literal) => Ok(literal == path),
            Self::Pattern(re) => Ok(re.is_match(path)),
            Self::Route {
                operation_id,
                action_id,
                parameters,
            } => Ok(routes.path_for(operation_id, action_id, parameters)? == path),
        }
    }
}

fn malformed(message: &str) -> RedirectError {
    RedirectError::MalformedExclusionRule(message.to_string())
}

fn route_from_table(table: &toml::map::Map<String, toml::Value>) -> Result<ExclusionRule> {
    for key in table.keys() {
        if !matches!(key.as_str(), "operation" | "action" | "parameters") {
            return Err(malformed(&format!("unknown rule key `{key}`")));
        }
    }
    let operation_id = table
        .get("operation")
        .and_then(toml::Value::as_str)
        .ok_or_else(|| malformed("route rules need a string `operation`"))?;
    let action_id = table
        .get("action")
        .and_then(toml::Value::as_str)
        .unwrap_or("index");
    let parameters = match table.get("parameters") {
        None => Parameters::new(),
        Some(toml::Value::Table(params)) => params
            .iter()
            .map(|(k, v)| param_from_toml(v).map(|v| (k.clone(), v)))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .collect(),
        Some(_) => return Err(malformed("`parameters` must be a table")),
    };
    Ok(ExclusionRule::Route {
        operation_id: operation_id.to_string(),
        action_id: action_id.to_string(),
        parameters,
    })
}

fn param_from_toml(value: &toml::Value) -> Result<ParamValue> {
    Ok(match value {
        toml::Value::String(s) => ParamValue::Text(s.clone()),
        toml::Value::Integer(i) => ParamValue::Text(i.to_string()),
        toml::Value::Boolean(b) => ParamValue::Text(b.to_string()),
        toml::Value::Array(items) => ParamValue::List(
            items
                .iter()
                .map(param_from_toml)
                .collect::<Result<Vec<_>>>()?,
        ),
        toml::Value::Table(table) => ParamValue::Map(
            table
                .iter()
                .map(|(k, v)| param_from_toml(v).map(|v| (k.clone(), v)))
                .collect::<Result<BTreeMap<_, _>>>()?,
        ),
        other => {
            return Err(malformed(&format!(
                "unsupported parameter of type {}",
                other.type_str()
            )));
        }
    })
}
