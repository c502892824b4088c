//! Request parameters carried inside operation descriptors.
//!
//! Parameters form a closed value type: text, sequences, nested maps, and
//! the opaque token that a nested descriptor is stored as. The token only
//! ever lives under [`REDIRECTION_INFORMATION_KEY`] at the top level.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved name used for the query/form parameter, the ephemeral store
/// key, and the hidden form field.
pub const REDIRECTION_INFORMATION_KEY: &str = "_redirection_information";

/// One parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
    /// An encoded descriptor, compared as a plain string. Only ever held
    /// under the reserved key; [`Parameters`] stores it as text elsewhere.
    #[serde(skip_deserializing)]
    Token(String),
}

impl ParamValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Token(s) => Some(s),
            Self::List(_) | Self::Map(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Ordered parameter mapping with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, ParamValue>", into = "BTreeMap<String, ParamValue>")]
pub struct Parameters(BTreeMap<String, ParamValue>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. A text value under the reserved key becomes a token;
    /// a token anywhere else becomes text.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = normalize(&key, value.into());
        self.0.insert(key, value);
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// The nested descriptor token, if one is embedded.
    pub fn nested_token(&self) -> Option<&str> {
        self.0.get(REDIRECTION_INFORMATION_KEY).and_then(ParamValue::as_str)
    }

    /// Split off the nested token, returning the remaining parameters and
    /// the token separately.
    pub fn split_nested_token(&self) -> (Parameters, Option<String>) {
        let mut rest = self.clone();
        let token = rest
            .remove(REDIRECTION_INFORMATION_KEY)
            .and_then(|v| v.as_str().map(str::to_string));
        (rest, token)
    }

    /// Copy of these parameters with `token` stored under the reserved key.
    pub fn with_nested_token(&self, token: impl Into<String>) -> Parameters {
        let mut out = self.clone();
        out.0
            .insert(REDIRECTION_INFORMATION_KEY.to_string(), ParamValue::Token(token.into()));
        out
    }

    /// Merge `other` over `self`; keys in `other` win.
    pub fn merged(&self, other: &Parameters) -> Parameters {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    /// Flatten into `name=value` pairs using bracket notation:
    /// `comment[body]` for maps and `tags[]` for sequences.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, value) in &self.0 {
            flatten_into(key, value, &mut out);
        }
        out
    }
}

fn normalize(key: &str, value: ParamValue) -> ParamValue {
    match value {
        ParamValue::Text(s) | ParamValue::Token(s) if key == REDIRECTION_INFORMATION_KEY => {
            ParamValue::Token(s)
        }
        other => untokenize(other),
    }
}

/// The wire format cannot tell a token from text, so only the reserved
/// top-level key may hold one.
fn untokenize(value: ParamValue) -> ParamValue {
    match value {
        ParamValue::Token(s) => ParamValue::Text(s),
        ParamValue::List(items) => ParamValue::List(items.into_iter().map(untokenize).collect()),
        ParamValue::Map(map) => {
            ParamValue::Map(map.into_iter().map(|(k, v)| (k, untokenize(v))).collect())
        }
        text @ ParamValue::Text(_) => text,
    }
}

fn flatten_into(name: &str, value: &ParamValue, out: &mut Vec<(String, String)>) {
    match value {
        ParamValue::Text(s) | ParamValue::Token(s) => out.push((name.to_string(), s.clone())),
        ParamValue::List(items) => {
            let item_name = format!("{name}[]");
            for item in items {
                flatten_into(&item_name, item, out);
            }
        }
        ParamValue::Map(map) => {
            for (k, v) in map {
                flatten_into(&format!("{name}[{k}]"), v, out);
            }
        }
    }
}

impl From<BTreeMap<String, ParamValue>> for Parameters {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(
            map.into_iter()
                .map(|(k, v)| {
                    let v = normalize(&k, v);
                    (k, v)
                })
                .collect(),
        )
    }
}

impl From<Parameters> for BTreeMap<String, ParamValue> {
    fn from(params: Parameters) -> Self {
        params.0
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Parameters::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_key_holds_a_token() {
        let params = Parameters::new()
            .with("summary", "hi")
            .with(REDIRECTION_INFORMATION_KEY, "abc");
        assert_eq!(
            params.get(REDIRECTION_INFORMATION_KEY),
            Some(&ParamValue::Token("abc".to_string()))
        );
        assert_eq!(params.nested_token(), Some("abc"));
    }

    #[test]
    fn deserialized_reserved_key_becomes_token() {
        let params: Parameters =
            serde_json::from_str(r#"{"_redirection_information":"tok","summary":"hi"}"#).unwrap();
        assert_eq!(
            params.get(REDIRECTION_INFORMATION_KEY),
            Some(&ParamValue::Token("tok".to_string()))
        );
        assert_eq!(params.get("summary"), Some(&ParamValue::text("hi")));
    }

    #[test]
    fn tokens_serialize_as_plain_strings() {
        let params = Parameters::new().with_nested_token("tok");
        assert_eq!(
            serde_json::to_string(&params).unwrap(),
            r#"{"_redirection_information":"tok"}"#
        );
    }

    #[test]
    fn tokens_outside_the_reserved_key_are_stored_as_text() {
        let params = Parameters::new()
            .with("x", ParamValue::Token("tok".to_string()))
            .with(
                "l",
                ParamValue::List(vec![ParamValue::Token("t2".to_string())]),
            );
        assert_eq!(params.get("x"), Some(&ParamValue::text("tok")));
        assert_eq!(
            params.get("l"),
            Some(&ParamValue::List(vec![ParamValue::text("t2")]))
        );
        assert_eq!(params.nested_token(), None);

        let decoded: Parameters =
            serde_json::from_str(&serde_json::to_string(&params).unwrap()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn split_nested_token_leaves_other_fields() {
        let params = Parameters::new()
            .with("summary", "hi")
            .with_nested_token("tok");
        let (rest, token) = params.split_nested_token();
        assert_eq!(token.as_deref(), Some("tok"));
        assert_eq!(rest, Parameters::new().with("summary", "hi"));
    }

    #[test]
    fn flatten_uses_bracket_notation() {
        let mut comment = BTreeMap::new();
        comment.insert("body".to_string(), ParamValue::text("nice"));
        let params = Parameters::new()
            .with("comment", ParamValue::Map(comment))
            .with(
                "tags",
                ParamValue::List(vec![ParamValue::text("a"), ParamValue::text("b")]),
            )
            .with("summary", "hi");
        assert_eq!(
            params.flatten(),
            vec![
                ("comment[body]".to_string(), "nice".to_string()),
                ("summary".to_string(), "hi".to_string()),
                ("tags[]".to_string(), "a".to_string()),
                ("tags[]".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn merged_prefers_the_right_hand_side() {
        let left = Parameters::new().with("a", "1").with("b", "2");
        let right = Parameters::new().with("b", "3");
        let merged = left.merged(&right);
        assert_eq!(merged.get("a"), Some(&ParamValue::text("1")));
        assert_eq!(merged.get("b"), Some(&ParamValue::text("3")));
    }
}
