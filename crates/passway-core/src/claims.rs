//! Claims model
//!
//! A token's payload is a mapping from claim name to claim value. The
//! reserved names (`iss`, `sub`, `aud`, `exp`, `nbf`) get typed accessors;
//! everything else stays available through [`Claims::get`]. Providers do not
//! agree on the optional names for display name and email, which is why
//! normalization works over this map rather than a fixed struct.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Audience claim value - a single recipient or a list of recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `aud` carried one string value
    Single(String),
    /// `aud` carried a list of values
    Many(Vec<String>),
}

impl Audience {
    /// Membership check against one expected audience value
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(value) => value == audience,
            Audience::Many(values) => values.iter().any(|value| value == audience),
        }
    }

    /// All audience values, regardless of wire shape
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Audience::Single(value) => vec![value.clone()],
            Audience::Many(values) => values.clone(),
        }
    }
}

/// Claim name to claim value mapping, in token order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Empty claim set
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Raw value for a claim name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String value for a claim name; `None` when absent or not a string
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Issuer (`iss`)
    pub fn iss(&self) -> Option<&str> {
        self.string("iss")
    }

    /// Subject (`sub`)
    pub fn sub(&self) -> Option<&str> {
        self.string("sub")
    }

    /// Expiry (`exp`), seconds since Unix epoch
    pub fn exp(&self) -> Option<u64> {
        self.get("exp").and_then(Value::as_u64)
    }

    /// Not-before (`nbf`), seconds since Unix epoch
    pub fn nbf(&self) -> Option<u64> {
        self.get("nbf").and_then(Value::as_u64)
    }

    /// Audience (`aud`), tolerating both the single-value and list forms.
    ///
    /// Non-string members of a list form are ignored.
    pub fn aud(&self) -> Option<Audience> {
        match self.get("aud")? {
            Value::String(value) => Some(Audience::Single(value.clone())),
            Value::Array(values) => Some(Audience::Many(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Insert or replace a claim
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Number of claims
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the claim set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over claim name/value pairs in token order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Claims {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
