//! Lookup of a single object in a collection by id or name.

use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;

/// Key accepted by [`find_object`]: numbers match `id`, strings match `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupKey {
    Id(i64),
    Name(String),
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Id(id) => write!(f, "id {id}"),
            LookupKey::Name(name) => write!(f, "name '{name}'"),
        }
    }
}

impl From<i64> for LookupKey {
    fn from(id: i64) -> Self {
        LookupKey::Id(id)
    }
}

impl From<i32> for LookupKey {
    fn from(id: i32) -> Self {
        LookupKey::Id(i64::from(id))
    }
}

impl From<&str> for LookupKey {
    fn from(name: &str) -> Self {
        LookupKey::Name(name.to_string())
    }
}

impl From<String> for LookupKey {
    fn from(name: String) -> Self {
        LookupKey::Name(name)
    }
}

/// Something with a numeric id and a display name.
pub trait Identified {
    fn object_id(&self) -> Option<i64>;
    fn object_name(&self) -> Option<&str>;
}

impl Identified for Value {
    fn object_id(&self) -> Option<i64> {
        self.get("id").and_then(Value::as_i64)
    }

    fn object_name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }
}

fn matches<T: Identified>(item: &T, key: &LookupKey) -> bool {
    match key {
        LookupKey::Id(id) => item.object_id() == Some(*id),
        LookupKey::Name(name) => item.object_name() == Some(name.as_str()),
    }
}

/// Call `producer` and return the single item matching `key`.
///
/// No match is `NotFound`; several matches are `AmbiguousMatch` rather than
/// an arbitrary pick.
pub fn find_object<T, F, K>(producer: F, key: K) -> Result<T>
where
    T: Identified,
    F: FnOnce() -> Result<Vec<T>>,
    K: Into<LookupKey>,
{
    let key = key.into();
    let mut found: Vec<T> = producer()?
        .into_iter()
        .filter(|item| matches(item, &key))
        .collect();
    match found.len() {
        0 => Err(Error::NotFound(key.to_string())),
        1 => Ok(found.remove(0)),
        count => Err(Error::AmbiguousMatch {
            key: key.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_match_by_id_and_name() {
        let producer = || {
            Ok(vec![
                json!({"id": 1, "name": "east"}),
                json!({"id": 2, "name": "west"}),
            ])
        };
        assert_eq!(find_object(producer, 2).unwrap()["name"], "west");
        assert_eq!(find_object(producer, "east").unwrap()["id"], 1);
    }

    #[test]
    fn duplicate_names_are_ambiguous() {
        let producer = || Ok(vec![json!({"id": 1, "name": "dup"}), json!({"id": 2, "name": "dup"})]);
        let err = find_object(producer, "dup").unwrap_err();
        assert!(matches!(err, Error::AmbiguousMatch { count: 2, .. }));
    }

    #[test]
    fn producer_errors_propagate() {
        let producer = || -> Result<Vec<Value>> { Err(Error::NotFound("upstream".into())) };
        let err = find_object(producer, 1).unwrap_err();
        assert!(err.to_string().contains("upstream"));
    }
}
