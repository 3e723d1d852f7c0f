//! Reactive Objects
//!
//! A [`ReactiveObject`] wraps a plain record of named fields and intercepts
//! every read and write that goes through its accessors.
//!
//! # How Reactive Objects Work
//!
//! 1. [`get`](ReactiveObject::get) subscribes the current effect (if any) to
//!    the field, then returns the stored value unchanged.
//!
//! 2. [`set`](ReactiveObject::set) stores the new value, then re-runs every
//!    effect subscribed to that field before returning.
//!
//! Because of step 2, a write is potentially expensive and re-entrant: it can
//! run arbitrary effects, which can themselves write. It also fails if one of
//! those effects fails.
//!
//! Fields hold [`serde_json::Value`]s, so a record can be built from anything
//! that serializes to a map and individual fields can be decoded back into
//! typed values with [`get_as`](ReactiveObject::get_as).

use std::fmt::Debug;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::runtime::Runtime;
use super::{FieldKey, ObjectId};
use crate::error::{ReactiveError, Result};

type Fields = IndexMap<FieldKey, Value>;

/// A record whose field reads are tracked and whose field writes trigger
/// effects.
///
/// Cloning a `ReactiveObject` yields another handle to the same record, with
/// the same identity.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use reflex_core::reactive::{effect, reactive};
/// use serde_json::json;
///
/// let obj = reactive(&json!({ "text": "a" }))?;
/// let output = Arc::new(Mutex::new(String::new()));
///
/// let (obj_clone, output_clone) = (obj.clone(), output.clone());
/// let _effect = effect(move || {
///     let text: String = obj_clone.get_as("text").unwrap_or_default();
///     *output_clone.lock() = text;
/// });
///
/// obj.set("text", "b")?;
/// assert_eq!(*output.lock(), "b");
/// # Ok::<(), reflex_core::ReactiveError>(())
/// ```
#[derive(Clone)]
pub struct ReactiveObject {
    id: ObjectId,
    fields: Arc<RwLock<Fields>>,
}

impl ReactiveObject {
    /// Create a reactive object with no fields.
    pub fn new() -> Self {
        Self::from_fields(std::iter::empty::<(FieldKey, Value)>())
    }

    /// Create a reactive object from `(key, value)` pairs.
    pub fn from_fields<K, I>(fields: I) -> Self
    where
        K: Into<FieldKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            id: ObjectId::new(),
            fields: Arc::new(RwLock::new(
                fields.into_iter().map(|(key, value)| (key.into(), value)).collect(),
            )),
        }
    }

    /// Wrap any record that serializes to a map of named fields.
    pub fn from_record<T>(record: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(record).map_err(ReactiveError::Encode)? {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(ReactiveError::NotARecord {
                found: value_kind(&other),
            }),
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        Self::from_fields(map)
    }

    /// Get the object's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Read a field.
    ///
    /// Inside an effect this subscribes the effect to the field, whether or
    /// not the field exists yet.
    pub fn get(&self, key: impl Into<FieldKey>) -> Option<Value> {
        let key = key.into();
        let _serial = Runtime::serialize();
        Runtime::track(self.id, &key);
        self.fields.read().get(&key).cloned()
    }

    /// Read a field and decode it.
    ///
    /// A missing field decodes from `null`, so `Option<T>` targets read it
    /// as `None`.
    pub fn get_as<T>(&self, key: impl Into<FieldKey>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let key = key.into();
        let value = self.get(&key).unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|source| ReactiveError::Decode { key, source })
    }

    /// Read a field without subscribing the current effect.
    pub fn get_untracked(&self, key: impl Into<FieldKey>) -> Option<Value> {
        let key = key.into();
        self.fields.read().get(&key).cloned()
    }

    /// Write a field and re-run the effects subscribed to it.
    ///
    /// Triggers even when the value is unchanged, and when the field is new.
    /// Returns the error of the first subscribed effect that fails.
    pub fn set(&self, key: impl Into<FieldKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let _serial = Runtime::serialize();
        {
            let mut fields = self.fields.write();
            fields.insert(key.clone(), value.into());
        }
        Runtime::trigger(self.id, &key)
    }

    /// Serialize `value` and write it to a field.
    pub fn set_as<T>(&self, key: impl Into<FieldKey>, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(ReactiveError::Encode)?;
        self.set(key, value)
    }

    /// Read a field (tracked) and write back `f` of it.
    pub fn update<F>(&self, key: impl Into<FieldKey>, f: F) -> Result<()>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        let key = key.into();
        let current = self.get(&key);
        self.set(key, f(current))
    }

    /// Field names, in insertion order. Not tracked.
    pub fn keys(&self) -> Vec<FieldKey> {
        self.fields.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    /// Copy of the whole record as a JSON object. Not tracked.
    pub fn snapshot(&self) -> Value {
        let fields = self.fields.read();
        Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        )
    }
}

impl Default for ReactiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ReactiveObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("id", &self.id)
            .field("fields", &self.snapshot())
            .finish()
    }
}

/// Wrap `record` as a [`ReactiveObject`].
pub fn reactive<T>(record: &T) -> Result<ReactiveObject>
where
    T: Serialize + ?Sized,
{
    ReactiveObject::from_record(record)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[test]
    fn object_get_and_set() {
        let obj = reactive(&json!({ "count": 0 })).expect("not a record");
        assert_eq!(obj.get("count"), Some(json!(0)));

        obj.set("count", 42).expect("set failed");
        assert_eq!(obj.get("count"), Some(json!(42)));
    }

    #[test]
    fn object_from_struct() {
        let obj = reactive(&Point { x: 1, y: 2 }).expect("not a record");

        assert_eq!(obj.get_as::<i64>("y").expect("decode failed"), 2);
        assert_eq!(obj.keys(), vec![FieldKey::from("x"), FieldKey::from("y")]);
    }

    #[test]
    fn non_record_is_rejected() {
        let err = reactive(&42).expect_err("numbers are not records");
        assert!(matches!(err, ReactiveError::NotARecord { found: "a number" }));
    }

    #[test]
    fn missing_field_decodes_as_none() {
        let obj = ReactiveObject::new();

        let missing: Option<String> = obj.get_as("nope").expect("decode failed");
        assert_eq!(missing, None);

        let err = obj.get_as::<String>("nope").expect_err("null is not a string");
        assert!(matches!(err, ReactiveError::Decode { .. }));
    }

    #[test]
    fn set_as_round_trips_structs() {
        let obj = ReactiveObject::new();
        obj.set_as("origin", &Point { x: 0, y: 0 }).expect("set failed");

        let origin: Point = obj.get_as("origin").expect("decode failed");
        assert_eq!(origin, Point { x: 0, y: 0 });
    }

    #[test]
    fn update_applies_function() {
        let obj = ReactiveObject::from_fields([("count", json!(10))]);
        obj.update("count", |v| json!(v.and_then(|v| v.as_i64()).unwrap_or(0) + 5))
            .expect("update failed");

        assert_eq!(obj.get("count"), Some(json!(15)));
    }

    #[test]
    fn clone_shares_state() {
        let obj1 = ReactiveObject::new();
        let obj2 = obj1.clone();

        obj1.set("name", "a").expect("set failed");
        assert_eq!(obj2.get("name"), Some(json!("a")));
        assert_eq!(obj1.id(), obj2.id());
    }

    #[test]
    fn read_inside_effect_subscribes() {
        let obj = ReactiveObject::from_fields([("text", json!("a"))]);

        let obj_clone = obj.clone();
        let effect = Effect::new(move || {
            obj_clone.get("text");
            obj_clone.get("absent");
        });

        assert!(Runtime::is_subscribed(effect.id(), obj.id(), "text"));
        assert!(Runtime::is_subscribed(effect.id(), obj.id(), "absent"));
        assert_eq!(effect.dependency_count(), 2);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let obj = ReactiveObject::from_fields([("text", json!("a"))]);

        let obj_clone = obj.clone();
        let _effect = Effect::new(move || {
            obj_clone.get_untracked("text");
            obj_clone.snapshot();
        });

        assert_eq!(Runtime::subscriber_count(obj.id(), "text"), 0);
    }

    #[test]
    fn snapshot_preserves_field_order() {
        let obj = ReactiveObject::from_fields([("b", json!(1)), ("a", json!(2))]);

        assert_eq!(obj.snapshot().to_string(), r#"{"b":1,"a":2}"#);
        assert_eq!(obj.len(), 2);
        assert!(!obj.is_empty());
    }
}
