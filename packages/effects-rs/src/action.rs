//! Action values and the shapes effects emit.
//!
//! # Overview
//!
//! An [`Action`] is a discriminated event value: an immutable JSON object
//! carrying a `type` field (a non-empty string) that identifies its kind,
//! plus arbitrary additional payload fields. Actions have no identity beyond
//! their content; they flow through the bus and may be held by any subscriber.
//!
//! [`Emitted`] is what an effect's derived stream produces: a single action,
//! a batch of actions, or an arbitrary raw value whose only purpose was the
//! side effect that computed it. Raw values are re-validated against the
//! action shape at the moment the registry decides to dispatch them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::{smallvec, SmallVec};

use crate::error::EffectsError;

/// The discriminator field every action carries.
pub const KIND_FIELD: &str = "type";

/// A discriminated event value flowing through the action bus.
///
/// Invariant: the wrapped JSON value is an object whose [`KIND_FIELD`] entry
/// is a non-empty string. The bus performs no validation of its own; the
/// invariant is established here, at construction.
///
/// # Example
///
/// ```ignore
/// let action = Action::new("todo/add")
///     .with("id", 7)
///     .with("title", "water the plants");
///
/// assert_eq!(action.kind(), "todo/add");
/// assert_eq!(action.get("id"), Some(&serde_json::json!(7)));
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Action {
    value: Value,
}

impl Action {
    /// Create a new action of the given kind with no payload fields.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is empty; an empty discriminator can never satisfy
    /// the action shape.
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        assert!(!kind.is_empty(), "action kind must be a non-empty string");

        let mut object = Map::new();
        object.insert(KIND_FIELD.to_string(), Value::String(kind));
        Self {
            value: Value::Object(object),
        }
    }

    /// Add a payload field, builder-style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Value::Object(object) = &mut self.value {
            object.insert(field.into(), value.into());
        }
        self
    }

    /// The action's kind (its `type` discriminator).
    pub fn kind(&self) -> &str {
        self.value
            .get(KIND_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Look up a payload field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Unwrap into the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl TryFrom<Value> for Action {
    type Error = EffectsError;

    /// The action shape check: a JSON object carrying a non-empty string
    /// `type` field. Anything else is rejected with
    /// [`EffectsError::InvalidDispatchValue`].
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let valid = value
            .as_object()
            .and_then(|object| object.get(KIND_FIELD))
            .and_then(Value::as_str)
            .is_some_and(|kind| !kind.is_empty());

        if valid {
            Ok(Self { value })
        } else {
            Err(EffectsError::InvalidDispatchValue { value })
        }
    }
}

impl From<Action> for Value {
    fn from(action: Action) -> Value {
        action.value
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind())
            .field("value", &self.value)
            .finish()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A value produced by an effect's derived stream.
///
/// Effects may emit follow-up actions (singly or in batches) or arbitrary
/// side-effect-only values. Which of these is acceptable depends on the
/// effect's dispatch policy: when the policy is off, every emission is
/// discarded after the transform ran; when it is on, the emission is coerced
/// into a batch of actions and every entry must pass the action shape check.
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
    /// A single follow-up action.
    Action(Action),
    /// A batch of follow-up actions, dispatched in order.
    Batch(Vec<Action>),
    /// A raw value: side-effect-only output, or a would-be action that still
    /// needs the shape check. A raw JSON array is treated as a batch.
    Raw(Value),
}

impl Emitted {
    /// Coerce this emission into a dispatchable batch.
    ///
    /// Validation is whole-batch and fail-fast: if any entry fails the action
    /// shape check the entire emission errors, and the caller must dispatch
    /// nothing from it.
    pub(crate) fn into_actions(self) -> Result<SmallVec<[Action; 1]>, EffectsError> {
        match self {
            Emitted::Action(action) => Ok(smallvec![action]),
            Emitted::Batch(actions) => Ok(actions.into_iter().collect()),
            Emitted::Raw(Value::Array(values)) => {
                values.into_iter().map(Action::try_from).collect()
            }
            Emitted::Raw(value) => Ok(smallvec![Action::try_from(value)?]),
        }
    }
}

impl From<Action> for Emitted {
    fn from(action: Action) -> Self {
        Emitted::Action(action)
    }
}

impl From<Vec<Action>> for Emitted {
    fn from(actions: Vec<Action>) -> Self {
        Emitted::Batch(actions)
    }
}

impl From<Value> for Emitted {
    fn from(value: Value) -> Self {
        Emitted::Raw(value)
    }
}

impl From<()> for Emitted {
    fn from(_: ()) -> Self {
        Emitted::Raw(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_builder() {
        let action = Action::new("todo/add").with("id", 7).with("done", false);

        assert_eq!(action.kind(), "todo/add");
        assert_eq!(action.get("id"), Some(&json!(7)));
        assert_eq!(action.get("done"), Some(&json!(false)));
        assert_eq!(action.get("missing"), None);
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn test_action_new_rejects_empty_kind() {
        let _ = Action::new("");
    }

    #[test]
    fn test_shape_check_accepts_object_with_kind() {
        let action = Action::try_from(json!({ "type": "ping", "n": 1 })).unwrap();
        assert_eq!(action.kind(), "ping");
        assert_eq!(action.get("n"), Some(&json!(1)));
    }

    #[test]
    fn test_shape_check_rejects_invalid_values() {
        let invalid = vec![
            json!("oops"),
            json!(null),
            json!(42),
            json!([1, 2, 3]),
            json!({ "payload": 1 }),
            json!({ "type": "" }),
            json!({ "type": 5 }),
        ];

        for value in invalid {
            let result = Action::try_from(value.clone());
            assert!(result.is_err(), "expected rejection of {value}");
        }
    }

    #[test]
    fn test_action_serde_round_trip() {
        let action = Action::new("ping").with("n", 3);
        let text = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&text).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_action_deserialize_revalidates() {
        let result: Result<Action, _> = serde_json::from_str(r#"{"payload": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_emitted_single_action() {
        let emitted = Emitted::from(Action::new("pong"));
        let actions = emitted.into_actions().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind(), "pong");
    }

    #[test]
    fn test_emitted_batch_preserves_order() {
        let emitted = Emitted::from(vec![Action::new("a"), Action::new("b")]);
        let actions = emitted.into_actions().unwrap();
        let kinds: Vec<_> = actions.iter().map(Action::kind).collect();
        assert_eq!(kinds, vec!["a", "b"]);
    }

    #[test]
    fn test_emitted_raw_array_is_a_batch() {
        let emitted = Emitted::from(json!([{ "type": "a" }, { "type": "b" }]));
        let actions = emitted.into_actions().unwrap();
        let kinds: Vec<_> = actions.iter().map(Action::kind).collect();
        assert_eq!(kinds, vec!["a", "b"]);
    }

    #[test]
    fn test_emitted_raw_value_is_checked() {
        let emitted = Emitted::from(json!({ "type": "pong" }));
        assert!(emitted.into_actions().is_ok());

        let emitted = Emitted::from(json!("oops"));
        assert!(emitted.into_actions().is_err());
    }

    #[test]
    fn test_emitted_batch_validation_is_fail_fast() {
        // One bad entry poisons the whole emission.
        let emitted = Emitted::from(json!([{ "type": "ok" }, "bad", { "type": "also-ok" }]));
        assert!(emitted.into_actions().is_err());
    }

    #[test]
    fn test_emitted_from_unit_is_side_effect_only() {
        let emitted = Emitted::from(());
        assert_eq!(emitted, Emitted::Raw(Value::Null));
        assert!(emitted.into_actions().is_err());
    }
}
