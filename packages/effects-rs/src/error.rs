//! Structured error types for the effects registry.
//!
//! `EffectsError` provides pattern-matchable errors instead of opaque strings.
//! The registry has exactly two failure modes that cross its public boundary:
//! an effect emitted something that is not an action while its dispatch policy
//! was enabled, and a registration free function was called before the
//! process-wide manager existed. Both are programmer errors, surfaced as
//! panics carrying these messages; everything else (removing an unknown
//! effect, re-initializing with a different configuration) is a documented
//! no-op.

use serde_json::Value;
use thiserror::Error;

/// Structured error type for effects operations.
#[derive(Debug, Error)]
pub enum EffectsError {
    /// An effect whose dispatch policy resolved to `true` emitted a value
    /// that does not satisfy the action shape: a JSON object carrying a
    /// non-empty string `type` field.
    ///
    /// The offending value is carried verbatim so the message identifies
    /// exactly what the effect produced.
    #[error(
        "emitted value `{value}` is not a valid action; provide an object with a \
         non-empty string `type` field, or register the effect with \
         `dispatch: false` if it is side-effect-only"
    )]
    InvalidDispatchValue {
        /// The emitted value that failed the action shape check.
        value: Value,
    },

    /// A registration free function was called before [`init_effects`]
    /// created the process-wide manager.
    ///
    /// [`init_effects`]: crate::init_effects
    #[error("effects manager is not initialized; call init_effects before registering or removing effects")]
    NotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_dispatch_value_display() {
        let err = EffectsError::InvalidDispatchValue {
            value: json!("oops"),
        };
        let message = err.to_string();
        assert!(message.contains("\"oops\""));
        assert!(message.contains("not a valid action"));
        assert!(message.contains("dispatch: false"));
    }

    #[test]
    fn test_invalid_dispatch_value_carries_object() {
        let err = EffectsError::InvalidDispatchValue {
            value: json!({ "payload": 1 }),
        };
        match &err {
            EffectsError::InvalidDispatchValue { value } => {
                assert_eq!(value.get("payload"), Some(&json!(1)));
            }
            _ => panic!("expected InvalidDispatchValue"),
        }
    }

    #[test]
    fn test_not_initialized_display() {
        let err = EffectsError::NotInitialized;
        assert!(err.to_string().contains("init_effects"));
    }
}
