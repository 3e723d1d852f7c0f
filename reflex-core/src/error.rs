//! Error types for the reactive engine.

use thiserror::Error;

use crate::reactive::{EffectId, FieldKey};

/// Boxed error returned by fallible effect computations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ReactiveError {
    /// An effect computation failed while running.
    ///
    /// Surfaces from whichever call started the run: the registrant for the
    /// first run, or the `set` whose trigger re-ran the effect.
    #[error("effect {effect} failed: {source}")]
    Computation {
        effect: EffectId,
        #[source]
        source: BoxError,
    },

    /// A record handed to [`reactive`](crate::reactive::reactive) did not
    /// serialize to a map of named fields.
    #[error("expected a record with named fields, found {found}")]
    NotARecord { found: &'static str },

    #[error("failed to encode record")]
    Encode(#[source] serde_json::Error),

    #[error("field `{key}` could not be decoded")]
    Decode {
        key: FieldKey,
        #[source]
        source: serde_json::Error,
    },
}

impl ReactiveError {
    /// Attribute a computation failure to `effect`.
    ///
    /// A failure that is already a `Computation` error (an inner effect failed
    /// during a nested write) is passed through unchanged so it keeps naming
    /// the effect that actually failed.
    pub(crate) fn computation(effect: EffectId, source: BoxError) -> Self {
        match source.downcast::<ReactiveError>() {
            Ok(inner) => match *inner {
                inner @ ReactiveError::Computation { .. } => inner,
                other => ReactiveError::Computation {
                    effect,
                    source: Box::new(other),
                },
            },
            Err(source) => ReactiveError::Computation { effect, source },
        }
    }

    /// The effect a computation failure is attributed to, if any.
    pub fn effect(&self) -> Option<EffectId> {
        match self {
            ReactiveError::Computation { effect, .. } => Some(*effect),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_are_attributed_to_the_running_effect() {
        let id = EffectId::new();
        let err = ReactiveError::computation(id, "boom".into());

        assert_eq!(err.effect(), Some(id));
        assert_eq!(err.to_string(), format!("effect {id} failed: boom"));
    }

    #[test]
    fn nested_computation_errors_keep_inner_attribution() {
        let inner_id = EffectId::new();
        let outer_id = EffectId::new();

        let inner = ReactiveError::computation(inner_id, "inner".into());
        let outer = ReactiveError::computation(outer_id, Box::new(inner));

        assert_eq!(outer.effect(), Some(inner_id));
    }

    #[test]
    fn other_reactive_errors_are_wrapped() {
        let id = EffectId::new();
        let decode = ReactiveError::NotARecord { found: "number" };
        let err = ReactiveError::computation(id, Box::new(decode));

        assert_eq!(err.effect(), Some(id));
        assert!(matches!(err, ReactiveError::Computation { .. }));
    }
}
