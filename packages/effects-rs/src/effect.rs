//! Effects: the unit of registration.
//!
//! An [`Effect`] pairs a source function (a transform from the bus's action
//! stream to a derived stream of emissions) with an optional dispatch
//! override. Effects do nothing on their own; registering them with an
//! [`EffectsManager`] subscribes the transform to the bus and routes its
//! emissions through the manager's dispatch policy.
//!
//! Effects carry no name or key. Identity is generated at construction and
//! shared by clones, so the value handed to `register_effects` is the same
//! value later handed to `remove_effects`.
//!
//! [`EffectsManager`]: crate::manager::EffectsManager
//!
//! # Example
//!
//! ```ignore
//! // Map every ping onto a pong and feed it back into the bus.
//! let ping_pong = Effect::new(|actions| {
//!     actions.of_type("ping").map(|_| Action::new("pong"))
//! })
//! .with_dispatch(true);
//!
//! // Side-effect-only observer; emissions are discarded.
//! let pong_logger = Effect::new(|actions| {
//!     actions.of_type("pong").map(|action| {
//!         tracing::info!(kind = %action.kind(), "observed");
//!     })
//! });
//! ```

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::action::Emitted;
use crate::stream::{ActionStream, Stream};

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(1);

/// Generated identity of a registered effect.
///
/// A process-wide counter stands in for reference identity: every
/// `Effect::new` call takes a fresh id, and clones of the effect share it.
/// The manager keys its subscription registry by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        Self(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-effect configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectConfig {
    /// Whether emissions are dispatched back onto the bus. Unset falls back
    /// to the manager's `dispatch_by_default` at each emission.
    pub dispatch: Option<bool>,
}

impl EffectConfig {
    /// Configuration with the dispatch override unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dispatch override.
    pub fn with_dispatch(mut self, dispatch: bool) -> Self {
        self.dispatch = Some(dispatch);
        self
    }
}

type SourceFn = dyn Fn(ActionStream) -> Stream<Emitted> + Send + Sync;

/// A registered transform from the action stream to a derived emission
/// stream, with a dispatch policy.
pub struct Effect {
    id: EffectId,
    source: Arc<SourceFn>,
    config: EffectConfig,
}

impl Effect {
    /// Create an effect from a source function.
    ///
    /// The source function runs once per registration: it receives the bus's
    /// action stream and builds the derived pipeline. Anything convertible
    /// into [`Emitted`] can be emitted: an [`Action`], a `Vec<Action>`, a
    /// raw [`serde_json::Value`], or `()` for side-effect-only transforms.
    ///
    /// [`Action`]: crate::action::Action
    pub fn new<T, F>(source: F) -> Self
    where
        T: Into<Emitted> + 'static,
        F: Fn(ActionStream) -> Stream<T> + Send + Sync + 'static,
    {
        Self {
            id: EffectId::next(),
            source: Arc::new(move |actions| -> Stream<Emitted> {
                source(actions).map(Into::into)
            }),
            config: EffectConfig::default(),
        }
    }

    /// Set the dispatch override, builder-style.
    pub fn with_dispatch(mut self, dispatch: bool) -> Self {
        self.config.dispatch = Some(dispatch);
        self
    }

    /// This effect's registration identity.
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// This effect's configuration.
    pub fn config(&self) -> EffectConfig {
        self.config
    }

    /// Build the derived emission stream over the given action stream.
    pub(crate) fn source(&self, actions: ActionStream) -> Stream<Emitted> {
        (*self.source)(actions)
    }
}

impl Clone for Effect {
    /// Clones share the source function and the registration identity:
    /// registering a clone and removing the original removes the clone's
    /// subscription too.
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            source: Arc::clone(&self.source),
            config: self.config,
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("dispatch", &self.config.dispatch)
            .finish_non_exhaustive()
    }
}

/// Sugar for [`Effect::new`], matching the upstream surface.
pub fn create_effect<T, F>(source: F) -> Effect
where
    T: Into<Emitted> + 'static,
    F: Fn(ActionStream) -> Stream<T> + Send + Sync + 'static,
{
    Effect::new(source)
}

/// Structural predicate: is this type-erased value an [`Effect`]?
///
/// Adapter code that discovers effect-bearing members on arbitrary objects
/// collects them as `&dyn Any` and filters with this check before handing
/// them to `register_effects`.
pub fn is_effect(value: &dyn Any) -> bool {
    value.is::<Effect>()
}
