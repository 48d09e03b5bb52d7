//! Process-wide bootstrap: one bus, one manager, lazily created.
//!
//! Host applications that want a single shared coordinator use this module
//! instead of threading an [`EffectsManager`] around. [`init_effects`] is
//! idempotent: the first caller's configuration wins and later calls return
//! the existing manager unchanged. The free functions mirror the manager's
//! operations and require `init_effects` to have run first.
//!
//! Code that needs isolated instances (tests, embedded hosts) should
//! construct [`EffectsManager`] and [`ActionBus`] values directly and skip
//! this module entirely.

use std::sync::OnceLock;

use crate::bus::ActionBus;
use crate::effect::Effect;
use crate::error::EffectsError;
use crate::manager::{EffectsConfig, EffectsManager};

static ACTIONS: OnceLock<ActionBus> = OnceLock::new();
static MANAGER: OnceLock<EffectsManager> = OnceLock::new();

/// The process-wide action bus, created on first use.
pub fn actions() -> &'static ActionBus {
    ACTIONS.get_or_init(ActionBus::new)
}

/// Create or return the process-wide effects manager.
///
/// Idempotent: the first call constructs the manager with the given
/// configuration; every later call returns the same manager and silently
/// ignores its configuration argument. First caller wins.
pub fn init_effects(config: EffectsConfig) -> &'static EffectsManager {
    MANAGER.get_or_init(move || EffectsManager::new(config))
}

fn manager() -> &'static EffectsManager {
    match MANAGER.get() {
        Some(manager) => manager,
        None => panic!("{}", EffectsError::NotInitialized),
    }
}

/// Register effects with the process-wide manager.
///
/// # Panics
///
/// Panics if [`init_effects`] has not been called.
pub fn register_effects<I>(effects: I)
where
    I: IntoIterator<Item = Effect>,
{
    manager().register_effects(effects);
}

/// Remove effects from the process-wide manager.
///
/// # Panics
///
/// Panics if [`init_effects`] has not been called.
pub fn remove_effects<'a, I>(effects: I)
where
    I: IntoIterator<Item = &'a Effect>,
{
    manager().remove_effects(effects);
}

/// Tear down every effect registered with the process-wide manager.
///
/// # Panics
///
/// Panics if [`init_effects`] has not been called.
pub fn remove_all_effects() {
    manager().remove_all_effects();
}
