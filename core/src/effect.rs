//! Side-effect descriptions returned by reducers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// A future that may feed an action back to the caller.
pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

/// A side effect to be executed by the runtime.
///
/// Effects are values. Returning one from a reducer does nothing until the
/// runtime executes it, which keeps reducers pure and easy to test.
pub enum Effect<Action> {
    /// No-op
    None,

    /// Run the contained effects concurrently
    Parallel(Vec<Effect<Action>>),

    /// Run the contained effects one after another
    Sequential(Vec<Effect<Action>>),

    /// Arbitrary async work. A `Some(action)` result is handed to the
    /// runtime's action sink.
    Future(EffectFuture<Action>),
}

impl<Action> Effect<Action> {
    /// Wrap an async block as an effect.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Option<Action>> + Send + 'static,
    {
        Effect::Future(Box::pin(future))
    }

    /// Combine effects to run in parallel
    #[must_use]
    pub const fn merge(effects: Vec<Effect<Action>>) -> Self {
        Effect::Parallel(effects)
    }

    /// Chain effects to run sequentially
    #[must_use]
    pub const fn chain(effects: Vec<Effect<Action>>) -> Self {
        Effect::Sequential(effects)
    }

    /// Returns `true` for [`Effect::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Effect::None)
    }
}

// Futures are opaque, so Debug is written by hand.
impl<Action> fmt::Debug for Effect<Action> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::None => write!(f, "Effect::None"),
            Effect::Parallel(effects) => f.debug_tuple("Effect::Parallel").field(effects).finish(),
            Effect::Sequential(effects) => {
                f.debug_tuple("Effect::Sequential").field(effects).finish()
            },
            Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_future_body() {
        let effect: Effect<u8> = Effect::future(async { Some(1) });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }

    #[test]
    fn merge_and_chain_build_composites() {
        let merged: Effect<u8> = Effect::merge(vec![Effect::None, Effect::None]);
        assert!(matches!(merged, Effect::Parallel(ref inner) if inner.len() == 2));

        let chained: Effect<u8> = Effect::chain(vec![Effect::None]);
        assert!(matches!(chained, Effect::Sequential(ref inner) if inner.len() == 1));
    }

    #[test]
    fn future_effect_yields_action() {
        let effect: Effect<u8> = Effect::future(async { Some(7) });
        let Effect::Future(fut) = effect else {
            unreachable!("constructed as a future");
        };
        assert_eq!(tokio_test::block_on(fut), Some(7));
    }
}
