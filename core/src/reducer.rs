//! The reducer trait.

use crate::effect::Effect;
use smallvec::SmallVec;

/// Business logic for one aggregate.
///
/// A reducer receives the current state, an action (a command or a fact that
/// already happened) and the injected environment. It mutates the state in
/// place and returns effects for the runtime to execute.
///
/// Reducers must not perform I/O. Anything that talks to the outside world is
/// returned as an [`Effect`].
pub trait Reducer {
    /// The state this reducer operates on
    type State;

    /// The action type this reducer processes
    type Action;

    /// Injected dependencies (clock, codecs, collaborators)
    type Environment;

    /// Apply `action` to `state` and describe the resulting side effects.
    ///
    /// Most actions produce zero or one effect, so the return type keeps up
    /// to four effects inline without allocating.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]>;
}
