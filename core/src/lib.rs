//! # Campus Core
//!
//! Shared abstractions for the campus events engine.
//!
//! Business rules are written as reducers: `(State, Action, Environment) -> Effects`.
//! A reducer validates an action, mutates the aggregate state in place and
//! returns descriptions of side effects. The runtime crate executes those
//! effects once the new state has been persisted.
//!
//! - [`reducer::Reducer`]: the business-logic trait
//! - [`effect::Effect`]: side-effect descriptions
//! - [`environment::Clock`]: injected time source
//! - [`version::Version`]: record versions for compare-and-swap writes
//!
//! ## Example
//!
//! ```
//! use campus_core::{SmallVec, effect::Effect, reducer::Reducer};
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: u32,
//! }
//!
//! enum CounterAction {
//!     Increment,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = Counter;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Counter,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         match action {
//!             CounterAction::Increment => state.value += 1,
//!         }
//!         SmallVec::new()
//!     }
//! }
//!
//! let mut state = Counter::default();
//! let effects = CounterReducer.reduce(&mut state, CounterAction::Increment, &());
//! assert_eq!(state.value, 1);
//! assert!(effects.is_empty());
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

pub mod effect;
pub mod environment;
pub mod reducer;
pub mod version;
