//! Registration conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `(session, event) -> (next state, field change, effects)`.

pub mod effect;
pub mod event;
pub mod schema;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ProofTextPolicy, RegContext, RegState, Session, SessionId};
pub use transition::{transition, FieldsUpdate, TransitionResult};
