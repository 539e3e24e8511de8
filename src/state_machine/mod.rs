// Dataset lifecycle state machine
//
// An explicit (state, event) transition table with guard-checked handlers and
// compare-and-swap persistence of the resulting state.

pub mod dataset_state_machine;
pub mod errors;
pub mod events;
pub mod guards;
pub mod persistence;
pub mod states;

pub use dataset_state_machine::{DatasetStateMachine, TransitionContext, TransitionOutcome};
pub use errors::{GuardError, PersistenceError, StateMachineError, StateMachineResult};
pub use events::DatasetEvent;
pub use guards::{AllFilesMarkedGuard, StateGuard};
pub use persistence::StatePersistence;
pub use states::DatasetState;
