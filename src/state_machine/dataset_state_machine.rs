//! # Dataset Lifecycle State Machine
//!
//! Transitions live in a table keyed by `(state, event)`. Each entry is a
//! handler that runs its guard or side effect and returns the next state.
//! Pairs missing from the table are irrelevant in that state and leave the
//! dataset untouched ([`TransitionOutcome::Ignored`]); only guards reject.
//!
//! Applying a transition persists it with a compare-and-swap on the state the
//! handler started from, so two conflicting events on one dataset cannot both
//! win: the loser gets [`StateMachineError::ConcurrentModification`].

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::errors::{StateMachineError, StateMachineResult};
use super::events::DatasetEvent;
use super::guards::{AllFilesMarkedGuard, StateGuard};
use super::persistence::StatePersistence;
use super::states::DatasetState;
use crate::events::{DatasetTransitionEvent, EventPublisher};
use crate::logging::log_state_transition;
use crate::store::{DatasetStateStore, FileMetadataProvider};

/// Input handed to a transition handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    pub dataset_id: i64,
    pub state: DatasetState,
    pub event: DatasetEvent,
}

type TransitionHandler =
    Box<dyn Fn(TransitionContext) -> BoxFuture<'static, StateMachineResult<DatasetState>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied { from: DatasetState, to: DatasetState },
    /// The event has no meaning in the current state
    Ignored { state: DatasetState },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// State of the dataset after the event
    pub fn state(&self) -> DatasetState {
        match self {
            Self::Applied { to, .. } => *to,
            Self::Ignored { state } => *state,
        }
    }
}

pub struct DatasetStateMachine {
    transitions: HashMap<(DatasetState, DatasetEvent), TransitionHandler>,
    persistence: StatePersistence,
    events: EventPublisher,
}

impl std::fmt::Debug for DatasetStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStateMachine")
            .field("transitions", &self.transitions.len())
            .field("persistence", &self.persistence)
            .finish()
    }
}

impl DatasetStateMachine {
    /// State machine with no transitions registered
    pub fn empty(store: Arc<dyn DatasetStateStore>, events: EventPublisher) -> Self {
        Self {
            transitions: HashMap::new(),
            persistence: StatePersistence::new(store),
            events,
        }
    }

    /// State machine with the standard dataset lifecycle
    pub fn new(
        store: Arc<dyn DatasetStateStore>,
        metadata: Arc<dyn FileMetadataProvider>,
        events: EventPublisher,
    ) -> Self {
        use DatasetEvent as E;
        use DatasetState as S;

        let mut machine = Self::empty(store, events);
        machine.register_direct(S::NotSampled, E::Import, S::Importing);
        machine.register_direct(S::Importing, E::ImportFinished, S::Labeling);
        machine.register_direct(S::Importing, E::TableImportFinished, S::Labeling);
        machine.register_direct(S::Importing, E::ImportFailed, S::NotSampled);
        machine.register_direct(S::Labeling, E::AutoLabelStarted, S::AutoLabeling);
        machine.register_direct(S::AutoLabeling, E::AutoLabelFinished, S::Labeling);
        machine.register_guarded(
            S::Labeling,
            E::PublishRequested,
            Arc::new(AllFilesMarkedGuard::new(metadata)),
            S::Published,
        );
        machine.register_direct(S::Labeling, E::DifficultCasePublishRequested, S::DifficultCasePublishing);
        machine.register_direct(S::DifficultCasePublishing, E::PublishFailed, S::DifficultCaseFailedToPublish);
        machine.register_direct(S::DifficultCasePublishing, E::DifficultCasePublished, S::Labeling);
        machine.register_direct(
            S::DifficultCaseFailedToPublish,
            E::DifficultCasePublishRequested,
            S::DifficultCasePublishing,
        );
        machine
    }

    /// Register a handler for `(state, event)`, replacing any existing one
    pub fn register<F, Fut>(&mut self, state: DatasetState, event: DatasetEvent, handler: F)
    where
        F: Fn(TransitionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StateMachineResult<DatasetState>> + Send + 'static,
    {
        self.transitions
            .insert((state, event), Box::new(move |ctx| handler(ctx).boxed()));
    }

    /// Unconditional transition
    pub fn register_direct(&mut self, state: DatasetState, event: DatasetEvent, next: DatasetState) {
        self.register(state, event, move |_| async move { Ok(next) });
    }

    /// Transition that only proceeds when `guard` passes
    pub fn register_guarded(
        &mut self,
        state: DatasetState,
        event: DatasetEvent,
        guard: Arc<dyn StateGuard>,
        next: DatasetState,
    ) {
        self.register(state, event, move |ctx| {
            let guard = guard.clone();
            async move {
                guard.check(ctx.dataset_id).await.map_err(|source| {
                    debug!(
                        dataset_id = ctx.dataset_id,
                        guard = guard.description(),
                        "Transition guard rejected event"
                    );
                    StateMachineError::GuardFailed {
                        state: ctx.state,
                        event: ctx.event,
                        source,
                    }
                })?;
                Ok(next)
            }
        });
    }

    pub fn handles(&self, state: DatasetState, event: DatasetEvent) -> bool {
        self.transitions.contains_key(&(state, event))
    }

    /// Events with a registered handler in `state`
    pub fn permitted_events(&self, state: DatasetState) -> Vec<DatasetEvent> {
        let mut events: Vec<DatasetEvent> = self
            .transitions
            .keys()
            .filter(|(s, _)| *s == state)
            .map(|(_, e)| *e)
            .collect();
        events.sort_by_key(|e| e.event_type());
        events
    }

    pub async fn current_state(&self, dataset_id: i64) -> StateMachineResult<DatasetState> {
        self.persistence.resolve_current_state(dataset_id).await
    }

    /// Apply `event` to the dataset. Unregistered pairs are ignored.
    #[instrument(skip_all, fields(dataset_id = dataset_id, event = %event))]
    pub async fn fire(
        &self,
        dataset_id: i64,
        event: DatasetEvent,
    ) -> StateMachineResult<TransitionOutcome> {
        let state = self.persistence.resolve_current_state(dataset_id).await?;

        let Some(handler) = self.transitions.get(&(state, event)) else {
            debug!(
                dataset_id = dataset_id,
                state = %state,
                event = %event,
                "Event not handled in current state"
            );
            return Ok(TransitionOutcome::Ignored { state });
        };

        let next = handler(TransitionContext {
            dataset_id,
            state,
            event,
        })
        .await?;

        self.persistence
            .persist_transition(dataset_id, state, next)
            .await?;

        log_state_transition(dataset_id, event.event_type(), &state.to_string(), &next.to_string());
        self.events.publish_transition(DatasetTransitionEvent {
            dataset_id,
            event,
            from: state,
            to: next,
        });

        Ok(TransitionOutcome::Applied { from: state, to: next })
    }

    /// Like [`Self::fire`], but an unregistered pair is an `IllegalTransition`
    pub async fn fire_strict(
        &self,
        dataset_id: i64,
        event: DatasetEvent,
    ) -> StateMachineResult<TransitionOutcome> {
        match self.fire(dataset_id, event).await? {
            TransitionOutcome::Ignored { state } => {
                Err(StateMachineError::IllegalTransition { state, event })
            }
            applied => Ok(applied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryDatasetStateStore, InMemoryMetadataStore};

    fn machine(initial: DatasetState) -> (DatasetStateMachine, Arc<InMemoryDatasetStateStore>) {
        let store = Arc::new(InMemoryDatasetStateStore::new());
        store.set(1, initial);
        let machine = DatasetStateMachine::new(
            store.clone(),
            Arc::new(InMemoryMetadataStore::new()),
            EventPublisher::default(),
        );
        (machine, store)
    }

    #[tokio::test]
    async fn test_import_moves_not_sampled_to_importing() {
        let (machine, store) = machine(DatasetState::NotSampled);
        let outcome = machine.fire(1, DatasetEvent::Import).await.unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                from: DatasetState::NotSampled,
                to: DatasetState::Importing
            }
        );
        assert_eq!(store.get(1), Some(DatasetState::Importing));
    }

    #[tokio::test]
    async fn test_unhandled_event_is_ignored() {
        let (machine, store) = machine(DatasetState::DifficultCaseFailedToPublish);
        let outcome = machine.fire(1, DatasetEvent::PublishFailed).await.unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Ignored {
                state: DatasetState::DifficultCaseFailedToPublish
            }
        );
        assert_eq!(store.get(1), Some(DatasetState::DifficultCaseFailedToPublish));
    }

    #[tokio::test]
    async fn test_fire_strict_rejects_unhandled_event() {
        let (machine, _) = machine(DatasetState::Published);
        let err = machine.fire_strict(1, DatasetEvent::Import).await.unwrap_err();
        assert!(matches!(err, StateMachineError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn test_unknown_dataset_is_an_error() {
        let (machine, _) = machine(DatasetState::Labeling);
        let err = machine.fire(99, DatasetEvent::Import).await.unwrap_err();
        assert!(matches!(err, StateMachineError::UnknownDataset { dataset_id: 99 }));
    }

    #[tokio::test]
    async fn test_custom_handler_can_be_registered() {
        let store = Arc::new(InMemoryDatasetStateStore::new());
        store.set(1, DatasetState::Published);
        let mut machine = DatasetStateMachine::empty(store.clone(), EventPublisher::default());
        machine.register(DatasetState::Published, DatasetEvent::Import, |ctx| async move {
            assert_eq!(ctx.state, DatasetState::Published);
            Ok(DatasetState::Importing)
        });

        assert!(machine.handles(DatasetState::Published, DatasetEvent::Import));
        let outcome = machine.fire(1, DatasetEvent::Import).await.unwrap();
        assert_eq!(outcome.state(), DatasetState::Importing);
    }

    #[test]
    fn test_permitted_events_for_labeling() {
        let (machine, _) = machine(DatasetState::Labeling);
        let events = machine.permitted_events(DatasetState::Labeling);
        assert_eq!(
            events,
            vec![
                DatasetEvent::AutoLabelStarted,
                DatasetEvent::DifficultCasePublishRequested,
                DatasetEvent::PublishRequested,
            ]
        );
        assert!(machine.permitted_events(DatasetState::Published).is_empty());
    }
}
