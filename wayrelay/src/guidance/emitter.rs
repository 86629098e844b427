//! Step-transition detection and observer dispatch.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::message::{GuidanceMessage, GuidanceUpdate};
use crate::route::{Route, RouteGeneration};
use crate::tracker::StepMatch;

/// Default capacity of the UI broadcast channel.
pub const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Receives guidance updates synchronously from the session.
///
/// Implementations must return quickly; anything slow (serial writes, network)
/// belongs on a task fed by a channel.
pub trait GuidanceObserver: Send + Sync {
    fn on_guidance(&self, update: &GuidanceUpdate);
}

/// Emits exactly one update per distinct step transition.
///
/// A transition is identified by `(generation, step_index)`: repeated fixes
/// resolving to the same step are silent, while a newly installed route
/// announces its steps again starting from index 0.
pub struct GuidanceEmitter {
    observers: Vec<Arc<dyn GuidanceObserver>>,
    updates: broadcast::Sender<GuidanceUpdate>,
    last_emitted: Option<(RouteGeneration, usize)>,
    emitted: u64,
}

impl std::fmt::Debug for GuidanceEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidanceEmitter")
            .field("observers", &self.observers.len())
            .field("last_emitted", &self.last_emitted)
            .field("emitted", &self.emitted)
            .finish()
    }
}

impl Default for GuidanceEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_CHANNEL_CAPACITY)
    }
}

impl GuidanceEmitter {
    pub fn new(channel_capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            observers: Vec::new(),
            updates,
            last_emitted: None,
            emitted: 0,
        }
    }

    /// Registers a synchronous observer.
    pub fn add_observer(&mut self, observer: Arc<dyn GuidanceObserver>) {
        self.observers.push(observer);
    }

    /// Removes one observer by identity. Returns false if it was not registered.
    pub fn remove_observer(&mut self, observer: &Arc<dyn GuidanceObserver>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
        self.observers.len() != before
    }

    /// Drops all registered observers.
    ///
    /// Observers that own channel senders (such as the peripheral forwarder)
    /// close their channels as a result.
    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    /// Subscribes to updates (UI state, logging sinks).
    pub fn subscribe(&self) -> broadcast::Receiver<GuidanceUpdate> {
        self.updates.subscribe()
    }

    /// Number of updates emitted so far.
    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }

    /// The last `(generation, step_index)` announced.
    pub fn last_emitted(&self) -> Option<(RouteGeneration, usize)> {
        self.last_emitted
    }

    /// Announces `found` if it differs from the last emitted step.
    ///
    /// Returns the update when one was dispatched.
    pub fn observe(&mut self, route: &Route, found: StepMatch) -> Option<GuidanceUpdate> {
        let key = (route.generation, found.index);
        if self.last_emitted == Some(key) {
            debug!(
                generation = route.generation,
                step = found.index,
                "Step unchanged, no emission"
            );
            return None;
        }

        let message = GuidanceMessage::for_step(route, found.index)?;
        let update = GuidanceUpdate {
            generation: route.generation,
            step_index: found.index,
            step_count: route.step_count(),
            distance_to_step_m: found.distance,
            message,
            emitted_at: Utc::now(),
        };

        self.last_emitted = Some(key);
        self.emitted += 1;

        info!(
            generation = update.generation,
            step = update.step_index,
            steps = update.step_count,
            distance_km = update.message.distance_remaining_km,
            instruction = %update.message.instruction_text,
            "Guidance update"
        );

        for observer in &self.observers {
            observer.on_guidance(&update);
        }
        // No subscribers is fine.
        let _ = self.updates.send(update.clone());

        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::route::Step;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(RouteGeneration, usize)>>,
    }

    impl GuidanceObserver for Recorder {
        fn on_guidance(&self, update: &GuidanceUpdate) {
            self.seen.lock().push((update.generation, update.step_index));
        }
    }

    fn route(generation: RouteGeneration) -> Route {
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        Route::new(
            Vec::new(),
            vec![
                Step::new(origin, "Depart"),
                Step::new(origin, "Turn left"),
                Step::new(origin, "Arrive"),
            ],
            2_500.0,
        )
        .with_generation(generation)
    }

    fn at(index: usize) -> StepMatch {
        StepMatch {
            index,
            distance: 5.0,
        }
    }

    #[test]
    fn test_one_emission_per_transition() {
        let recorder = Arc::new(Recorder::default());
        let mut emitter = GuidanceEmitter::default();
        emitter.add_observer(recorder.clone());
        let route = route(1);

        assert!(emitter.observe(&route, at(0)).is_some());
        let update = emitter.observe(&route, at(1)).unwrap();
        assert_eq!(update.message.instruction_text, "Turn left");
        assert_eq!(update.message.distance_remaining_km, 2.5);

        for _ in 0..5 {
            assert!(emitter.observe(&route, at(1)).is_none());
        }

        assert_eq!(*recorder.seen.lock(), vec![(1, 0), (1, 1)]);
        assert_eq!(emitter.emitted_count(), 2);
    }

    #[test]
    fn test_new_generation_announces_again() {
        let mut emitter = GuidanceEmitter::default();
        assert!(emitter.observe(&route(1), at(0)).is_some());
        assert!(emitter.observe(&route(2), at(0)).is_some());
        assert_eq!(emitter.last_emitted(), Some((2, 0)));
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut emitter = GuidanceEmitter::default();
        assert!(emitter.observe(&route(1), at(9)).is_none());
        assert_eq!(emitter.emitted_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_updates() {
        let mut emitter = GuidanceEmitter::default();
        let mut rx = emitter.subscribe();

        emitter.observe(&route(1), at(2));
        let update = rx.recv().await.unwrap();
        assert_eq!(update.step_index, 2);
        assert!(update.is_final_step());
    }

    #[test]
    fn test_clear_observers() {
        let recorder = Arc::new(Recorder::default());
        let mut emitter = GuidanceEmitter::default();
        emitter.add_observer(recorder.clone());
        emitter.clear_observers();

        emitter.observe(&route(1), at(0));
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn test_remove_observer_by_identity() {
        let kept = Arc::new(Recorder::default());
        let removed: Arc<dyn GuidanceObserver> = Arc::new(Recorder::default());
        let mut emitter = GuidanceEmitter::default();
        emitter.add_observer(kept.clone());
        emitter.add_observer(Arc::clone(&removed));

        assert!(emitter.remove_observer(&removed));
        assert!(!emitter.remove_observer(&removed));

        emitter.observe(&route(1), at(0));
        assert_eq!(*kept.seen.lock(), vec![(1, 0)]);
    }
}
