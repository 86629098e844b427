//! The guidance event loop.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::routes::{RouteCompletion, RouteSession};
use super::{GuidanceConfig, PositionFix, SessionEvent};
use crate::geo::{distance_to_path_meters, Coordinate};
use crate::guidance::{GuidanceEmitter, GuidanceObserver, GuidanceUpdate};
use crate::peripheral::{PeripheralLink, PeripheralStats, PeripheralWorker};
use crate::provider::{ProviderError, RouteProvider};
use crate::route::{Route, RouteGeneration, TravelMode};
use crate::tracker::{StepTracker, TrackerState};

/// Result of feeding one fix into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The fix was not a valid coordinate; no state changed.
    Skipped,
    /// No route is active yet.
    NoRoute,
    /// No step in range ahead of the current one.
    Holding,
    /// The fix resolved to `index`; `emitted` is true on a step change.
    Advanced { index: usize, emitted: bool },
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub fixes_processed: u64,
    pub fixes_skipped: u64,
    pub emissions: u64,
    pub routes_installed: u64,
    pub stale_results: u64,
    pub route_failures: u64,
    pub reroutes: u64,
}

#[derive(Debug, Clone, Copy)]
struct Destination {
    coordinate: Coordinate,
    mode: TravelMode,
}

#[derive(Debug)]
struct RouteOutcome {
    generation: RouteGeneration,
    result: Result<Route, ProviderError>,
}

struct AttachedPeripheral {
    worker: PeripheralWorker,
    forwarder: Arc<dyn GuidanceObserver>,
}

/// Owns all guidance state for one navigation.
///
/// Methods that may start a route request (`navigate`, `handle_fix`,
/// `handle_event`) spawn onto the current Tokio runtime and must be called
/// from within one.
pub struct GuidanceSession {
    config: GuidanceConfig,
    provider: Arc<dyn RouteProvider>,
    routes: RouteSession,
    tracker: StepTracker,
    emitter: GuidanceEmitter,
    destination: Option<Destination>,
    /// Set when `navigate` arrived before any position was known.
    request_deferred: bool,
    last_position: Option<Coordinate>,
    last_reroute: Option<Instant>,
    outcome_tx: mpsc::UnboundedSender<RouteOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<RouteOutcome>,
    cancellation: CancellationToken,
    recompute_cancellation: CancellationToken,
    peripheral: Option<AttachedPeripheral>,
    summary: SessionSummary,
}

impl std::fmt::Debug for GuidanceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidanceSession")
            .field("provider", &self.provider.name())
            .field("routes", &self.routes)
            .field("tracker", &self.tracker)
            .field("destination", &self.destination)
            .field("peripheral", &self.peripheral.is_some())
            .field("summary", &self.summary)
            .finish()
    }
}

impl GuidanceSession {
    pub fn new(config: GuidanceConfig, provider: Arc<dyn RouteProvider>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let cancellation = CancellationToken::new();
        let recompute_cancellation = cancellation.child_token();

        Self {
            tracker: StepTracker::new(config.step_threshold_m),
            emitter: GuidanceEmitter::new(config.update_channel_capacity),
            config,
            provider,
            routes: RouteSession::new(),
            destination: None,
            request_deferred: false,
            last_position: None,
            last_reroute: None,
            outcome_tx,
            outcome_rx,
            cancellation,
            recompute_cancellation,
            peripheral: None,
            summary: SessionSummary::default(),
        }
    }

    /// Subscribes to guidance updates.
    pub fn subscribe(&self) -> broadcast::Receiver<GuidanceUpdate> {
        self.emitter.subscribe()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn GuidanceObserver>) {
        self.emitter.add_observer(observer);
    }

    /// Hands `link` to a background writer and forwards every emission to it.
    ///
    /// A previously attached peripheral is detached and closed in the
    /// background.
    pub fn attach_peripheral(
        &mut self,
        link: PeripheralLink,
        queue_capacity: usize,
    ) -> Arc<PeripheralStats> {
        if let Some(previous) = self.peripheral.take() {
            self.emitter.remove_observer(&previous.forwarder);
            tokio::spawn(previous.worker.close(self.config.peripheral_drain));
        }

        let (worker, forwarder) =
            PeripheralWorker::spawn(link, queue_capacity, self.cancellation.child_token());
        let stats = forwarder.stats();
        let forwarder: Arc<dyn GuidanceObserver> = Arc::new(forwarder);
        self.emitter.add_observer(Arc::clone(&forwarder));
        self.peripheral = Some(AttachedPeripheral { worker, forwarder });
        stats
    }

    pub fn active_route(&self) -> Option<&Arc<Route>> {
        self.routes.active()
    }

    pub fn tracker_state(&self) -> Option<TrackerState> {
        self.tracker.state()
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// True while a route request is in flight.
    pub fn route_pending(&self) -> bool {
        self.routes.has_pending()
    }

    /// Dispatches one event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Fix(fix) => {
                self.handle_fix(fix);
            }
            SessionEvent::Navigate { destination, mode } => {
                self.navigate(destination, mode);
            }
        }
    }

    /// Sets the destination and requests a route from the last known position.
    ///
    /// Without a position yet, the request is deferred to the first valid fix.
    /// Returns the generation of the issued request, if any.
    pub fn navigate(&mut self, destination: Coordinate, mode: TravelMode) -> Option<RouteGeneration> {
        info!(destination = %destination, mode = %mode, "Navigation requested");
        self.destination = Some(Destination {
            coordinate: destination,
            mode,
        });
        self.last_reroute = None;

        let Some(start) = self.last_position else {
            self.request_deferred = true;
            return None;
        };
        self.request_route(start)
    }

    /// Processes one position fix.
    pub fn handle_fix(&mut self, fix: PositionFix) -> FixOutcome {
        let position = match fix.coordinate() {
            Ok(position) => position,
            Err(e) => {
                self.summary.fixes_skipped += 1;
                debug!(error = %e, "Invalid fix skipped");
                return FixOutcome::Skipped;
            }
        };
        self.summary.fixes_processed += 1;
        self.last_position = Some(position);

        let Some(route) = self.routes.active().cloned() else {
            // A failed request is not retried here; the next `navigate` does that.
            if self.request_deferred {
                self.request_route(position);
            }
            return FixOutcome::NoRoute;
        };

        self.check_deviation(position, &route);
        self.track(position, &route)
    }

    /// Applies a completed route request.
    ///
    /// Only the newest issued generation installs; on install the tracker
    /// restarts at step 0 and the last known position is re-evaluated.
    pub fn handle_route_outcome(
        &mut self,
        generation: RouteGeneration,
        result: Result<Route, ProviderError>,
    ) -> RouteCompletion {
        let completion = self.routes.complete(generation, result);
        match &completion {
            RouteCompletion::Installed(route) => {
                self.summary.routes_installed += 1;
                self.tracker.reset(route.generation);
                info!(
                    generation,
                    steps = route.step_count(),
                    distance_km = route.total_distance_km(),
                    "Route installed"
                );
                if let Some(position) = self.last_position {
                    let route = Arc::clone(route);
                    self.track(position, &route);
                }
            }
            RouteCompletion::Stale { latest, .. } => {
                self.summary.stale_results += 1;
                debug!(generation, latest, "Stale route result dropped");
            }
            RouteCompletion::Failed(e) => {
                self.summary.route_failures += 1;
                warn!(generation, error = %e, "Route request failed, keeping current route");
            }
        }
        completion
    }

    /// Waits for the next route request to finish and applies it.
    pub async fn next_route_completion(&mut self) -> Option<RouteCompletion> {
        let outcome = self.outcome_rx.recv().await?;
        Some(self.handle_route_outcome(outcome.generation, outcome.result))
    }

    /// Runs until `shutdown` fires or the event stream closes, then tears down.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        shutdown: CancellationToken,
    ) -> SessionSummary {
        info!(provider = self.provider.name(), "Guidance session starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Guidance session shutting down");
                    break;
                }

                Some(outcome) = self.outcome_rx.recv() => {
                    self.handle_route_outcome(outcome.generation, outcome.result);
                }

                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("Event stream closed");
                            break;
                        }
                    }
                }
            }
        }

        drop(events);
        self.shutdown().await
    }

    /// Cancels outstanding requests, releases the peripheral and returns the summary.
    pub async fn shutdown(mut self) -> SessionSummary {
        self.recompute_cancellation.cancel();
        self.emitter.clear_observers();

        if let Some(attached) = self.peripheral.take() {
            drop(attached.forwarder);
            if let Some(link) = attached.worker.close(self.config.peripheral_drain).await {
                debug!(lines_sent = link.lines_sent(), "Peripheral released");
            }
        }
        self.cancellation.cancel();

        let summary = self.summary.clone();
        info!(
            fixes = summary.fixes_processed,
            skipped = summary.fixes_skipped,
            emissions = summary.emissions,
            routes = summary.routes_installed,
            stale = summary.stale_results,
            failures = summary.route_failures,
            reroutes = summary.reroutes,
            "Guidance session stopped"
        );
        summary
    }

    fn track(&mut self, position: Coordinate, route: &Route) -> FixOutcome {
        let Some(found) = self.tracker.advance(position, route) else {
            return FixOutcome::Holding;
        };
        let emitted = self.emitter.observe(route, found).is_some();
        if emitted {
            self.summary.emissions += 1;
        }
        FixOutcome::Advanced {
            index: found.index,
            emitted,
        }
    }

    fn check_deviation(&mut self, position: Coordinate, route: &Route) {
        if self.destination.is_none() || self.routes.has_pending() {
            return;
        }
        let Some(off_route_m) = distance_to_path_meters(position, &route.geometry) else {
            return;
        };
        if off_route_m <= self.config.deviation_threshold_m {
            return;
        }
        if let Some(last) = self.last_reroute {
            if last.elapsed() < self.config.reroute_cooldown {
                debug!(off_route_m, "Off route, reroute cooling down");
                return;
            }
        }

        info!(off_route_m, "Off route, requesting new route");
        self.last_reroute = Some(Instant::now());
        self.summary.reroutes += 1;
        self.request_route(position);
    }

    fn request_route(&mut self, start: Coordinate) -> Option<RouteGeneration> {
        let destination = self.destination?;
        self.request_deferred = false;
        let generation = self.routes.issue();
        let provider = Arc::clone(&self.provider);
        let outcome_tx = self.outcome_tx.clone();
        let cancellation = self.recompute_cancellation.clone();

        debug!(
            generation,
            from = %start,
            to = %destination.coordinate,
            "Requesting route"
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    debug!(generation, "Route request cancelled");
                }
                result = provider.route(start, destination.coordinate, destination.mode) => {
                    // Receiver gone means the session is gone.
                    let _ = outcome_tx.send(RouteOutcome { generation, result });
                }
            }
        });

        Some(generation)
    }
}

impl Drop for GuidanceSession {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}
