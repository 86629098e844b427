//! Route ownership and generation bookkeeping.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::provider::ProviderError;
use crate::route::{Route, RouteGeneration};

/// What happened to a completed route request.
#[derive(Debug, Clone)]
pub enum RouteCompletion {
    /// The route is now active.
    Installed(Arc<Route>),
    /// A newer request was issued after this one; the result was dropped.
    Stale {
        generation: RouteGeneration,
        latest: RouteGeneration,
    },
    /// The newest request failed; the previous route (if any) stays active.
    Failed(ProviderError),
}

impl RouteCompletion {
    pub fn is_installed(&self) -> bool {
        matches!(self, RouteCompletion::Installed(_))
    }
}

/// Owns the active route and the generation counter.
///
/// Every request is stamped with a fresh generation *before* it is issued.
/// Only the result for the newest issued generation is ever installed, so
/// out-of-order completions resolve without blocking.
#[derive(Debug, Default)]
pub struct RouteSession {
    active: Option<Arc<Route>>,
    latest_issued: RouteGeneration,
    pending: BTreeSet<RouteGeneration>,
}

impl RouteSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active route, if one has been installed.
    pub fn active(&self) -> Option<&Arc<Route>> {
        self.active.as_ref()
    }

    /// Generation of the active route, or 0.
    pub fn active_generation(&self) -> RouteGeneration {
        self.active.as_ref().map_or(0, |r| r.generation)
    }

    pub fn latest_issued(&self) -> RouteGeneration {
        self.latest_issued
    }

    /// True while at least one issued request has not completed.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Stamps a new request and returns its generation.
    pub fn issue(&mut self) -> RouteGeneration {
        self.latest_issued += 1;
        self.pending.insert(self.latest_issued);
        self.latest_issued
    }

    /// Applies a completed request.
    pub fn complete(
        &mut self,
        generation: RouteGeneration,
        result: Result<Route, ProviderError>,
    ) -> RouteCompletion {
        self.pending.remove(&generation);

        if generation != self.latest_issued || generation <= self.active_generation() {
            return RouteCompletion::Stale {
                generation,
                latest: self.latest_issued,
            };
        }

        match result {
            Ok(route) if route.is_empty() => RouteCompletion::Failed(ProviderError::EmptyRoute),
            Ok(route) => {
                let route = Arc::new(route.with_generation(generation));
                self.active = Some(Arc::clone(&route));
                RouteCompletion::Installed(route)
            }
            Err(e) => RouteCompletion::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::route::Step;

    fn route(text: &str) -> Route {
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        Route::new(vec![origin], vec![Step::new(origin, text)], 100.0)
    }

    #[test]
    fn test_issue_is_monotonic() {
        let mut session = RouteSession::new();
        assert_eq!(session.issue(), 1);
        assert_eq!(session.issue(), 2);
        assert_eq!(session.pending_count(), 2);
        assert_eq!(session.latest_issued(), 2);
    }

    #[test]
    fn test_latest_result_installed_with_generation() {
        let mut session = RouteSession::new();
        let generation = session.issue();

        let completion = session.complete(generation, Ok(route("a")));
        assert!(completion.is_installed());
        assert_eq!(session.active_generation(), 1);
        assert!(!session.has_pending());
    }

    #[test]
    fn test_stale_result_after_newer_installed() {
        let mut session = RouteSession::new();
        let old = session.issue();
        let new = session.issue();

        assert!(session.complete(new, Ok(route("new"))).is_installed());
        let completion = session.complete(old, Ok(route("old")));
        assert!(matches!(
            completion,
            RouteCompletion::Stale {
                generation: 1,
                latest: 2
            }
        ));

        let active = session.active().unwrap();
        assert_eq!(active.generation, 2);
        assert_eq!(active.steps[0].instruction(), "new");
    }

    #[test]
    fn test_older_result_dropped_while_newer_pending() {
        let mut session = RouteSession::new();
        let old = session.issue();
        let _new = session.issue();

        assert!(matches!(
            session.complete(old, Ok(route("old"))),
            RouteCompletion::Stale { .. }
        ));
        assert!(session.active().is_none());
        assert!(session.has_pending());
    }

    #[test]
    fn test_failure_keeps_previous_route() {
        let mut session = RouteSession::new();
        let first = session.issue();
        session.complete(first, Ok(route("first")));

        let second = session.issue();
        let completion =
            session.complete(second, Err(ProviderError::NetworkError("offline".to_string())));
        assert!(matches!(completion, RouteCompletion::Failed(_)));
        assert_eq!(session.active_generation(), 1);
    }

    #[test]
    fn test_empty_route_is_failure() {
        let mut session = RouteSession::new();
        let generation = session.issue();
        let empty = Route::new(Vec::new(), Vec::new(), 0.0);

        assert!(matches!(
            session.complete(generation, Ok(empty)),
            RouteCompletion::Failed(ProviderError::EmptyRoute)
        ));
        assert!(session.active().is_none());
    }

    #[test]
    fn test_duplicate_completion_is_stale() {
        let mut session = RouteSession::new();
        let generation = session.issue();
        session.complete(generation, Ok(route("a")));

        assert!(matches!(
            session.complete(generation, Ok(route("b"))),
            RouteCompletion::Stale { .. }
        ));
        assert_eq!(session.active().unwrap().steps[0].instruction(), "a");
    }
}
