//! Router (component C7): an ordered, atomically-swappable collection of
//! Routes.
//!
//! Readers take a cheap `Arc` clone of the current table and iterate it
//! without holding the lock, so a concurrent `swap` never blocks a request
//! mid-dispatch and never hands back a partially-updated table — the
//! `std::sync::RwLock<Arc<Vec<Route>>>` choice the concurrency design note
//! settles on instead of pulling in a lock-free crate for one swap point.

use crate::context::Context;
use crate::route::Route;
use std::sync::{Arc, RwLock};

pub struct Router {
    routes: RwLock<Arc<Vec<Route>>>,
}

/// Outcome of routing one request through the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A route matched and its handler chain admitted the request; the
    /// forwarder should proceed with the upstream call.
    Admitted,
    /// A route matched but a handler aborted the chain; `ctx` already
    /// carries the abort response.
    Rejected,
    /// No enabled route matched; `ctx` already carries a 404 response.
    NotFound,
}

impl Router {
    /// Builds a router from an unordered set of routes, sorting them by
    /// ascending priority with insertion-order used as the tiebreak (a
    /// stable sort on the original vector order is exactly that).
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by_key(|r| r.priority);
        Router {
            routes: RwLock::new(Arc::new(routes)),
        }
    }

    /// Atomically replaces the live route table. Readers in flight keep
    /// seeing the table they started with; new dispatches see `routes`.
    pub fn swap(&self, mut routes: Vec<Route>) {
        routes.sort_by_key(|r| r.priority);
        let mut guard = self.routes.write().expect("router table lock poisoned");
        *guard = Arc::new(routes);
    }

    /// Routes one request: finds the first enabled, matching route in
    /// priority order and runs its handler chain.
    pub fn dispatch(&self, ctx: &mut Context) -> Outcome {
        let snapshot = self.routes.read().expect("router table lock poisoned").clone();

        for route in snapshot.iter() {
            if route.matches(ctx) {
                return if route.handle(ctx) {
                    Outcome::Admitted
                } else {
                    Outcome::Rejected
                };
            }
        }

        ctx.abort_with_message(404, "Not Found");
        Outcome::NotFound
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().expect("router table lock poisoned").len()
    }
}
