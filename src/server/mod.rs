//! HTTP server for the marketplace.
//!
//! # Endpoints
//!
//! - `POST /api/v1/tickets` — register a ticket type (catalog boundary)
//! - `GET /api/v1/tickets` — browse the catalog (filter + paging)
//! - `GET /api/v1/tickets/{id}` — fetch one ticket
//! - `POST /api/v1/transactions` — create a reservation
//! - `GET /api/v1/transactions/{reference}` — poll a transaction
//! - `POST /api/v1/transactions/{reference}/proof` — upload payment proof
//! - `POST /api/v1/transactions/{reference}/decision` — organizer decision
//! - `GET /health` — liveness
//!
//! Identity arrives via the `x-user-id` header (see [`identity`]); the
//! external reference token is the only transaction handle in any URL or
//! response.

use std::sync::Arc;

pub mod catalog;
pub mod health;
pub mod identity;
pub mod transactions;

pub use health::health_handler;
pub use identity::Requester;

use crate::checkout::Checkout;
use crate::store::MarketStore;

/// Shared application state, passed to handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    checkout: Arc<Checkout>,
    store: Arc<MarketStore>,
}

impl AppState {
    /// Creates the shared state.
    pub fn new(checkout: Arc<Checkout>, store: Arc<MarketStore>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { checkout, store }),
        }
    }

    /// The checkout orchestrator.
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    /// The underlying store (catalog endpoints).
    pub fn store(&self) -> &MarketStore {
        &self.inner.store
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route(
            "/api/v1/tickets",
            post(catalog::register_ticket_handler).get(catalog::list_tickets_handler),
        )
        .route("/api/v1/tickets/{id}", get(catalog::get_ticket_handler))
        .route(
            "/api/v1/transactions",
            post(transactions::create_transaction_handler),
        )
        .route(
            "/api/v1/transactions/{reference}",
            get(transactions::get_transaction_handler),
        )
        .route(
            "/api/v1/transactions/{reference}/proof",
            post(transactions::submit_proof_handler),
        )
        .route(
            "/api/v1/transactions/{reference}/decision",
            post(transactions::decide_handler),
        )
        .route("/health", get(health_handler))
        .with_state(app_state)
}
