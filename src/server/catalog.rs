//! Catalog endpoints: ticket registration and browsing.
//!
//! Thin request/response wrappers over the store — the catalog boundary has
//! no interesting failure semantics of its own.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;

use super::AppState;
use crate::store::StoreError;
use crate::types::{EventId, Money, Ticket, TicketFilter, TicketId, TicketPage};

/// Errors from catalog endpoints.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No ticket with this id.
    #[error("ticket {0} not found")]
    NotFound(TicketId),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            CatalogError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        (status, message).into_response()
    }
}

/// Body of `POST /api/v1/tickets`.
#[derive(Debug, Deserialize)]
pub struct RegisterTicketRequest {
    /// The event this ticket admits to.
    pub event: EventId,

    /// Price per unit in minor currency units.
    pub unit_price: Money,

    /// Initial allotment.
    pub stock: u32,
}

/// Registers a ticket type.
///
/// Returns 201 with the created record. The write is synced before the
/// response, so an acknowledged ticket survives a crash.
pub async fn register_ticket_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), CatalogError> {
    let ticket = state
        .store()
        .register_ticket(request.event, request.unit_price, request.stock)?;
    state.store().sync()?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Lists tickets matching the filter.
///
/// # Query parameters
///
/// - `event` — restrict to one event
/// - `page` — 1-based page number
/// - `per_page` — page size (capped)
pub async fn list_tickets_handler(
    State(state): State<AppState>,
    Query(filter): Query<TicketFilter>,
) -> Json<TicketPage> {
    Json(state.store().list_tickets(&filter))
}

/// Fetches one ticket by id.
pub async fn get_ticket_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Ticket>, CatalogError> {
    let id = TicketId(id);
    state
        .store()
        .ticket(id)
        .map(Json)
        .ok_or(CatalogError::NotFound(id))
}
