//! Transaction lifecycle endpoints.
//!
//! These handlers translate HTTP into orchestrator calls and orchestrator
//! errors into status codes. The error mapping mirrors the propagation
//! policy: validation and not-found failures are 4xx with no side effects,
//! lost races surface as 409 Conflict, and persistence failures are 500.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;

use super::AppState;
use super::identity::Requester;
use crate::checkout::{CheckoutError, Confirmation, TransactionView};
use crate::store::StoreError;
use crate::types::{Decision, OrderLine, TxnRef};

/// Errors from transaction endpoints.
#[derive(Debug, Error)]
pub enum TransactionApiError {
    /// The path segment is not a valid reference token.
    #[error("invalid transaction reference")]
    BadReference,

    /// No transaction with this reference.
    #[error("transaction {0} not found")]
    NotFound(TxnRef),

    /// Orchestrator failure.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl From<StoreError> for TransactionApiError {
    fn from(e: StoreError) -> Self {
        TransactionApiError::Checkout(CheckoutError::Store(e))
    }
}

impl IntoResponse for TransactionApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            TransactionApiError::BadReference => StatusCode::BAD_REQUEST,
            TransactionApiError::NotFound(_) => StatusCode::NOT_FOUND,
            TransactionApiError::Checkout(e) => match e {
                CheckoutError::EmptyProof => StatusCode::BAD_REQUEST,
                CheckoutError::ProofStorage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                CheckoutError::Store(store) => match store {
                    StoreError::EmptyOrder
                    | StoreError::ZeroQuantity { .. }
                    | StoreError::TicketNotFound { .. }
                    | StoreError::AmountOverflow => StatusCode::BAD_REQUEST,
                    StoreError::InsufficientStock { .. } | StoreError::InvalidState { .. } => {
                        StatusCode::CONFLICT
                    }
                    StoreError::TransactionNotFound { .. } => StatusCode::NOT_FOUND,
                    StoreError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    StoreError::Persistence(_)
                    | StoreError::Snapshot(_)
                    | StoreError::Corruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
        };
        (status, self.to_string()).into_response()
    }
}

fn parse_reference(raw: &str) -> Result<TxnRef, TransactionApiError> {
    raw.parse().map_err(|_| TransactionApiError::BadReference)
}

/// Body of `POST /api/v1/transactions`.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// The cart: ticket ids with requested quantities.
    pub items: Vec<OrderLine>,
}

/// Body of `POST /api/v1/transactions/{reference}/decision`.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// `ACCEPT` or `REJECT`.
    pub decision: Decision,
}

/// Creates a reservation for the authenticated buyer.
///
/// Returns 201 with the confirmation: reference token, status, total, and
/// payment deadline. Internal identifiers are never exposed.
pub async fn create_transaction_handler(
    State(state): State<AppState>,
    Requester(buyer): Requester,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Confirmation>), TransactionApiError> {
    let confirmation = state.checkout().create_transaction(buyer, &request.items)?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

/// Returns the pollable view of a transaction.
pub async fn get_transaction_handler(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<TransactionView>, TransactionApiError> {
    let reference = parse_reference(&reference)?;
    state
        .checkout()
        .transaction(&reference)
        .map(Json)
        .ok_or(TransactionApiError::NotFound(reference))
}

/// Accepts a payment-proof upload (raw request body) from the owning buyer.
pub async fn submit_proof_handler(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Requester(requester): Requester,
    body: Bytes,
) -> Result<Json<Confirmation>, TransactionApiError> {
    let reference = parse_reference(&reference)?;
    let confirmation = state
        .checkout()
        .submit_payment_proof(&reference, &body, requester)?;
    Ok(Json(confirmation))
}

/// Applies the organizer's decision.
///
/// Organizer authorization is enforced upstream (identity boundary); this
/// endpoint only requires an authenticated caller.
pub async fn decide_handler(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Requester(_organizer): Requester,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Confirmation>, TransactionApiError> {
    let reference = parse_reference(&reference)?;
    let confirmation = state.checkout().decide(&reference, request.decision)?;
    Ok(Json(confirmation))
}
