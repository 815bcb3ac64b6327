//! Transport-neutral request adapter.
//!
//! Mirrors the HTTP surface of the service (`/add_batch`, `/allocate`,
//! `/change_batch_quantity`) without tying it to a web framework: requests
//! are JSON bodies, responses are a status code plus a JSON body. A server
//! only has to route the raw body into `handle_json`.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use stockline_allocation::{
    Allocate, AllocationCommand, AllocationError, ChangeBatchQuantity, CreateBatch,
};
use stockline_core::{BatchRef, DomainError, OrderId, Sku};
use stockline_events::BusError;

use crate::bootstrap::{AllocationBus, CommandOutcome};
use crate::handlers::HandlerError;
use crate::store::StoreError;
use crate::unit_of_work::UnitOfWork;

pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
    pub const UNPROCESSABLE_ENTITY: u16 = 422;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: JsonValue,
}

impl Response {
    fn ok_text(status: u16) -> Self {
        Self {
            status,
            body: JsonValue::String("OK".to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub fn json_error(status: u16, code: &'static str, message: impl Into<String>) -> Response {
    Response {
        status,
        body: json!({
            "error": code,
            "message": message.into(),
        }),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddBatchRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sku: String,
    pub qty: u32,
    /// ISO-8601 date (a full timestamp is truncated to its date).
    #[serde(default)]
    pub eta: Option<String>,
}

impl AddBatchRequest {
    pub fn into_command(self) -> Result<CreateBatch, DomainError> {
        if self.qty == 0 {
            return Err(DomainError::validation("qty must be positive"));
        }
        let eta = self.eta.as_deref().map(parse_eta).transpose()?;
        Ok(CreateBatch {
            reference: BatchRef::from_str(&self.reference)?,
            sku: Sku::from_str(&self.sku)?,
            qty: self.qty,
            eta,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocateRequest {
    #[serde(alias = "orderid")]
    pub order_id: String,
    pub sku: String,
    pub qty: u32,
}

impl AllocateRequest {
    pub fn into_command(self) -> Result<Allocate, DomainError> {
        if self.qty == 0 {
            return Err(DomainError::validation("qty must be positive"));
        }
        Ok(Allocate {
            order_id: OrderId::from_str(&self.order_id)?,
            sku: Sku::from_str(&self.sku)?,
            qty: self.qty,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeBatchQuantityRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub qty: u32,
}

impl ChangeBatchQuantityRequest {
    pub fn into_command(self) -> Result<ChangeBatchQuantity, DomainError> {
        Ok(ChangeBatchQuantity {
            reference: BatchRef::from_str(&self.reference)?,
            qty: self.qty,
        })
    }
}

fn parse_eta(raw: &str) -> Result<NaiveDate, DomainError> {
    let raw = raw.trim();
    NaiveDate::from_str(raw)
        .or_else(|_| NaiveDateTime::from_str(raw).map(|dt| dt.date()))
        .map_err(|_| DomainError::validation(format!("eta is not an ISO date: {raw:?}")))
}

/// Request adapter over an allocation bus.
pub struct Entrypoint<U> {
    bus: AllocationBus<U>,
}

impl<U> core::fmt::Debug for Entrypoint<U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entrypoint").field("bus", &self.bus).finish()
    }
}

impl<U> Entrypoint<U>
where
    U: UnitOfWork,
{
    pub fn new(bus: AllocationBus<U>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &AllocationBus<U> {
        &self.bus
    }

    /// Route a raw JSON body by path.
    pub fn handle_json(&self, route: &str, body: &str) -> Response {
        match route {
            "/add_batch" => match parse::<AddBatchRequest>(body) {
                Ok(req) => self.add_batch(req),
                Err(resp) => resp,
            },
            "/allocate" => match parse::<AllocateRequest>(body) {
                Ok(req) => self.allocate(req),
                Err(resp) => resp,
            },
            "/change_batch_quantity" => match parse::<ChangeBatchQuantityRequest>(body) {
                Ok(req) => self.change_batch_quantity(req),
                Err(resp) => resp,
            },
            other => json_error(status::NOT_FOUND, "not_found", format!("no route {other}")),
        }
    }

    pub fn add_batch(&self, request: AddBatchRequest) -> Response {
        let command = match request.into_command() {
            Ok(command) => command,
            Err(e) => return domain_error_to_response(e),
        };
        match self.dispatch(command.into()) {
            Ok(_) => Response::ok_text(status::CREATED),
            Err(resp) => resp,
        }
    }

    pub fn allocate(&self, request: AllocateRequest) -> Response {
        let command = match request.into_command() {
            Ok(command) => command,
            Err(e) => return domain_error_to_response(e),
        };
        match self.dispatch(command.into()) {
            Ok(Some(batchref)) => Response {
                status: status::CREATED,
                body: json!({ "batchref": batchref }),
            },
            Ok(None) => json_error(
                status::INTERNAL_SERVER_ERROR,
                "internal_error",
                "allocation produced no batch reference",
            ),
            Err(resp) => resp,
        }
    }

    pub fn change_batch_quantity(&self, request: ChangeBatchQuantityRequest) -> Response {
        let command = match request.into_command() {
            Ok(command) => command,
            Err(e) => return domain_error_to_response(e),
        };
        match self.dispatch(command.into()) {
            Ok(_) => Response::ok_text(status::OK),
            Err(resp) => resp,
        }
    }

    fn dispatch(&self, command: AllocationCommand) -> Result<CommandOutcome, Response> {
        let results = self.bus.handle(command).map_err(bus_error_to_response)?;
        Ok(results.into_iter().next().flatten())
    }
}

fn parse<T>(body: &str) -> Result<T, Response>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_str(body)
        .map_err(|e| json_error(status::BAD_REQUEST, "invalid_request", e.to_string()))
}

pub fn bus_error_to_response(err: BusError<HandlerError>) -> Response {
    match err {
        BusError::Handler { source, .. } => handler_error_to_response(source),
        other => {
            tracing::error!(error = %other, "dispatch failed");
            json_error(status::INTERNAL_SERVER_ERROR, "dispatch_error", other.to_string())
        }
    }
}

pub fn handler_error_to_response(err: HandlerError) -> Response {
    match err {
        HandlerError::InvalidSku(_) => {
            json_error(status::BAD_REQUEST, "invalid_sku", err.to_string())
        }
        HandlerError::Allocation(e) => allocation_error_to_response(e),
        HandlerError::Domain(e) => domain_error_to_response(e),
        HandlerError::Store(StoreError::Conflict(msg)) => {
            json_error(status::CONFLICT, "conflict", msg)
        }
        other => {
            tracing::error!(error = %other, "handler failed");
            json_error(status::INTERNAL_SERVER_ERROR, "internal_error", other.to_string())
        }
    }
}

fn allocation_error_to_response(err: AllocationError) -> Response {
    match err {
        AllocationError::OutOfStock(_) => {
            json_error(status::BAD_REQUEST, "out_of_stock", err.to_string())
        }
        AllocationError::UnknownBatch(_) => {
            json_error(status::NOT_FOUND, "not_found", err.to_string())
        }
        AllocationError::DuplicateBatch(_) => {
            json_error(status::CONFLICT, "conflict", err.to_string())
        }
        AllocationError::Domain(e) => domain_error_to_response(e),
    }
}

fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => {
            json_error(status::BAD_REQUEST, "validation_error", err.to_string())
        }
        DomainError::InvariantViolation(_) => json_error(
            status::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            err.to_string(),
        ),
        DomainError::NotFound => json_error(status::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(status::CONFLICT, "conflict", msg),
    }
}
