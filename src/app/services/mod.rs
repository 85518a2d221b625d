//! Catalog-backed rule-check services.

pub mod academic;
pub mod financial;
pub mod regulations;
pub mod schedule;

pub use academic::{AcademicRules, AcademicService};
pub use financial::FinancialService;
pub use regulations::RegulationsService;
pub use schedule::ScheduleService;

use crate::domain::messages::{error_reply, unknown_kind_reply, wire};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Decodes a service request whose `tipo` is one of `known`.
///
/// The error side is the reply to send back: the protocol's unknown-kind
/// answer, or an `erro` naming the bad field.
pub(crate) fn decode<T: DeserializeOwned>(request: &Value, known: &[&str]) -> Result<T, Value> {
    let kind = request.get(wire::KIND).and_then(Value::as_str);
    if !kind.is_some_and(|kind| known.contains(&kind)) {
        tracing::warn!("Unknown request kind: {:?}", kind);
        return Err(unknown_kind_reply());
    }

    serde_json::from_value(request.clone()).map_err(|e| {
        tracing::warn!("Invalid {} request: {}", kind.unwrap_or_default(), e);
        error_reply(format!("Pedido inválido: {e}"))
    })
}

/// Negative check reply for a student or course missing from the catalog.
pub(crate) fn not_found(decision_field: &str, message: &str) -> Value {
    json!({
        decision_field: false,
        "mensagem": message,
        "codigo": wire::NOT_FOUND,
    })
}

/// `erro` reply for lookups that do not carry a decision field.
pub(crate) fn lookup_not_found(message: &str) -> Value {
    json!({
        "status": wire::STATUS_ERROR,
        "mensagem": message,
        "codigo": wire::NOT_FOUND,
    })
}

pub(crate) const STUDENT_NOT_FOUND: &str = "Estudante não encontrado";
pub(crate) const COURSE_NOT_FOUND: &str = "Disciplina não encontrada";
