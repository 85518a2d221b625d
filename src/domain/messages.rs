//! Wire vocabulary shared by the coordinator and the rule-check services.
//!
//! Requests and replies are JSON objects keyed by `tipo`. Field names follow
//! the registrar's published protocol, so they stay in Portuguese on the wire
//! while the Rust side uses English names.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

pub mod wire {
    pub const KIND: &str = "tipo";
    pub const STUDENT_ID: &str = "estudante_id";
    pub const COURSE: &str = "disciplina";
    pub const ORIGIN_COURSE: &str = "disciplina_origem";
    pub const TARGET_COURSE: &str = "disciplina_destino";
    pub const STATUTE: &str = "tipo_estatuto";
    pub const DOCUMENTS: &str = "documentos";
    pub const STATUS: &str = "status";
    pub const MESSAGE: &str = "mensagem";
    pub const APPROVED: &str = "aprovado";
    pub const NO_CONFLICT: &str = "sem_conflito";
    pub const REASON: &str = "motivo";
    pub const CODE: &str = "codigo";
    pub const NOT_FOUND: &str = "nao_encontrado";

    // client-facing kinds
    pub const ENROLLMENT: &str = "inscricao";
    pub const EQUIVALENCE: &str = "equivalencia";
    pub const STATUTE_REQUEST: &str = "estatuto";
    pub const TIMETABLE: &str = "consulta_horario";
    pub const DEBTS: &str = "consulta_dividas";
    pub const STATUTE_INFO: &str = "consulta_estatuto";

    // service-facing kinds
    pub const VERIFY_TUITION: &str = "verificar_propinas";
    pub const LIST_DEBTS: &str = "consultar_dividas";
    pub const VERIFY_CONFLICT: &str = "verificar_conflito";
    pub const LIST_TIMETABLE: &str = "consultar_horario";
    pub const VERIFY_ENROLLMENT: &str = "verificar_inscricao";
    pub const VERIFY_EQUIVALENCE: &str = "verificar_equivalencia";
    pub const VERIFY_STATUTE: &str = "verificar_estatuto";
    pub const DESCRIBE_STATUTE: &str = "consultar_estatuto";

    pub const STATUS_APPROVED: &str = "aprovado";
    pub const STATUS_REJECTED: &str = "recusado";
    pub const STATUS_PENDING: &str = "pendente";
    pub const STATUS_SUCCESS: &str = "sucesso";
    pub const STATUS_ERROR: &str = "erro";

    pub const UNKNOWN_KIND_MESSAGE: &str = "Tipo de pedido desconhecido";
}

pub const FINANCIAL_HOLD_MESSAGE: &str =
    "Propinas em atraso. Regularize a situação antes de se inscrever.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Financial,
    Schedule,
    Academic,
    Regulations,
}

impl ServiceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Financial => "financial",
            ServiceKind::Schedule => "schedule",
            ServiceKind::Academic => "academic",
            ServiceKind::Regulations => "regulations",
        }
    }

    /// Boolean field carrying the decision in this service's check replies.
    pub fn decision_field(&self) -> &'static str {
        match self {
            ServiceKind::Schedule => wire::NO_CONFLICT,
            _ => wire::APPROVED,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    FinancialHold,
    ScheduleConflict,
    AcademicIneligible,
    NotFound,
    Unavailable,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::FinancialHold => "financial_hold",
            ReasonCode::ScheduleConflict => "schedule_conflict",
            ReasonCode::AcademicIneligible => "academic_ineligible",
            ReasonCode::NotFound => "not_found",
            ReasonCode::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub student_id: String,
    pub course_code: String,
}

impl EnrollmentRequest {
    pub fn new(student_id: impl Into<String>, course_code: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            course_code: course_code.into(),
        }
    }

    pub fn financial_check(&self) -> Value {
        json!({
            "tipo": wire::VERIFY_TUITION,
            "estudante_id": self.student_id,
        })
    }

    pub fn schedule_check(&self) -> Value {
        json!({
            "tipo": wire::VERIFY_CONFLICT,
            "estudante_id": self.student_id,
            "disciplina": self.course_code,
        })
    }

    pub fn academic_check(&self) -> Value {
        json!({
            "tipo": wire::VERIFY_ENROLLMENT,
            "estudante_id": self.student_id,
            "disciplina": self.course_code,
        })
    }
}

/// Decoded answer of one rule-check conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCheckResult {
    pub approved: bool,
    pub reason: Option<ReasonCode>,
    pub message: String,
    pub payload: Option<Value>,
}

impl RuleCheckResult {
    /// Decodes a check reply. Anything that is not an object with the
    /// service's boolean decision field is malformed.
    pub fn from_reply(service: ServiceKind, reply: &Value) -> Result<Self, String> {
        let object = reply
            .as_object()
            .ok_or_else(|| "reply is not a JSON object".to_string())?;

        let field = service.decision_field();
        let approved = object
            .get(field)
            .and_then(Value::as_bool)
            .ok_or_else(|| format!("reply has no boolean '{field}'"))?;

        let message = match object.get(wire::MESSAGE) {
            None | Some(Value::Null) => default_message(service, approved).to_string(),
            Some(Value::String(text)) => text.clone(),
            Some(_) => return Err(format!("'{}' is not a string", wire::MESSAGE)),
        };

        let reason = match object.get(wire::CODE).and_then(Value::as_str) {
            Some(wire::NOT_FOUND) => Some(ReasonCode::NotFound),
            _ => None,
        };

        let extra: Map<String, Value> = object
            .iter()
            .filter(|(key, _)| {
                !matches!(key.as_str(), wire::MESSAGE | wire::CODE) && key.as_str() != field
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            approved,
            reason,
            message,
            payload: (!extra.is_empty()).then_some(Value::Object(extra)),
        })
    }
}

fn default_message(service: ServiceKind, approved: bool) -> &'static str {
    match (service, approved) {
        (ServiceKind::Academic, true) => "Inscrição aprovada!",
        (ServiceKind::Academic, false) => "Inscrição recusada",
        (ServiceKind::Schedule, true) => "Sem conflitos de horário",
        (_, true) => "Aprovado",
        (_, false) => "Recusado",
    }
}

/// Terminal outcome of one enrollment orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Approved { message: String },
    Rejected { reason: ReasonCode, message: String },
}

impl Verdict {
    pub fn rejected(reason: ReasonCode, message: impl Into<String>) -> Self {
        Verdict::Rejected {
            reason,
            message: message.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved { .. })
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Verdict::Approved { .. } => None,
            Verdict::Rejected { reason, .. } => Some(*reason),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Verdict::Approved { message } | Verdict::Rejected { message, .. } => message,
        }
    }

    pub fn to_reply(&self) -> Value {
        match self {
            Verdict::Approved { message } => json!({
                "status": wire::STATUS_APPROVED,
                "mensagem": message,
            }),
            Verdict::Rejected { reason, message } => json!({
                "status": wire::STATUS_REJECTED,
                "motivo": reason.as_str(),
                "mensagem": message,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestValidationError {
    #[error("unknown request kind {0:?}")]
    UnknownKind(Option<String>),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{0}' has the wrong type")]
    InvalidField(&'static str),
    #[error("request body is not a JSON object")]
    NotAnObject,
}

impl RequestValidationError {
    pub fn to_reply(&self) -> Value {
        let message = match self {
            RequestValidationError::UnknownKind(_) => wire::UNKNOWN_KIND_MESSAGE.to_string(),
            RequestValidationError::MissingField(field) => {
                format!("Campo obrigatório em falta: {field}")
            }
            RequestValidationError::InvalidField(field) => format!("Campo inválido: {field}"),
            RequestValidationError::NotAnObject => "Pedido inválido".to_string(),
        };
        error_reply(message)
    }
}

/// Requests the coordinator accepts from its own clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Enrollment(EnrollmentRequest),
    Equivalence {
        student_id: String,
        origin: String,
        target: String,
    },
    Statute {
        student_id: String,
        statute: String,
        documents: Vec<String>,
    },
    Timetable {
        student_id: String,
    },
    Debts {
        student_id: String,
    },
    StatuteInfo {
        student_id: String,
        statute: Option<String>,
    },
}

impl ClientRequest {
    pub fn parse(body: &Value) -> Result<Self, RequestValidationError> {
        let object = body
            .as_object()
            .ok_or(RequestValidationError::NotAnObject)?;
        let kind = object.get(wire::KIND).and_then(Value::as_str);

        let request = match kind {
            Some(wire::ENROLLMENT) => ClientRequest::Enrollment(EnrollmentRequest {
                student_id: required_str(object, wire::STUDENT_ID)?,
                course_code: required_str(object, wire::COURSE)?,
            }),
            Some(wire::EQUIVALENCE) => ClientRequest::Equivalence {
                student_id: required_str(object, wire::STUDENT_ID)?,
                origin: required_str(object, wire::ORIGIN_COURSE)?,
                target: required_str(object, wire::TARGET_COURSE)?,
            },
            Some(wire::STATUTE_REQUEST) => ClientRequest::Statute {
                student_id: required_str(object, wire::STUDENT_ID)?,
                statute: required_str(object, wire::STATUTE)?,
                documents: required_str_list(object, wire::DOCUMENTS)?,
            },
            Some(wire::TIMETABLE) => ClientRequest::Timetable {
                student_id: required_str(object, wire::STUDENT_ID)?,
            },
            Some(wire::DEBTS) => ClientRequest::Debts {
                student_id: required_str(object, wire::STUDENT_ID)?,
            },
            Some(wire::STATUTE_INFO) => ClientRequest::StatuteInfo {
                student_id: required_str(object, wire::STUDENT_ID)?,
                statute: optional_str(object, wire::STATUTE)?,
            },
            other => {
                return Err(RequestValidationError::UnknownKind(
                    other.map(str::to_string),
                ))
            }
        };
        Ok(request)
    }

    pub fn student_id(&self) -> &str {
        match self {
            ClientRequest::Enrollment(request) => &request.student_id,
            ClientRequest::Equivalence { student_id, .. }
            | ClientRequest::Statute { student_id, .. }
            | ClientRequest::Timetable { student_id }
            | ClientRequest::Debts { student_id }
            | ClientRequest::StatuteInfo { student_id, .. } => student_id,
        }
    }

    /// Target service and body for requests that bypass orchestration.
    /// Enrollments return `None`.
    pub fn forwarded(&self) -> Option<(ServiceKind, Value)> {
        let forwarded = match self {
            ClientRequest::Enrollment(_) => return None,
            ClientRequest::Equivalence {
                student_id,
                origin,
                target,
            } => (
                ServiceKind::Academic,
                json!({
                    "tipo": wire::VERIFY_EQUIVALENCE,
                    "estudante_id": student_id,
                    "disciplina_origem": origin,
                    "disciplina_destino": target,
                }),
            ),
            ClientRequest::Statute {
                student_id,
                statute,
                documents,
            } => (
                ServiceKind::Regulations,
                json!({
                    "tipo": wire::VERIFY_STATUTE,
                    "estudante_id": student_id,
                    "tipo_estatuto": statute,
                    "documentos": documents,
                }),
            ),
            ClientRequest::Timetable { student_id } => (
                ServiceKind::Schedule,
                json!({
                    "tipo": wire::LIST_TIMETABLE,
                    "estudante_id": student_id,
                }),
            ),
            ClientRequest::Debts { student_id } => (
                ServiceKind::Financial,
                json!({
                    "tipo": wire::LIST_DEBTS,
                    "estudante_id": student_id,
                }),
            ),
            ClientRequest::StatuteInfo {
                student_id,
                statute,
            } => (
                ServiceKind::Regulations,
                json!({
                    "tipo": wire::DESCRIBE_STATUTE,
                    "estudante_id": student_id,
                    "tipo_estatuto": statute,
                }),
            ),
        };
        Some(forwarded)
    }
}

fn required_str(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, RequestValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(RequestValidationError::MissingField(field)),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(RequestValidationError::InvalidField(field)),
    }
}

fn optional_str(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, RequestValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(RequestValidationError::InvalidField(field)),
    }
}

fn required_str_list(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Vec<String>, RequestValidationError> {
    let items = match object.get(field) {
        None | Some(Value::Null) => return Err(RequestValidationError::MissingField(field)),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(RequestValidationError::InvalidField(field)),
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or(RequestValidationError::InvalidField(field))
        })
        .collect()
}

pub fn error_reply(message: impl Into<String>) -> Value {
    json!({
        "status": wire::STATUS_ERROR,
        "mensagem": message.into(),
    })
}

pub fn unknown_kind_reply() -> Value {
    error_reply(wire::UNKNOWN_KIND_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enrollment_request() {
        let body = json!({"tipo": "inscricao", "estudante_id": "20230001", "disciplina": "IA201"});
        assert_eq!(
            ClientRequest::parse(&body).unwrap(),
            ClientRequest::Enrollment(EnrollmentRequest::new("20230001", "IA201"))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_kind_with_protocol_message() {
        let err = ClientRequest::parse(&json!({"tipo": "matricula", "estudante_id": "1"}))
            .unwrap_err();
        assert_eq!(err, RequestValidationError::UnknownKind(Some("matricula".into())));
        assert_eq!(
            err.to_reply(),
            json!({"status": "erro", "mensagem": "Tipo de pedido desconhecido"})
        );
    }

    #[test]
    fn test_parse_reports_missing_and_mistyped_fields() {
        let missing = ClientRequest::parse(&json!({"tipo": "inscricao", "estudante_id": "1"}));
        assert_eq!(missing, Err(RequestValidationError::MissingField("disciplina")));

        let mistyped = ClientRequest::parse(&json!({
            "tipo": "estatuto",
            "estudante_id": "1",
            "tipo_estatuto": "atleta",
            "documentos": "not-a-list"
        }));
        assert_eq!(mistyped, Err(RequestValidationError::InvalidField("documentos")));
    }

    #[test]
    fn test_forwarded_timetable_targets_schedule_service() {
        let request = ClientRequest::parse(&json!({
            "tipo": "consulta_horario",
            "estudante_id": "20230001"
        }))
        .unwrap();
        let (service, body) = request.forwarded().unwrap();
        assert_eq!(service, ServiceKind::Schedule);
        assert_eq!(body["tipo"], "consultar_horario");
    }

    #[test]
    fn test_rule_check_result_decoding() {
        let ok = RuleCheckResult::from_reply(
            ServiceKind::Schedule,
            &json!({"sem_conflito": true, "mensagem": "Sem conflitos de horário"}),
        )
        .unwrap();
        assert!(ok.approved);
        assert_eq!(ok.payload, None);

        let missing = RuleCheckResult::from_reply(
            ServiceKind::Financial,
            &json!({"aprovado": false, "mensagem": "Estudante não encontrado", "codigo": "nao_encontrado"}),
        )
        .unwrap();
        assert_eq!(missing.reason, Some(ReasonCode::NotFound));

        assert!(RuleCheckResult::from_reply(ServiceKind::Financial, &json!({"status": "ok"}))
            .is_err());
        assert!(RuleCheckResult::from_reply(ServiceKind::Academic, &json!("aprovado")).is_err());
    }

    #[test]
    fn test_verdict_reply_shape() {
        let verdict = Verdict::rejected(ReasonCode::FinancialHold, FINANCIAL_HOLD_MESSAGE);
        assert_eq!(
            verdict.to_reply(),
            json!({
                "status": "recusado",
                "motivo": "financial_hold",
                "mensagem": FINANCIAL_HOLD_MESSAGE
            })
        );
    }
}
