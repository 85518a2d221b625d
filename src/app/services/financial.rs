use super::{decode, lookup_not_found, not_found, STUDENT_NOT_FOUND};
use crate::domain::messages::{wire, ServiceKind};
use crate::domain::model::SharedCatalog;
use crate::domain::ports::RuleService;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(tag = "tipo")]
enum FinancialRequest {
    #[serde(rename = "verificar_propinas")]
    VerifyTuition {
        #[serde(rename = "estudante_id")]
        student_id: String,
    },
    #[serde(rename = "consultar_dividas")]
    ListDebts {
        #[serde(rename = "estudante_id")]
        student_id: String,
    },
}

/// Tuition standing of a student.
pub struct FinancialService {
    catalog: SharedCatalog,
}

impl FinancialService {
    pub fn new(catalog: SharedCatalog) -> Self {
        Self { catalog }
    }

    fn verify_tuition(&self, student_id: &str) -> Value {
        tracing::info!("💳 Checking tuition standing: {}", student_id);

        let Some(student) = self.catalog.student(student_id) else {
            return not_found(wire::APPROVED, STUDENT_NOT_FOUND);
        };

        if student.financial_hold {
            json!({
                "aprovado": false,
                "mensagem": "Estudante tem propinas em atraso. Deve regularizar a situação.",
            })
        } else {
            json!({
                "aprovado": true,
                "mensagem": "Situação financeira regularizada",
            })
        }
    }

    fn list_debts(&self, student_id: &str) -> Value {
        tracing::info!("📊 Listing debts: {}", student_id);

        let Some(student) = self.catalog.student(student_id) else {
            return lookup_not_found(STUDENT_NOT_FOUND);
        };

        if student.financial_hold {
            json!({
                "status": wire::STATUS_SUCCESS,
                "tem_dividas": true,
                "mensagem": "Estudante tem propinas em atraso",
                "detalhes": {"tipo": "propinas", "status": "em atraso"},
            })
        } else {
            json!({
                "status": wire::STATUS_SUCCESS,
                "tem_dividas": false,
                "mensagem": "Sem dívidas pendentes",
            })
        }
    }
}

#[async_trait]
impl RuleService for FinancialService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Financial
    }

    async fn handle(&self, request: &Value) -> Value {
        let request = match decode::<FinancialRequest>(request, &[wire::VERIFY_TUITION, wire::LIST_DEBTS]) {
            Ok(request) => request,
            Err(reply) => return reply,
        };

        match request {
            FinancialRequest::VerifyTuition { student_id } => self.verify_tuition(&student_id),
            FinancialRequest::ListDebts { student_id } => self.list_debts(&student_id),
        }
    }
}
