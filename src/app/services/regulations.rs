use super::{decode, STUDENT_NOT_FOUND};
use crate::domain::messages::{wire, ServiceKind};
use crate::domain::model::{SharedCatalog, StatuteRecord};
use crate::domain::ports::RuleService;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(tag = "tipo")]
enum RegulationsRequest {
    #[serde(rename = "verificar_estatuto")]
    VerifyStatute {
        #[serde(rename = "estudante_id")]
        student_id: String,
        #[serde(rename = "tipo_estatuto")]
        statute: String,
        #[serde(rename = "documentos", default)]
        documents: Vec<String>,
    },
    #[serde(rename = "consultar_estatuto")]
    DescribeStatute {
        #[serde(rename = "tipo_estatuto", default)]
        statute: Option<String>,
    },
}

/// Special statute applications (working student, athlete, ...).
pub struct RegulationsService {
    catalog: SharedCatalog,
}

/// Requirements not covered by any submitted document. A requirement is met
/// when some document mentions it, ignoring case.
fn missing_requirements<'a>(statute: &'a StatuteRecord, documents: &[String]) -> Vec<&'a str> {
    let documents: Vec<String> = documents.iter().map(|d| d.to_lowercase()).collect();
    statute
        .requirements
        .iter()
        .filter(|requirement| {
            let requirement = requirement.to_lowercase();
            !documents.iter().any(|document| document.contains(&requirement))
        })
        .map(String::as_str)
        .collect()
}

fn describe(statute: &StatuteRecord) -> Value {
    json!({
        "tipo": statute.kind,
        "requisitos": statute.requirements,
        "beneficios": statute.benefits,
    })
}

impl RegulationsService {
    pub fn new(catalog: SharedCatalog) -> Self {
        Self { catalog }
    }

    fn verify_statute(&self, student_id: &str, statute_kind: &str, documents: &[String]) -> Value {
        tracing::info!("📋 Checking statute application: {} -> {}", student_id, statute_kind);

        let Some(student) = self.catalog.student(student_id) else {
            return json!({
                "status": wire::STATUS_REJECTED,
                "mensagem": STUDENT_NOT_FOUND,
                "codigo": wire::NOT_FOUND,
            });
        };

        match student.statute.as_deref() {
            Some(current) if current == statute_kind => {
                return json!({
                    "status": wire::STATUS_APPROVED,
                    "mensagem": format!("Estudante já tem estatuto de {statute_kind}"),
                });
            }
            Some(current) => {
                return json!({
                    "status": wire::STATUS_REJECTED,
                    "mensagem": format!(
                        "Estudante já tem estatuto de {current}. Deve cancelar antes de solicitar novo."
                    ),
                });
            }
            None => {}
        }

        let Some(statute) = self.catalog.statute(statute_kind) else {
            return json!({
                "status": wire::STATUS_REJECTED,
                "mensagem": format!("Tipo de estatuto '{statute_kind}' não encontrado"),
            });
        };

        let missing = missing_requirements(statute, documents);
        if !missing.is_empty() {
            return json!({
                "status": wire::STATUS_PENDING,
                "mensagem": format!("Documentos em falta: {}", missing.join(", ")),
                "requisitos_faltantes": missing,
            });
        }

        json!({
            "status": wire::STATUS_APPROVED,
            "mensagem": format!("Estatuto de {statute_kind} aprovado!"),
            "beneficios": statute.benefits,
        })
    }

    fn describe_statute(&self, statute_kind: Option<&str>) -> Value {
        tracing::info!("ℹ️ Describing statute: {}", statute_kind.unwrap_or("*"));

        let Some(kind) = statute_kind else {
            let statutes: Vec<Value> = self.catalog.statutes().iter().map(describe).collect();
            return json!({
                "status": wire::STATUS_SUCCESS,
                "estatutos": statutes,
            });
        };

        match self.catalog.statute(kind) {
            Some(statute) => {
                let mut reply = describe(statute);
                reply["status"] = json!(wire::STATUS_SUCCESS);
                reply
            }
            None => json!({
                "status": wire::STATUS_ERROR,
                "mensagem": format!("Estatuto '{kind}' não encontrado"),
                "codigo": wire::NOT_FOUND,
            }),
        }
    }
}

#[async_trait]
impl RuleService for RegulationsService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Regulations
    }

    async fn handle(&self, request: &Value) -> Value {
        let request = match decode::<RegulationsRequest>(
            request,
            &[wire::VERIFY_STATUTE, wire::DESCRIBE_STATUTE],
        ) {
            Ok(request) => request,
            Err(reply) => return reply,
        };

        match request {
            RegulationsRequest::VerifyStatute {
                student_id,
                statute,
                documents,
            } => self.verify_statute(&student_id, &statute, &documents),
            RegulationsRequest::DescribeStatute { statute } => {
                self.describe_statute(statute.as_deref())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::fixtures;

    fn apply(student: &str, statute: &str, documents: &[&str]) -> Value {
        json!({
            "tipo": "verificar_estatuto",
            "estudante_id": student,
            "tipo_estatuto": statute,
            "documentos": documents,
        })
    }

    #[tokio::test]
    async fn test_statute_approved_when_documents_cover_requirements() {
        let service = RegulationsService::new(fixtures::catalog());
        let reply = service
            .handle(&apply(
                "20230001",
                "estudante-trabalhador",
                &["contrato de trabalho assinado.pdf", "DECLARAÇÃO DA ENTIDADE EMPREGADORA"],
            ))
            .await;

        assert_eq!(reply["status"], "aprovado");
        assert_eq!(reply["mensagem"], "Estatuto de estudante-trabalhador aprovado!");
        assert_eq!(reply["beneficios"], json!(["Época especial de exames"]));
    }

    #[tokio::test]
    async fn test_statute_pending_lists_missing_requirements() {
        let service = RegulationsService::new(fixtures::catalog());
        let reply = service
            .handle(&apply("20230001", "estudante-trabalhador", &["Contrato de trabalho"]))
            .await;

        assert_eq!(reply["status"], "pendente");
        assert_eq!(
            reply["requisitos_faltantes"],
            json!(["Declaração da entidade empregadora"])
        );
    }

    #[tokio::test]
    async fn test_existing_statute_decides_early() {
        let service = RegulationsService::new(fixtures::catalog());

        let same = service.handle(&apply("20230003", "atleta", &[])).await;
        assert_eq!(same["status"], "aprovado");

        let other = service
            .handle(&apply("20230003", "estudante-trabalhador", &[]))
            .await;
        assert_eq!(other["status"], "recusado");
        assert_eq!(
            other["mensagem"],
            "Estudante já tem estatuto de atleta. Deve cancelar antes de solicitar novo."
        );
    }

    #[tokio::test]
    async fn test_unknown_statute_is_refused() {
        let service = RegulationsService::new(fixtures::catalog());
        let reply = service.handle(&apply("20230001", "astronauta", &[])).await;
        assert_eq!(reply["status"], "recusado");
    }

    #[tokio::test]
    async fn test_describe_statutes() {
        let service = RegulationsService::new(fixtures::catalog());

        let all = service
            .handle(&json!({"tipo": "consultar_estatuto", "estudante_id": "20230001"}))
            .await;
        assert_eq!(all["estatutos"].as_array().map(Vec::len), Some(2));

        let one = service
            .handle(&json!({"tipo": "consultar_estatuto", "tipo_estatuto": "atleta"}))
            .await;
        assert_eq!(one["status"], "sucesso");
        assert_eq!(one["requisitos"], json!(["Declaração da federação"]));

        let missing = service
            .handle(&json!({"tipo": "consultar_estatuto", "tipo_estatuto": "astronauta"}))
            .await;
        assert_eq!(missing["status"], "erro");
    }
}
