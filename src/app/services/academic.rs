use super::{decode, not_found, COURSE_NOT_FOUND, STUDENT_NOT_FOUND};
use crate::domain::messages::{wire, ServiceKind};
use crate::domain::model::SharedCatalog;
use crate::domain::ports::RuleService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_MAX_CREDITS: u32 = 30;
pub const DEFAULT_EQUIVALENCE_RATIO: f64 = 0.8;

/// Tunable limits of the academic regulations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcademicRules {
    pub max_credits_per_semester: u32,
    /// Share of the target course's credits the origin course must carry.
    pub equivalence_credit_ratio: f64,
}

impl Default for AcademicRules {
    fn default() -> Self {
        Self {
            max_credits_per_semester: DEFAULT_MAX_CREDITS,
            equivalence_credit_ratio: DEFAULT_EQUIVALENCE_RATIO,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "tipo")]
enum AcademicRequest {
    #[serde(rename = "verificar_inscricao")]
    VerifyEnrollment {
        #[serde(rename = "estudante_id")]
        student_id: String,
        #[serde(rename = "disciplina")]
        course: String,
    },
    #[serde(rename = "verificar_equivalencia")]
    VerifyEquivalence {
        #[serde(rename = "estudante_id")]
        student_id: String,
        #[serde(rename = "disciplina_origem")]
        origin: String,
        #[serde(rename = "disciplina_destino")]
        target: String,
    },
}

/// Prerequisites, seats, credit ceiling and course equivalences.
pub struct AcademicService {
    catalog: SharedCatalog,
    rules: AcademicRules,
}

fn refuse(message: impl Into<String>) -> Value {
    json!({"aprovado": false, "mensagem": message.into()})
}

impl AcademicService {
    pub fn new(catalog: SharedCatalog, rules: AcademicRules) -> Self {
        Self { catalog, rules }
    }

    fn verify_enrollment(&self, student_id: &str, course_code: &str) -> Value {
        tracing::info!("🎓 Checking enrollment rules: {} -> {}", student_id, course_code);

        let Some(student) = self.catalog.student(student_id) else {
            return not_found(wire::APPROVED, STUDENT_NOT_FOUND);
        };
        let Some(course) = self.catalog.course(course_code) else {
            return not_found(wire::APPROVED, COURSE_NOT_FOUND);
        };

        if student.is_enrolled_in(course_code) {
            return refuse("Já está inscrito nesta disciplina");
        }
        if student.has_completed(course_code) {
            return refuse("Já completou esta disciplina");
        }

        let missing: Vec<&str> = course
            .prerequisites
            .iter()
            .filter(|code| !student.has_completed(code))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return refuse(format!("Faltam pré-requisitos: {}", missing.join(", ")));
        }

        if course.capacity <= 0 {
            return refuse("Não há vagas disponíveis");
        }

        let current: u64 = self
            .catalog
            .enrolled_courses(student)
            .map(|enrolled| u64::from(enrolled.credits))
            .sum();
        let max = self.rules.max_credits_per_semester;
        if current + u64::from(course.credits) > u64::from(max) {
            return refuse(format!(
                "Excede o limite de {max} créditos por semestre (atual: {current}, novo: {})",
                course.credits
            ));
        }

        json!({
            "aprovado": true,
            "mensagem": format!("Inscrição aprovada em {} ({} créditos)", course.name, course.credits),
        })
    }

    fn verify_equivalence(&self, student_id: &str, origin_code: &str, target_code: &str) -> Value {
        tracing::info!("🔄 Checking equivalence: {} -> {}", origin_code, target_code);

        let refused = |message: String| {
            json!({"status": wire::STATUS_REJECTED, "mensagem": message})
        };

        let Some(student) = self.catalog.student(student_id) else {
            return json!({
                "status": wire::STATUS_REJECTED,
                "mensagem": STUDENT_NOT_FOUND,
                "codigo": wire::NOT_FOUND,
            });
        };
        if !student.has_completed(origin_code) {
            return refused(format!("Não completou a disciplina {origin_code}"));
        }

        let (Some(origin), Some(target)) = (
            self.catalog.course(origin_code),
            self.catalog.course(target_code),
        ) else {
            return refused("Uma das disciplinas não foi encontrada".to_string());
        };

        let required = f64::from(target.credits) * self.rules.equivalence_credit_ratio;
        if f64::from(origin.credits) < required {
            return refused(format!(
                "Créditos insuficientes (origem: {}, necessário: {:.1})",
                origin.credits, required
            ));
        }

        json!({
            "status": wire::STATUS_APPROVED,
            "mensagem": format!("Equivalência aprovada: {} ≈ {}", origin.name, target.name),
        })
    }
}

#[async_trait]
impl RuleService for AcademicService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Academic
    }

    async fn handle(&self, request: &Value) -> Value {
        let request = match decode::<AcademicRequest>(
            request,
            &[wire::VERIFY_ENROLLMENT, wire::VERIFY_EQUIVALENCE],
        ) {
            Ok(request) => request,
            Err(reply) => return reply,
        };

        match request {
            AcademicRequest::VerifyEnrollment { student_id, course } => {
                self.verify_enrollment(&student_id, &course)
            }
            AcademicRequest::VerifyEquivalence {
                student_id,
                origin,
                target,
            } => self.verify_equivalence(&student_id, &origin, &target),
        }
    }
}
