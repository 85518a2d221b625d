use super::{decode, lookup_not_found, not_found, COURSE_NOT_FOUND, STUDENT_NOT_FOUND};
use crate::core::schedule::ConflictDetector;
use crate::domain::messages::{wire, ServiceKind};
use crate::domain::model::SharedCatalog;
use crate::domain::ports::RuleService;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(tag = "tipo")]
enum ScheduleRequest {
    #[serde(rename = "verificar_conflito")]
    VerifyConflict {
        #[serde(rename = "estudante_id")]
        student_id: String,
        #[serde(rename = "disciplina")]
        course: String,
    },
    #[serde(rename = "consultar_horario")]
    ListTimetable {
        #[serde(rename = "estudante_id")]
        student_id: String,
    },
}

/// Timetable clashes and weekly timetables.
pub struct ScheduleService {
    catalog: SharedCatalog,
    detector: ConflictDetector,
}

impl ScheduleService {
    pub fn new(catalog: SharedCatalog, detector: ConflictDetector) -> Self {
        Self { catalog, detector }
    }

    fn verify_conflict(&self, student_id: &str, course_code: &str) -> Value {
        tracing::info!("⏰ Checking timetable conflicts: {} -> {}", student_id, course_code);

        let Some(student) = self.catalog.student(student_id) else {
            return not_found(wire::NO_CONFLICT, STUDENT_NOT_FOUND);
        };
        let Some(candidate) = self.catalog.course(course_code) else {
            return not_found(wire::NO_CONFLICT, COURSE_NOT_FOUND);
        };

        // re-requesting an enrolled course is the academic check's call, not a clash
        let enrolled = self
            .catalog
            .enrolled_courses(student)
            .filter(|course| course.code != candidate.code);

        match self.detector.first_conflict(candidate, enrolled) {
            Some(conflict) => {
                tracing::debug!(
                    student = student_id,
                    course = course_code,
                    "Clash: {} overlaps {} ({})",
                    conflict.candidate_slot,
                    conflict.existing_slot,
                    conflict.course.code
                );
                json!({
                    "sem_conflito": false,
                    "mensagem": format!("Conflito com {} ({})", conflict.course.name, conflict.course.code),
                })
            }
            None => json!({
                "sem_conflito": true,
                "mensagem": "Sem conflitos de horário",
            }),
        }
    }

    fn list_timetable(&self, student_id: &str) -> Value {
        tracing::info!("📋 Listing timetable: {}", student_id);

        let Some(student) = self.catalog.student(student_id) else {
            return lookup_not_found(STUDENT_NOT_FOUND);
        };

        let entries: Vec<Value> = self
            .catalog
            .enrolled_courses(student)
            .map(|course| {
                json!({
                    "codigo": course.code,
                    "nome": course.name,
                    "horario": course.schedule_spec,
                })
            })
            .collect();

        if entries.is_empty() {
            json!({
                "status": wire::STATUS_SUCCESS,
                "mensagem": "Sem disciplinas inscritas",
                "horarios": entries,
            })
        } else {
            json!({
                "status": wire::STATUS_SUCCESS,
                "horarios": entries,
            })
        }
    }
}

#[async_trait]
impl RuleService for ScheduleService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Schedule
    }

    async fn handle(&self, request: &Value) -> Value {
        let request = match decode::<ScheduleRequest>(
            request,
            &[wire::VERIFY_CONFLICT, wire::LIST_TIMETABLE],
        ) {
            Ok(request) => request,
            Err(reply) => return reply,
        };

        match request {
            ScheduleRequest::VerifyConflict { student_id, course } => {
                self.verify_conflict(&student_id, &course)
            }
            ScheduleRequest::ListTimetable { student_id } => self.list_timetable(&student_id),
        }
    }
}
