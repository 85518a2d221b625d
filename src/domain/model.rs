use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "creditos", default)]
    pub credits: u32,
    #[serde(rename = "prerequisitos", default)]
    pub prerequisites: Vec<String>,
    #[serde(rename = "vagas", default)]
    pub capacity: i64,
    #[serde(rename = "horario", default)]
    pub schedule_spec: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "disciplinas_inscritas", default)]
    pub enrolled_courses: Vec<String>,
    #[serde(rename = "disciplinas_completas", default)]
    pub completed_courses: Vec<String>,
    #[serde(rename = "propinas_em_atraso", default)]
    pub financial_hold: bool,
    #[serde(rename = "estatuto", default)]
    pub statute: Option<String>,
}

impl StudentRecord {
    pub fn is_enrolled_in(&self, code: &str) -> bool {
        self.enrolled_courses.iter().any(|c| c == code)
    }

    pub fn has_completed(&self, code: &str) -> bool {
        self.completed_courses.iter().any(|c| c == code)
    }
}

/// Special student status (working student, athlete, ...) and what it takes to get it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatuteRecord {
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "requisitos", default)]
    pub requirements: Vec<String>,
    #[serde(rename = "beneficios", default)]
    pub benefits: Vec<String>,
}

/// Read-only snapshot of the registrar dataset.
///
/// Services receive it as a [`SharedCatalog`] at construction time and never
/// mutate it. A later write path (committing enrollments, taking seats) needs
/// its own owner; this type stays immutable.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    students: HashMap<String, StudentRecord>,
    courses: HashMap<String, CourseRecord>,
    statutes: Vec<StatuteRecord>,
}

pub type SharedCatalog = Arc<Catalog>;

impl Catalog {
    pub fn new(
        students: Vec<StudentRecord>,
        courses: Vec<CourseRecord>,
        statutes: Vec<StatuteRecord>,
    ) -> Self {
        Self {
            students: students.into_iter().map(|s| (s.id.clone(), s)).collect(),
            courses: courses.into_iter().map(|c| (c.code.clone(), c)).collect(),
            statutes,
        }
    }

    pub fn student(&self, id: &str) -> Option<&StudentRecord> {
        self.students.get(id)
    }

    pub fn course(&self, code: &str) -> Option<&CourseRecord> {
        self.courses.get(code)
    }

    pub fn statute(&self, kind: &str) -> Option<&StatuteRecord> {
        self.statutes.iter().find(|s| s.kind == kind)
    }

    pub fn statutes(&self) -> &[StatuteRecord] {
        &self.statutes
    }

    /// Courses a student is currently enrolled in that exist in the catalog.
    pub fn enrolled_courses<'a>(
        &'a self,
        student: &'a StudentRecord,
    ) -> impl Iterator<Item = &'a CourseRecord> + 'a {
        student
            .enrolled_courses
            .iter()
            .filter_map(move |code| self.course(code))
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn course_count(&self) -> usize {
        self.courses.len()
    }
}
