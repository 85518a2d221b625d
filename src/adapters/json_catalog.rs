use crate::domain::model::{Catalog, CourseRecord, StatuteRecord, StudentRecord};
use crate::utils::error::{RegistrarError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Locations of the three registrar data files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPaths {
    pub courses: PathBuf,
    pub students: PathBuf,
    pub statutes: PathBuf,
}

impl CatalogPaths {
    /// `cursos.json`, `estudantes.json` and `estatutos.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            courses: dir.join("cursos.json"),
            students: dir.join("estudantes.json"),
            statutes: dir.join("estatutos.json"),
        }
    }
}

#[derive(Deserialize)]
struct CoursesFile {
    cursos: Vec<CourseRecord>,
}

#[derive(Deserialize)]
struct StudentsFile {
    estudantes: Vec<StudentRecord>,
}

#[derive(Deserialize)]
struct StatutesFile {
    #[serde(default)]
    estatutos: Vec<StatuteRecord>,
}

fn parse<T: DeserializeOwned>(source_name: &str, content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| RegistrarError::CatalogError {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| RegistrarError::CatalogError {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Builds a catalog from the three documents' contents.
pub fn catalog_from_json(courses: &str, students: &str, statutes: &str) -> Result<Catalog> {
    let courses: CoursesFile = parse("courses", courses)?;
    let students: StudentsFile = parse("students", students)?;
    let statutes: StatutesFile = parse("statutes", statutes)?;

    Ok(Catalog::new(
        students.estudantes,
        courses.cursos,
        statutes.estatutos,
    ))
}

/// Reads the data files once. The statutes file is optional.
pub fn load_catalog(paths: &CatalogPaths) -> Result<Catalog> {
    let courses = read(&paths.courses)?;
    let students = read(&paths.students)?;
    let statutes = if paths.statutes.exists() {
        read(&paths.statutes)?
    } else {
        tracing::warn!(
            "Statutes file {} not found, no statutes loaded",
            paths.statutes.display()
        );
        r#"{"estatutos": []}"#.to_string()
    };

    let catalog = catalog_from_json(&courses, &students, &statutes)?;
    tracing::info!(
        "📚 Catalog loaded: {} courses, {} students, {} statutes",
        catalog.course_count(),
        catalog.student_count(),
        catalog.statutes().len()
    );
    Ok(catalog)
}
