pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::RegistrarConfig;

pub use app::{Registrar, RegistrarBuilder, RegistrarSettings};
pub use crate::core::{Coordinator, CoordinatorSettings, ParseMode};
pub use domain::messages::{EnrollmentRequest, ReasonCode, Verdict};
pub use utils::error::{RegistrarError, Result};
