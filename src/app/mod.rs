pub mod registrar;
pub mod services;

pub use registrar::{Registrar, RegistrarBuilder, RegistrarSettings};
