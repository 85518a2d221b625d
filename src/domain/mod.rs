// Domain layer: records, wire messages and ports. Nothing here depends on tokio.

pub mod messages;
pub mod model;
pub mod ports;
