// Domain layer: request-scoped models and ports (interfaces) for external systems.

pub mod model;
pub mod ports;
