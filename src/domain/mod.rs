// Domain layer: models and ports shared by the core algorithms and the adapters.

pub mod model;
pub mod ports;
