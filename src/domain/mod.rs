// Domain layer: entity models and ports (interfaces). No accounting logic here.

pub mod model;
pub mod ports;
