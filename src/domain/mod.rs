// Domain layer: records, wire payloads and the ports the pipeline talks through.

pub mod model;
pub mod payload;
pub mod ports;
