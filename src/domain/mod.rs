// Domain layer: identifiers, curriculum input records and ports. No I/O here.

pub mod model;
pub mod plan_description;
pub mod ports;
