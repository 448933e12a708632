// Domain layer: headcount models and the ports the core talks to.
// Only std, serde, chrono and chrono-tz here; HTTP and file details live in adapters.

pub mod model;
pub mod ports;
