pub mod actuator_metrics;

pub use actuator_metrics::*;
