mod auth_extractor;
mod tracing_layer;
mod metrics_layer;
mod validated_json;

pub use auth_extractor::*;
pub use tracing_layer::*;
pub use metrics_layer::*;
pub use validated_json::*;
