pub mod clock;
pub mod ids;
pub mod telemetry;
pub mod types;

pub use clock::*;
pub use ids::*;
pub use telemetry::*;
pub use types::*;
