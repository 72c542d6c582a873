mod classification;
mod ids;
mod message;
mod metrics;
mod session;
mod version;

pub use classification::*;
pub use ids::*;
pub use message::*;
pub use metrics::*;
pub use session::*;
pub use version::*;
