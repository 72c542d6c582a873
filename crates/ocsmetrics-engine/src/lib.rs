// Engine - pure computation over a materialized session/message set
// No I/O happens here: the runtime fetches, this layer filters, classifies
// and aggregates.

mod aggregator;
mod classifier;
mod dataset;
mod error;
mod filter;

pub use aggregator::aggregate;
pub use classifier::{
    Classifications, Classifier, ClassifiedSession, is_version_tag, normalize_version_tag,
};
pub use dataset::Dataset;
pub use error::{AggregationError, Error, Result, UnknownVersionError};
pub use filter::{VersionCatalog, VersionFilter, build_filter, resolve_versions};
