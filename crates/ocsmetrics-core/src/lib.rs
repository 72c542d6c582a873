pub mod config;
pub mod error;
pub mod fingerprint;
pub mod path;

pub use config::{
    CacheBackendKind, CacheSettings, ClassifierSettings, FetchSettings, RunConfig,
    DEFAULT_API_BASE_URL,
};
pub use error::{Error, Result};
pub use fingerprint::{FetchScope, FilterFingerprint, Upstream, fingerprint};
pub use path::{expand_tilde, resolve_workspace_path};
