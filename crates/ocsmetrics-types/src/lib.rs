pub mod domain;
pub mod error;
pub mod fetch;
pub mod page;
pub mod wire;

pub use domain::*;
pub use error::{Error, Result};
pub use fetch::{FetchError, FetchErrorKind};
pub use page::{Cursor, Page, ResourceKind};
