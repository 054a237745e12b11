//! nosql-params - deferred parameter binding for NoSQL query values

pub mod config;
pub mod error;
pub mod params;
pub mod query;
pub mod value;

pub use config::BindConfig;
pub use error::{FixSuggestion, ParamError};
pub use params::{Param, Params};
pub use query::{Query, QueryCache};
pub use value::{FromValue, Value, ValueType};
