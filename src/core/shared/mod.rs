pub mod enums;
pub mod error;
pub mod extract;
pub mod query;
pub mod schema;
pub mod state;
pub mod utils;

pub use enums::*;
pub use error::{ApiError, ApiResult};
