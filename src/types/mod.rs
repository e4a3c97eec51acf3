mod field_type;
mod models;

pub use field_type::{CustomFieldType, FilterLogic};
pub use models::*;
