pub mod collection;
pub mod dynamodb;
pub mod errors;
pub mod memory;
pub mod models;
pub mod repositories;

pub use collection::*;
pub use dynamodb::*;
pub use errors::*;
pub use memory::*;
pub use repositories::*;
