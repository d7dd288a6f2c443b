pub mod catalog_use_case;
pub mod order_use_case;
pub mod ports;
pub mod user_use_case;

pub use catalog_use_case::{CatalogUseCase, ProductChanges, ProductInput, ProductPage};
pub use order_use_case::OrderUseCase;
pub use user_use_case::UserUseCase;
