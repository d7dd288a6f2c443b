pub mod catalog;
pub mod order;
pub mod product;
pub mod task_result;
pub mod user;

pub use catalog::{Category, Tag};
pub use order::{CreateOrderInput, CreateOrderPayload, Order, OrderProduct};
pub use product::{PaginatedProducts, Product, ProductPayload};
pub use task_result::TaskResult;
pub use user::User;
