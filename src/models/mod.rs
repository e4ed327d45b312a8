pub mod order;
pub mod plan;
pub mod product;
