pub mod context;
pub mod optimizer;
pub mod planner;
