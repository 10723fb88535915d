pub mod constructor;
pub mod cooperative;
pub mod plan;
pub mod stop;
