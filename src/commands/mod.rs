pub mod backend;
pub mod categorize;
pub mod model;
