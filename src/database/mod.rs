pub mod manager;
pub mod rows;
