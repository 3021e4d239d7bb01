pub mod model;
pub mod repository;
pub mod service;

pub use model::{ColumnKind, ColumnSpec, FilterSpec, Workboard, WorkboardPage};
pub use repository::{WorkboardInput, WorkboardRepository};
pub use service::WorkboardService;
