pub mod catalog;
pub mod export;
pub mod pool;

pub use catalog::{load_active_catalog, load_catalog_csv, read_catalog_csv};
pub use export::{reports_to_csv, write_reports_csv};
pub use pool::create_pool;
