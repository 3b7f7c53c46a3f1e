pub mod artifact_loader;
pub mod catalog_loader;

pub use artifact_loader::{load_artifact, load_supporting_doc};
pub use catalog_loader::{load_catalog_file, load_workload_answers};
