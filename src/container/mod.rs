pub mod loader;

pub use loader::{load_container, validate_container, ContainerError, ContainerLoader};
