/// Record mapping: row value bags, entity translation and repositories.

pub mod entity;
pub mod map_values;
pub mod repository;

pub use entity::{validate_metadata, Entity};
pub use map_values::MapValues;
pub use repository::{Repositories, Repository};
