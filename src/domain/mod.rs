//! Client-side domain model
pub mod aggregates;
pub mod events;
pub mod state;
pub mod value_objects;
