//! Compound file writing.
//!
//! The writer assembles a fresh version 3 container from a caller-supplied
//! map of stream paths to bytes. Layout planning is deterministic: the
//! same input always serializes to the same output.

/// Directory tree construction
mod directory;

/// Mini stream packing for small streams
mod ministream;

/// Sector layout planning
mod sectors;

/// Container header serialization
mod header;

/// Container assembly
mod container;


pub use container::ContainerBuilder;
