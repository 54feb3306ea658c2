pub mod path;
pub mod walk;

pub use walk::{DiscoveredFile, VolumeWalker, WalkEntry};
