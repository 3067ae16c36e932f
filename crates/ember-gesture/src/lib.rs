pub mod scroll;
pub mod swipe;

pub use ember_types::SwipeDirection;
pub use scroll::{PagedRow, ScrollBehavior, ScrollTarget};
pub use swipe::{SwipeConfig, SwipeEngine, SwipeHandler, SwipeSession};
