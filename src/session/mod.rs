pub mod coordinator;
pub mod events;
pub mod loop_worker;

pub use coordinator::SessionCoordinator;
pub use events::SessionEvent;
