pub mod coordinator;
pub mod overlay;
pub mod sweep;
pub mod workflow;

pub use coordinator::ReservationCoordinator;
pub use overlay::{OverlayMark, SlotOverlay};
pub use sweep::HoldSweeper;
pub use workflow::{BookingWorkflow, WorkflowError, WorkflowState};
