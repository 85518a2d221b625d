pub mod orchestrator;
pub mod schedule;
pub mod transport;

pub use orchestrator::{Coordinator, CoordinatorSettings, EnrollmentStage, StepFailure};
pub use schedule::{ConflictDetector, ParseMode, TimeSlot, Weekday};
pub use transport::{Address, Conversations, Mailbox, ServiceDirectory, TransportError};
