pub mod bus_service;
pub mod clock;
pub mod control_service;
pub mod state_store;
pub mod topic_router;
pub mod watchdog;

pub use bus_service::{BusEventHandler, BusService, MessageOutcome, Publisher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use control_service::ControlService;
pub use state_store::StateStore;
pub use watchdog::Watchdog;
