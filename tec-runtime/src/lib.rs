mod rt_thread;
pub mod controller;
pub mod message_handler;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod state_manager;

pub use controller::{ControllerError, CycleController, TickTime};
pub use message_handler::{ChannelSeries, ControlMessage, RunSnapshot, RuntimeSettings};
pub use runtime::{run_runtime, spawn_runtime, SNAPSHOT_BACKLOG};
pub use scheduler::{compensated_delay, TickTimers};
pub use service::BenchService;
pub use state_manager::{PowerPhase, RunState, RunStatus};
