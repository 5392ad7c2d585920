//! Matrix resolution, job scheduling and run orchestration for fanout.

pub mod collector;
pub mod controller;
pub mod matrix;
pub mod scheduler;

pub use collector::ResultCollector;
pub use controller::RunController;
pub use matrix::AxisResolver;
pub use scheduler::{ScheduleOptions, Scheduler};
