mod service;

pub use service::{CycleReport, FetchScheduler, SchedulerEvent};
