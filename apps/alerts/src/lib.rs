pub mod config;
pub mod monitor;
pub mod notifier;
pub mod timer;

pub use monitor::{
    Command, CyclePolicy, CycleReport, Monitor, MonitorHandle, MonitorState, Pipeline,
};
