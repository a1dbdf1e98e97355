pub mod coordinator;
pub mod detector;

pub use coordinator::{run_cycle, CycleReport, Notifier, SheetStore};
