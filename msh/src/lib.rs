pub mod process;

pub use process::{Job, JobTable, Process};
