pub mod job_state;
pub mod memory_job_state;
pub mod sqlite_job_state;
