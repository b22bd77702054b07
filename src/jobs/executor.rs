use std::io;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted job bodies off the submitter's thread.
pub trait Executor: Send + Sync {
    /// Start `task`. An `Err` means the task was dropped without running.
    fn execute(&self, name: String, task: Task) -> io::Result<()>;
}

/// One named OS thread per job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, name: String, task: Task) -> io::Result<()> {
        std::thread::Builder::new().name(name).spawn(task)?;
        Ok(())
    }
}
