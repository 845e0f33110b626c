//! Scoped analog task ownership.

use rc_core::device::{AnalogTask, AnalogTaskConfig, ChannelData, Device, ReadCount};
use rc_core::error::RigResult;
use tracing::{debug, warn};

/// An open analog task that is stopped and closed on every exit path.
///
/// [`TaskGuard::release`] tears the task down and reports driver errors.
/// Dropping the guard without releasing does the same teardown and logs
/// any error instead.
pub struct TaskGuard {
    task: Box<dyn AnalogTask>,
    released: bool,
}

impl TaskGuard {
    /// Open a task from `config`.
    pub fn open(device: &dyn Device, config: &AnalogTaskConfig) -> RigResult<Self> {
        let task = device.open_analog_task(config)?;
        Ok(Self { task, released: false })
    }

    /// Start the sample clock.
    pub fn start(&mut self) -> RigResult<()> {
        self.task.start()?;
        Ok(())
    }

    /// Read and split into the four ADC channels.
    pub fn read(&mut self, count: ReadCount) -> RigResult<ChannelData> {
        let raw = self.task.read(count)?;
        ChannelData::try_from(raw)
    }

    /// Stop and close the task. Both steps run even if stopping fails.
    pub fn release(mut self) -> RigResult<()> {
        self.released = true;
        let stopped = self.task.stop();
        let closed = self.task.close();
        stopped.and(closed)?;
        debug!("Analog task released");
        Ok(())
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.task.stop() {
            warn!(error = %err, "Failed to stop analog task during cleanup");
        }
        if let Err(err) = self.task.close() {
            warn!(error = %err, "Failed to close analog task during cleanup");
        }
    }
}

impl std::fmt::Debug for TaskGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGuard").field("released", &self.released).finish()
    }
}
