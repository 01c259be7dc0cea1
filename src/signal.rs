use anyhow::Context;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative stop flag shared between the Ctrl+C handler and the refresh loop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> StopSignal {
        StopSignal::default()
    }

    /// Registers a process-wide Ctrl+C handler that raises this signal. Can only be called once
    /// per process.
    pub fn install_ctrlc_handler(&self) -> anyhow::Result<()> {
        let raised = self.raised.clone();
        ctrlc::set_handler(move || raised.store(true, Ordering::SeqCst))
            .context("failed to install the Ctrl+C handler")
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
