use crate::{
    signal::StopSignal,
    state::{DisplayState, Input},
};
use std::time::{Duration, Instant};

mod dashboard;
mod text;

pub use dashboard::{DashboardOptions, DashboardRenderer};
pub use text::{TextRenderer, TextStyle};

/// Granularity at which waiting renderers re-check the stop signal
pub const WAIT_SLICE: Duration = Duration::from_millis(50);

pub trait Renderer {
    /// Called once per tick with the state to show. This being called doesn't necessarily mean
    /// that the data changed, just that we need to render to the screen.
    fn render(&mut self, state: &DisplayState) -> anyhow::Result<()>;

    /// Blocks until `deadline`, the stop signal, or user input, whichever comes first. Returns the
    /// input if that's what ended the wait.
    fn wait_for_input(
        &mut self,
        deadline: Instant,
        stop: &StopSignal,
    ) -> anyhow::Result<Option<Input>>;

    /// Tears the output surface down. Called exactly once, after the last render.
    fn shutdown(&mut self) -> anyhow::Result<()>;
}

/// Sleeps in [`WAIT_SLICE`] steps until `deadline` or until `stop` is raised.
pub fn sleep_until(deadline: Instant, stop: &StopSignal) {
    loop {
        if stop.is_raised() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        spin_sleep::sleep(WAIT_SLICE.min(deadline - now));
    }
}
