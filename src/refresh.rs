use crate::{
    renderer::Renderer,
    signal::StopSignal,
    source::{FetchError, StateSource},
    state::Input,
};
use anyhow::{ensure, Context};
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

/// Runs the fetch-then-render cycle every `interval` until `stop` is raised, then shuts the
/// renderer down exactly once. Returns the number of ticks run.
///
/// Fetch and render failures only affect their own tick: a failed fetch renders the error's
/// fallback state and a failed render skips the frame.
pub fn run<S, R>(
    interval: Duration,
    source: &mut S,
    renderer: &mut R,
    stop: &StopSignal,
) -> anyhow::Result<u64>
where
    S: StateSource + ?Sized,
    R: Renderer + ?Sized,
{
    ensure!(
        !interval.is_zero(),
        "the refresh interval must be greater than zero"
    );
    ensure!(
        Instant::now().checked_add(interval).is_some(),
        "the refresh interval {interval:?} is too long"
    );
    info!("refreshing every {interval:?}");

    let outcome = run_ticks(interval, source, renderer, stop);
    renderer.shutdown().context("renderer shutdown failed")?;
    if let Ok(ticks) = &outcome {
        info!("stopped after {ticks} ticks");
    }
    outcome
}

fn run_ticks<S, R>(
    interval: Duration,
    source: &mut S,
    renderer: &mut R,
    stop: &StopSignal,
) -> anyhow::Result<u64>
where
    S: StateSource + ?Sized,
    R: Renderer + ?Sized,
{
    let mut ticks = 0;
    while !stop.is_raised() {
        let deadline = Instant::now()
            .checked_add(interval)
            .context("refresh deadline out of range")?;
        ticks += 1;

        let state = match source.fetch() {
            Ok(state) => state,
            Err(err) => {
                match err {
                    FetchError::NoActivePlayback => debug!("tick {ticks}: {err}"),
                    FetchError::Unauthorized => error!("tick {ticks}: {err}"),
                    _ => warn!("tick {ticks}: fetch failed: {err}"),
                }
                err.fallback_state()
            }
        };
        debug!("tick {ticks}: {state}");

        if let Err(err) = renderer.render(&state) {
            warn!("tick {ticks}: render failed: {err:#}");
        }

        match renderer.wait_for_input(deadline, stop)? {
            Some(Input::Quit) => {
                info!("quit requested");
                stop.raise();
            }
            // Ends the tick early so the effect of the control shows right away
            Some(Input::Control(control)) => {
                if let Err(err) = source.control(control) {
                    warn!("{control} failed: {err}");
                }
            }
            None => {}
        }
    }
    Ok(ticks)
}
