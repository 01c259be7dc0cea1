use crate::config::LogConfig;
use anyhow::Context;
use log::LevelFilter;
use log4rs::{
    append::rolling_file::{
        policy::compound::{
            roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};
use std::path::Path;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:<5} {t} - {m}{n}";

/// Sends all logging to the configured file, rotating it once it outgrows `max_size_bytes`. The
/// terminal belongs to the renderers, so nothing is logged to stdout or stderr.
pub fn init(settings: &LogConfig, level: LevelFilter) -> anyhow::Result<()> {
    let config = file_config(&settings.file_path(), settings, level)?;
    log4rs::init_config(config).context("unable to install logger")?;
    Ok(())
}

fn rolling_appender(path: &Path, settings: &LogConfig) -> anyhow::Result<RollingFileAppender> {
    // pidash.log rolls over to pidash.log.0, pidash.log.1, ...
    let archive = format!("{}.{{}}", path.display());
    let roller = FixedWindowRoller::builder()
        .build(&archive, settings.keep_files)
        .context("invalid log archive pattern")?;
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(settings.max_size_bytes)),
        Box::new(roller),
    );

    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(path, Box::new(policy))
        .with_context(|| format!("unable to open log file {}", path.display()))
}

fn file_config(path: &Path, settings: &LogConfig, level: LevelFilter) -> anyhow::Result<Config> {
    let file = rolling_appender(path, settings)?;
    Config::builder()
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(Root::builder().appender("file").build(level))
        .context("invalid logging config")
}
