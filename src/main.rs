//! vsphere-ccm-config: convert a vSphere cloud-config for the external CCM.
//!
//! Reads a legacy INI or YAML cloud-config plus a JSON document of
//! cluster topology facts, and writes the enriched YAML configuration.

#[macro_use]
extern crate log;

use failure::{Fallible, ResultExt};
use std::io::Write;
use std::path::PathBuf;
use structopt::StructOpt;
use vsphere_ccm_config::{transform, TopologyFacts};

#[derive(Debug, StructOpt)]
#[structopt(name = "vsphere-ccm-config")]
struct CliOptions {
    /// Source cloud-config, YAML or legacy INI.
    #[structopt(long = "config", parse(from_os_str))]
    config: PathBuf,
    /// Cluster topology facts, as JSON.
    #[structopt(long = "topology", parse(from_os_str))]
    topology: PathBuf,
    /// Output path (default: stdout).
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<PathBuf>,
    /// Verbosity level (higher is more verbose).
    #[structopt(short = "v", parse(from_occurrences))]
    verbosity: u8,
}

impl CliOptions {
    /// Level to force on the logger, if any.
    ///
    /// `-v` always wins; without it, `RUST_LOG` is honored when set and
    /// warnings are the default otherwise.
    fn loglevel(&self, env_filter_set: bool) -> Option<log::LevelFilter> {
        let level = match self.verbosity {
            0 if env_filter_set => return None,
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        Some(level)
    }
}

fn main() -> Fallible<()> {
    let opts = CliOptions::from_args();
    let mut logger = env_logger::Builder::from_default_env();
    if let Some(level) = opts.loglevel(std::env::var_os("RUST_LOG").is_some()) {
        logger.filter_level(level);
    }
    logger.try_init()?;
    info!("starting vsphere-ccm-config");

    let source = std::fs::read(&opts.config)
        .context(format!("failed to read file '{}'", opts.config.display()))?;
    let facts_content = std::fs::read(&opts.topology)
        .context(format!("failed to read file '{}'", opts.topology.display()))?;
    let facts: TopologyFacts =
        serde_json::from_slice(&facts_content).context("failed to parse topology facts")?;
    debug!("topology facts: {:?}", facts);

    let out = transform(&source, &facts)?;

    match &opts.output {
        Some(path) => std::fs::write(path, out.as_bytes())
            .context(format!("failed to write file '{}'", path.display()))?,
        None => std::io::stdout()
            .write_all(out.as_bytes())
            .context("failed to write to stdout")?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(verbosity: u8) -> CliOptions {
        CliOptions {
            config: PathBuf::from("cloud.conf"),
            topology: PathBuf::from("topology.json"),
            output: None,
            verbosity,
        }
    }

    #[test]
    fn rust_log_applies_without_verbosity() {
        assert_eq!(opts(0).loglevel(true), None);
        assert_eq!(opts(0).loglevel(false), Some(log::LevelFilter::Warn));
    }

    #[test]
    fn verbosity_overrides_rust_log() {
        assert_eq!(opts(1).loglevel(true), Some(log::LevelFilter::Info));
        assert_eq!(opts(2).loglevel(false), Some(log::LevelFilter::Debug));
        assert_eq!(opts(5).loglevel(true), Some(log::LevelFilter::Trace));
    }
}
