use anyhow::{bail, Context};
use std::path::PathBuf;
use tracing::info;
use vanetsec_core::{logging, Config};
use vanetsec_sim::Simulation;

fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let config = match parse_config_path(&args)? {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    let mut simulation = Simulation::new(config)?;
    let stats = simulation.run();

    if let Some(last) = stats.last() {
        println!("{}", serde_json::to_string_pretty(last)?);
    }
    info!(samples = stats.samples().len(), "Done");
    Ok(())
}

fn parse_config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            let Some(path) = args_iter.next() else {
                bail!("--config was provided without a path");
            };
            return Ok(Some(PathBuf::from(path)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_config_path() {
        let path = parse_config_path(&args(&["vanet-sim", "--config", "run.toml"])).unwrap();
        assert_eq!(path, Some(PathBuf::from("run.toml")));
        assert_eq!(parse_config_path(&args(&["vanet-sim"])).unwrap(), None);
        assert!(parse_config_path(&args(&["vanet-sim", "--config"])).is_err());
    }
}
