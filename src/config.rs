use anyhow::{bail, ensure, Context, Result};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use wayfront_scfg as scfg;

#[derive(Debug, PartialEq, Eq)]
pub struct Config {
    /// Display to connect to instead of the one named by the environment.
    pub display: Option<String>,
    /// Upper bound on a single poll of the display server. `None` blocks.
    pub dispatch_timeout: Option<Duration>,
    /// Default `tracing` filter, used when `RUST_LOG` is unset.
    pub log: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            display: None,
            dispatch_timeout: None,
            log: String::from("info"),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                let home = PathBuf::from(std::env::var_os("HOME")?);
                Some(home.join(".config"))
            })
            .map(|path| path.join("wayfront/config"))
    }

    pub fn load() -> Result<Config> {
        let text = Config::default_path()
            .map(std::fs::read_to_string)
            .and_then(Result::ok)
            .unwrap_or_else(|| include_str!("../default_config").to_owned());
        Config::parse(&text)
    }

    pub fn load_from(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config {}", path.display()))?;
        Config::parse(&text)
    }

    pub fn parse(s: &str) -> Result<Config> {
        let directives = scfg::parse(s).context("invalid config")?;
        let mut config = Config::default();
        let mut seen = Vec::new();
        for directive in &directives {
            let name = directive.name.as_str();
            ensure!(
                !seen.contains(&name),
                "invalid config: line {}: directive {:?} given twice",
                directive.line,
                name,
            );
            seen.push(name);

            ensure!(
                directive.children.is_empty(),
                "invalid config: line {}: directive {:?} should not have block",
                directive.line,
                name,
            );
            let [param] = directive.params.as_slice() else {
                bail!(
                    "invalid config: line {}: directive {:?} should have exactly one parameter",
                    directive.line,
                    name,
                );
            };

            match name {
                "display" => config.display = Some(param.clone()),
                "dispatch-timeout" => {
                    config.dispatch_timeout = match param.as_str() {
                        "none" => None,
                        millis => {
                            let Ok(millis) = millis.parse::<u64>() else {
                                bail!(
                                    "invalid config: line {}: invalid timeout {:?}",
                                    directive.line,
                                    millis,
                                );
                            };
                            Some(Duration::from_millis(millis))
                        }
                    }
                }
                "log" => config.log = param.clone(),
                _ => {
                    bail!(
                        "invalid config: line {}, invalid directive {:?}",
                        directive.line,
                        name,
                    );
                }
            }
        }
        Ok(config)
    }
}
