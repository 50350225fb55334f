use std::fs;
use std::path::Path;

use failure::{Error, ResultExt};
use toml;

/// The on-disk configuration, deserialized from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub github: GithubConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    /// The API token used to authenticate against the GitHub REST API.
    pub token: String,
}

impl Config {
    /// Load the configuration from a TOML file, making sure the token is
    /// actually filled in.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|_| format!("Unable to read {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents).context("The config file is invalid")?;

        if cfg.github.token.is_empty() {
            bail!("The GitHub API token is missing from the config");
        }

        Ok(cfg)
    }

    /// An example config, ready to be filled in with a real token.
    pub fn example() -> Config {
        Config {
            github: GithubConfig {
                token: String::from("REPLACE_WITH_YOUR_API_TOKEN"),
            },
        }
    }

    pub fn as_toml(&self) -> String {
        toml::to_string(self).expect("A Config is always representable as TOML")
    }
}
