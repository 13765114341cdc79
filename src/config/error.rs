use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("config section `{section}` has a key that is not a string or number")]
    InvalidKey { section: String },
    #[error("missing config directory for the default config path")]
    MissingConfigDir,
}
