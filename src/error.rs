use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "The settings file at {path} does not exist while strict mode is enabled. \
         Unset the strict-mode variable or create the file."
    )]
    SettingsMissing { path: PathBuf },
    #[error("Failed to read settings file at {path}: {source}")]
    ReadSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Settings at {path} could not be parsed: {source}")]
    ParseSettings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Machine definition is invalid: {message}")]
    InvalidMachine { message: String },
    #[error(
        "Folder override `{variable}` contains a malformed entry `{entry}`. \
         Expected space-separated `host:guest` pairs. Example: `./data:/data`."
    )]
    MalformedFolderOverride { variable: String, entry: String },
    #[error("Failed to read box pin file at {path}: {source}")]
    ReadBoxPin {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write box pin file at {path}: {source}")]
    WriteBoxPin {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
