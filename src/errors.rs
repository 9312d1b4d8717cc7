// src/errors.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid trigger '{0}': triggers must be one or more ASCII letters")]
    InvalidTrigger(String),
    #[error("Snippet store is unreachable: {0}")]
    Unreachable(String),
    #[error("Failed to read snippet store at {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to write snippet store at {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse snippet store: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize snippet store: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to watch snippet store: {0}")]
    Watch(#[from] notify::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid key binding '{0}'")]
    KeyBinding(String),
    #[error("Could not find a configuration directory")]
    HomeDirectoryNotFound,
    #[error("Failed to create configuration directory: {source}")]
    CreateConfigDir { source: std::io::Error },
    #[error("Failed to write default configuration: {source}")]
    WriteDefaultConfig { source: std::io::Error },
    #[error("Failed to read config file at {path}: {source}")]
    ReadConfig { path: PathBuf, source: std::io::Error },
}

/// Why a surface could not produce a caret context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("no active selection")]
    NoCaret,
    #[error("selection is outside the editable region")]
    SelectionOutside,
    #[error("surface is no longer attached to the document")]
    Detached,
}

#[derive(Debug, Error)]
pub enum SlashkeyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Snippet rejected: {0}")]
    Draft(String),
    #[error("I/O error: {source}")]
    Io { #[from] source: std::io::Error },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

// Global Result type alias
pub type Result<T> = std::result::Result<T, SlashkeyError>;
