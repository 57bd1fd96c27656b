use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaError>;

#[derive(Error, Debug)]
pub enum TaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod api;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod forum;
pub mod kb;
pub mod logbook;
pub mod ocr;
pub mod pipeline;
pub mod server;
pub mod store;
