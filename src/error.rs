// SPDX-License-Identifier: MPL-2.0
use crate::domain::error::VideoError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("I/O Error: {0}")]
    Io(String),
    #[error("Config Error: {0}")]
    Config(String),
    #[error("Image Error: {0}")]
    Image(String),
    #[error("Video Error: {0}")]
    Video(#[from] VideoError),
}

impl Error {
    /// Returns the video error carried by this error, if any.
    pub fn as_video(&self) -> Option<&VideoError> {
        match self {
            Error::Video(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<image_rs::ImageError> for Error {
    fn from(err: image_rs::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
