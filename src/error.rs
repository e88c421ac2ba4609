// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// Malformed frame or target shape, raised before inference.
    InvalidInput(String),
    /// Raw model output does not match the configured stride or shape.
    DecodeFormat(String),
    /// The model failed to execute or rejected its input.
    Inference(String),
    InvalidConfig(String),
    /// A previous pass panicked while holding the shared pipeline.
    Poisoned,
    Image(sightline_image::Error),
    Decoder(sightline_decoder::Error),
    Tracker(sightline_tracker::Error),
    Tensor(sightline_tensor::Error),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl From<sightline_image::Error> for Error {
    fn from(err: sightline_image::Error) -> Self {
        match err {
            sightline_image::Error::InvalidInput(msg) => Error::InvalidInput(msg),
            err => Error::Image(err),
        }
    }
}

impl From<sightline_decoder::Error> for Error {
    fn from(err: sightline_decoder::Error) -> Self {
        match err {
            sightline_decoder::Error::DecodeFormat(msg) => Error::DecodeFormat(msg),
            err => Error::Decoder(err),
        }
    }
}

impl From<sightline_tracker::Error> for Error {
    fn from(err: sightline_tracker::Error) -> Self {
        Error::Tracker(err)
    }
}

impl From<sightline_tensor::Error> for Error {
    fn from(err: sightline_tensor::Error) -> Self {
        Error::Tensor(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::DecodeFormat(msg) => write!(f, "Decode format error: {}", msg),
            Error::Inference(msg) => write!(f, "Inference failed: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            Error::Poisoned => write!(f, "Pipeline lock poisoned"),
            Error::Image(e) => write!(f, "{}", e),
            Error::Decoder(e) => write!(f, "{}", e),
            Error::Tracker(e) => write!(f, "{}", e),
            Error::Tensor(e) => write!(f, "{}", e),
            Error::Json(e) => write!(f, "{}", e),
            Error::Yaml(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}
