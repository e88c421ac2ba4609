// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// The raw output buffer does not match the expected stride or shape.
    DecodeFormat(String),
    /// The decoder configuration is inconsistent or out of range.
    InvalidConfig(String),
    /// No output configuration was provided to the builder.
    NoConfig,
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
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
            Error::DecodeFormat(msg) => write!(f, "Decode format error: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "Invalid decoder config: {}", msg),
            Error::NoConfig => write!(f, "No decoder config was provided"),
            Error::Json(e) => write!(f, "{}", e),
            Error::Yaml(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}
