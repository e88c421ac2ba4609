// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    InvalidSize(usize),
    ShapeMismatch(String),
    Shape(ndarray::ShapeError),
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Shape(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidSize(size) => write!(f, "Invalid size: {}", size),
            Error::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            Error::Shape(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}
