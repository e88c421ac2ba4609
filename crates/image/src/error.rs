// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// The frame or requested target shape cannot be preprocessed.
    InvalidInput(String),
    InvalidShape(String),
    NotSupported(String),
    ResizeImageBuffer(fast_image_resize::ImageBufferError),
    Resize(fast_image_resize::ResizeError),
    Tensor(sightline_tensor::Error),
}

impl From<fast_image_resize::ImageBufferError> for Error {
    fn from(err: fast_image_resize::ImageBufferError) -> Self {
        Error::ResizeImageBuffer(err)
    }
}

impl From<fast_image_resize::ResizeError> for Error {
    fn from(err: fast_image_resize::ResizeError) -> Self {
        Error::Resize(err)
    }
}

impl From<sightline_tensor::Error> for Error {
    fn from(err: sightline_tensor::Error) -> Self {
        Error::Tensor(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::InvalidShape(msg) => write!(f, "Invalid shape: {}", msg),
            Error::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            Error::ResizeImageBuffer(e) => write!(f, "{}", e),
            Error::Resize(e) => write!(f, "{}", e),
            Error::Tensor(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}
