// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Driver error type and the status codes reported at the host boundary

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("only {count} usable display modes, need more than 2")]
    InsufficientModes { count: usize },
    #[error("display bus: {0}")]
    Bus(String),
    #[error("gpu device: {0}")]
    Device(#[from] gal::Error),
    #[error("bad argument: {0}")]
    BadArgument(&'static str),
    #[error("operation not supported")]
    Unsupported,
    #[error("unknown display mode {0}")]
    UnknownMode(u32),
    #[error("a mode switch is already in flight")]
    Busy,
    #[error("client did not acknowledge the mode switch in time")]
    Timeout,
    #[error("driver is not running")]
    NotRunning,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Parse(String),
}

/// Closed set of codes handed back to the host graphics stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    BadArgument,
    Unsupported,
    NotReady,
    Busy,
    Timeout,
    Error,
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        match err {
            Error::BadArgument(_) | Error::UnknownMode(_) | Error::Parse(_) => Status::BadArgument,
            Error::Unsupported => Status::Unsupported,
            Error::NotRunning => Status::NotReady,
            Error::Busy => Status::Busy,
            Error::Timeout => Status::Timeout,
            Error::Device(gal::Error::NotSupported) => Status::Unsupported,
            Error::Device(gal::Error::Timeout) => Status::Timeout,
            Error::Device(gal::Error::ResourceInUse) => Status::Busy,
            Error::InsufficientModes { .. } | Error::Bus(_) | Error::Device(_) | Error::Io(_) => {
                Status::Error
            }
        }
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(res: &Result<T>) -> Self {
        match res {
            Ok(_) => Status::Success,
            Err(err) => Status::from(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Status::from(&Error::Busy), Status::Busy);
        assert_eq!(Status::from(&Error::UnknownMode(99)), Status::BadArgument);
        assert_eq!(
            Status::from(&Error::Device(gal::Error::NotSupported)),
            Status::Unsupported
        );
        assert_eq!(
            Status::from(&Error::Device(gal::Error::DeviceLost)),
            Status::Error
        );
        assert_eq!(Status::from(&Ok::<(), Error>(())), Status::Success);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::InsufficientModes { count: 2 }.to_string(),
            "only 2 usable display modes, need more than 2"
        );
    }
}
