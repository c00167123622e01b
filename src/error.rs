use std::error;
use std::fmt;
use std::io;

#[derive(Debug)]

/**
 * Error to represent failed setup, transport, or halo synchronization. Any of
 * these is fatal to a distributed run: there is no resend or recovery.
 */
pub enum Error {
    Io(io::Error),
    Transport(String),
    Encode(String),
    Decode(String),
    Protocol(String),
    UnknownOrigin(usize),
    HaloWrite((i64, i64)),
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            Io(e) => write!(fmt, "i/o error: {}", e),
            Transport(msg) => write!(fmt, "transport failure: {}", msg),
            Encode(msg) => write!(fmt, "could not encode message: {}", msg),
            Decode(msg) => write!(fmt, "malformed message: {}", msg),
            Protocol(msg) => write!(fmt, "halo protocol violation: {}", msg),
            UnknownOrigin(index) => write!(fmt, "no cell owns whole-grid index {}", index),
            HaloWrite((x, y)) => write!(fmt, "refusing to write non-interior cell ({} {})", x, y),
            Config(msg) => write!(fmt, "invalid configuration: {}", msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
