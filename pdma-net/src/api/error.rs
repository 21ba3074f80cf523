pub type Errno = nix::errno::Errno;

/// Result type alias for packet DMA and filter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the device controller, filter table and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Bad bitmap, out-of-range logical id, unsupported rule or destination.
    #[error("invalid parameter")]
    InvalidParam,
    /// No free filter id or another bounded table is full.
    #[error("resource exhausted")]
    Resource,
    /// Unknown filter id.
    #[error("not found")]
    NotFound,
    /// Queue not in the used state, unresolvable callback or interface.
    #[error("unavailable")]
    Unavailable,
    /// No filter matched and no fast-path binding exists.
    #[error("no handler")]
    NoHandler,
    /// The hardware layer could not supply a required identifier.
    #[error("internal error")]
    Internal,
    /// Allocation failure while creating queues or filter control blocks.
    #[error("out of memory")]
    Memory,
    /// The device has no hardware layer or was already closed.
    #[error("not initialized")]
    Init,
    /// Failure reported by the hardware layer, passed through unchanged.
    #[error("hardware error: {0}")]
    Hw(Errno),
}

impl Error {
    /// Map the error onto the closest errno, for callers that speak errno
    /// (ioctl shims, CLI exit codes).
    pub fn errno(&self) -> Errno {
        match self {
            Error::InvalidParam => Errno::EINVAL,
            Error::Resource => Errno::ENOSPC,
            Error::NotFound => Errno::ENOENT,
            Error::Unavailable => Errno::EBUSY,
            Error::NoHandler => Errno::ENODEV,
            Error::Internal => Errno::EIO,
            Error::Memory => Errno::ENOMEM,
            Error::Init => Errno::ENXIO,
            Error::Hw(e) => *e,
        }
    }
}

impl From<Errno> for Error {
    fn from(e: Errno) -> Self {
        Error::Hw(e)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::Memory
    }
}
