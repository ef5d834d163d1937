use thiserror::Error;

/// The request never produced a usable response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A server-pushed action change set could not be applied locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("action list not loaded yet")]
    NotLoaded,
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("action '{0}' has a non-boolean state")]
    BadValue(String),
}

/// The transport worked but the application refused or could not use the
/// result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    ChangeSet(#[from] ApplyError),
}

/// Why a command POST did not succeed.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

impl CommandError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_cancelled())
    }
}

/// The controller task has stopped and no longer accepts requests.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("panel controller stopped")]
pub struct ControllerGone;
