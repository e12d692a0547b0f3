use crate::registry::Interface;
use std::{fmt, panic::Location};
use tracing::subscriber::NoSubscriber;
use wayland_client::protocol::wl_shm::Format;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure the front-end can hit. None of them are recoverable; the
/// caller is expected to hand the error to [`Error::report`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("could not connect to the display server")]
    DisplayConnectFailure,
    #[error("the display server connection failed while processing events")]
    ServerProcessingFailure,
    #[error("compositor is missing required features: {}", join_interfaces(.0))]
    CompositorMissingFeatures(Vec<Interface>),
    #[error("could not open a shared memory file")]
    ShmOpenFailure,
    #[error("could not map shared memory")]
    MmapFailure,
    #[error("invalid buffer size {width}x{height}")]
    InvalidBufferSize { width: u32, height: u32 },
    #[error("compositor does not support buffer format {0:?}")]
    UnsupportedFormat(Format),
}

fn join_interfaces(interfaces: &[Interface]) -> String {
    interfaces
        .iter()
        .map(|interface| interface.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ErrorKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::DisplayConnectFailure => 2,
            ErrorKind::ServerProcessingFailure => 3,
            ErrorKind::CompositorMissingFeatures(_) => 4,
            ErrorKind::ShmOpenFailure => 5,
            ErrorKind::MmapFailure => 6,
            ErrorKind::InvalidBufferSize { .. } => 7,
            ErrorKind::UnsupportedFormat(_) => 8,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind} ({location})")]
pub struct Error {
    kind: ErrorKind,
    location: &'static Location<'static>,
    #[source]
    source: Option<BoxedSource>,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    #[track_caller]
    pub fn new(kind: ErrorKind) -> Error {
        Error {
            kind,
            location: Location::caller(),
            source: None,
        }
    }

    #[track_caller]
    pub fn with_source(kind: ErrorKind, source: impl Into<BoxedSource>) -> Error {
        Error {
            kind,
            location: Location::caller(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The call site that detected the failure.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Records the error and terminates the process.
    pub fn report(self) -> ! {
        self.announce();
        std::process::exit(self.kind.exit_code())
    }

    /// Logs the error, or prints it to stderr when nothing would see the log.
    fn announce(&self) -> Sink {
        let chain = SourceChain(self);
        if has_subscriber() {
            tracing::error!(
                file = self.location.file(),
                line = self.location.line(),
                code = self.kind.exit_code(),
                "{chain}"
            );
            Sink::Log
        } else {
            eprintln!("error: {chain}");
            Sink::Stderr
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sink {
    Log,
    Stderr,
}

fn has_subscriber() -> bool {
    tracing::dispatcher::get_default(|dispatch| !dispatch.is::<NoSubscriber>())
}

impl From<ErrorKind> for Error {
    #[track_caller]
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind)
    }
}

struct SourceChain<'a>(&'a Error);

impl fmt::Display for SourceChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = std::error::Error::source(self.0);
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_is_call_site() {
        let line = line!() + 1;
        let error = Error::new(ErrorKind::DisplayConnectFailure);
        assert_eq!(error.location().file(), file!());
        assert_eq!(error.location().line(), line);
    }

    #[test]
    fn test_missing_features_message() {
        let error = Error::new(ErrorKind::CompositorMissingFeatures(vec![
            Interface::Subcompositor,
            Interface::WmBase,
        ]));
        let message = error.to_string();
        assert!(
            message.starts_with(
                "compositor is missing required features: wl_subcompositor, xdg_wm_base ("
            ),
            "{message}",
        );
    }

    #[test]
    fn test_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error = Error::with_source(ErrorKind::ServerProcessingFailure, io);
        let chain = SourceChain(&error).to_string();
        assert!(chain.ends_with(": pipe closed"), "{chain}");
        assert_eq!(error.kind().exit_code(), 3);
    }

    #[test]
    fn test_report_goes_to_one_place() {
        let error = Error::new(ErrorKind::ShmOpenFailure);
        assert_eq!(error.announce(), Sink::Stderr);

        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(error.announce(), Sink::Log);
        });
    }

    #[test]
    fn test_unsupported_format_message() {
        let error = Error::new(ErrorKind::UnsupportedFormat(Format::Rgb565));
        assert!(
            error
                .to_string()
                .starts_with("compositor does not support buffer format Rgb565 ("),
            "{error}",
        );
        assert_eq!(error.kind().exit_code(), 8);
    }
}
