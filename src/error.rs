use derive_more::From;
use k8s_openapi::serde_json;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    HttpHeader(hyper::http::Error),

    /// A projection was requested for a type that is not the watched collection's type
    TypeMismatch { expected: String, requested: String },

    /// The watch stream delivered an event type outside ADDED/MODIFIED/DELETED/BOOKMARK/ERROR
    UnknownEventKind(String),

    /// Custom error message
    Custom(String),
}

impl Error {
    /// Errors that must stop the watch subsystem instead of triggering a reconnect
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownEventKind(_))
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}
