use failure::{Backtrace, Context, Fail};
use std::fmt;
use std::io::ErrorKind as IoError;
use std::result;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.inner.get_context()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl From<ErrorKind> for Error {
    fn from(err: ErrorKind) -> Error {
        Error {
            inner: Context::new(err),
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(ctx: Context<ErrorKind>) -> Error {
        Error { inner: ctx }
    }
}

#[derive(Fail, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Configuration errors. Fatal at layout load or on first use.
    #[fail(display = "Unknown entity name: {}", _0)]
    UnknownEntity(String),
    #[fail(display = "Unknown target property: {}", _0)]
    UnknownTarget(String),
    #[fail(display = "Target is not a collection: {}", _0)]
    NotACollection(String),
    #[fail(display = "Collection {} rejected the child entity type", _0)]
    BadChildType(String),
    #[fail(display = "Invalid layout: {}", _0)]
    BadLayout(String),
    #[fail(display = "Invalid manifest: {}", _0)]
    BadManifest(String),
    #[fail(display = "Field `{}`: bad value for option `{}`", field, option)]
    BadFieldOption { field: String, option: String },
    #[fail(display = "Occurs group `{}`: count termination without a count field", _0)]
    MissingCountField(String),
    #[fail(
        display = "Occurs group `{}`: count field `{}` does not hold an integer",
        group, target
    )]
    BadCountFieldType { group: String, target: String },

    // Record errors. Raised per line; the caller logs and moves on.
    #[fail(display = "Field `{}`: unparsable date {:?}", field, raw)]
    BadDate { field: String, raw: String },
    #[fail(display = "Field `{}`: unparsable number {:?}", field, raw)]
    BadNumber { field: String, raw: String },
    #[fail(display = "Field `{}`: unparsable integer {:?}", field, raw)]
    BadInteger { field: String, raw: String },
    #[fail(
        display = "Field `{}`: integer {:?} outside the 1..=11 digit range",
        field, raw
    )]
    IntegerWidth { field: String, raw: String },
    #[fail(display = "Field `{}`: unparsable boolean {:?}", field, raw)]
    BadBoolean { field: String, raw: String },
    #[fail(display = "Cannot convert {} into {}", value, target)]
    Coercion {
        target: &'static str,
        value: String,
    },

    #[fail(display = "IOError")]
    Io(IoError),
    #[fail(display = "YAML error: {}", _0)]
    Yaml(String),
}

impl ErrorKind {
    /// True for per-line parse failures, false for configuration errors the
    /// job must abort on.
    pub fn is_record_error(&self) -> bool {
        match self {
            ErrorKind::BadDate { .. }
            | ErrorKind::BadNumber { .. }
            | ErrorKind::BadInteger { .. }
            | ErrorKind::IntegerWidth { .. }
            | ErrorKind::BadBoolean { .. }
            | ErrorKind::Coercion { .. } => true,
            _ => false,
        }
    }
}
