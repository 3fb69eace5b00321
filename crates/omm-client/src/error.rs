//! OMM client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OmmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tokio_native_tls::native_tls::Error),

    #[error("Malformed AXI message: {0}")]
    Xml(String),

    #[error("Missing attribute {attribute:?} on <{element}>")]
    MissingAttribute { element: String, attribute: String },

    #[error("{request} rejected: {code} ({info})")]
    Rejected {
        request: String,
        code: String,
        info: String,
    },

    #[error("Connection closed by OMM")]
    ConnectionClosed,
}
