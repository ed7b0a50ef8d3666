//! Client for the clouddisk REST API.
//!
//! [`CloudApi`] is the seam the engines program against; [`HttpClient`] is
//! its `reqwest` implementation.

mod client;
mod error;
mod remote;

pub use client::HttpClient;
pub use error::{ApiError, ErrorKind};
pub use remote::{ApiFuture, ByteStream, CloudApi};
