//! Remote I/O.
//!
//! - [`Delegate`]: the single-request fetch primitive, with [`HttpDelegate`]
//!   as the HTTP implementation
//! - [`FetchEngine`]: retries, fingerprints and gzip unwrapping on top of a
//!   delegate, writing into caller-owned buffers

mod delegate;
mod fetch;
mod gzip;

pub use delegate::{ByteRange, Delegate, DelegateRequest, DelegateResponse, HttpDelegate};
pub use fetch::{FetchEngine, FetchRequest, Fetched, Received, DEFAULT_MAX_RETRIES};
pub use gzip::{gunzip_to_vec, is_gzip, ungzip, GZIP_SIGNATURE};
