//! Remote mail endpoint.
//!
//! - `RemoteEndpoint`: one call per operation kind, failures as values
//! - `dispatch`: maps a queued record to exactly one endpoint call
//! - `WebDavEndpoint`: HTTP/WebDAV implementation
//! - `testing::RecordingEndpoint`: scriptable in-process implementation

mod dispatch;
mod endpoint;
pub mod testing;
mod webdav;

pub use dispatch::dispatch;
pub use endpoint::{FlagsDelta, RemoteEndpoint, RemoteError, RemoteResult};
pub use testing::{RecordingEndpoint, RemoteCall};
pub use webdav::{classify_status, WebDavEndpoint};
