//! Remote Tool Client
//!
//! Agent-side access to one tool server over HTTP: tool list refresh,
//! invocation and health probing.

mod error;
mod remote;

pub use error::{ClientError, ClientResult};
pub use remote::{RemoteServerHandle, RemoteToolClient, ToolCache};
