//! # Geomap RPC
//!
//! JSON-RPC 2.0 front door for the remote view-model owner. Each session
//! hosts one [`geomap_core::MapComponent`].
//!
//! ## Methods
//!
//! - `initialize` - Create the default session, report capabilities
//! - `map/create`, `map/destroy` - Session lifecycle
//! - `map/layers`, `map/controls` - Initial descriptor batches
//! - `map/layers/splice`, `map/controls/splice` - Incremental diffs
//! - `map/call` - Invoke a method on a live object by id
//! - `map/update`, `map/ready` - Readiness handshake
//! - `map/resize`, `map/fire` - Engine-originated changes
//! - `map/describe` - Snapshot of a session
//!
//! ## Notifications
//!
//! - `map/event` - A forwarded native event, with its session id

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod params;
pub mod server;

pub use error::{RpcError, RpcResult};
pub use server::{
    ChannelSink, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, MapRpcServer,
    RpcConfig, METHODS,
};
