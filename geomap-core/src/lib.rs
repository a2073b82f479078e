//! # Geomap Core
//!
//! Materializes declarative map descriptors into a live object graph, keeps it
//! in sync with incremental diffs, and dispatches remote operations on live
//! objects by id. Compiles to WASM.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                MapComponent                 │
//! ├─────────────────────────────────────────────┤
//! │  Graph Converter     │  Operation Dispatcher│
//! │  - visited set       │  - argument parsing  │
//! │  - dependency order  │  - capability check  │
//! │  - rollback journal  │  - native events     │
//! ├─────────────────────────────────────────────┤
//! │  Type Registry       │  Event Router        │
//! │  - entity kinds      │  - routing table     │
//! │  - basic values      │  - handler categories│
//! ├─────────────────────────────────────────────┤
//! │  Object Registry (generational arena)       │
//! │  root map → controls → layers → DFS         │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod argument;
pub mod component;
pub mod convert;
pub mod crs;
pub mod descriptor;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod factory;
pub mod kind;
pub mod object;
pub mod ops;
pub mod ready;
pub mod registry;
pub mod value;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use argument::Argument;
pub use component::{MapComponent, MapOptions, SpliceOutcome};
pub use convert::{materialize_all, GraphConverter};
pub use descriptor::{Descriptor, ObjectId, OperationRequest, Overlay, Splice};
pub use dispatch::{dispatch, Outcome};
pub use engine::{EngineCall, EngineJournal, HeadlessEngine, Location, RenderEngine, Stacking};
pub use error::{MapError, MapResult};
pub use event::{
    EventLog, EventRouter, EventSink, ForwardedEvent, HandlerCategory, LogSink, Route,
    RoutingTable,
};
pub use kind::{
    resolve_basic_converter, resolve_control_factory, resolve_layer_factory, BasicKind,
    ControlKind, LayerKind, ObjectKind, TypeTag,
};
pub use object::{LiveObject, LiveState, MapView};
pub use ops::{Method, NativeEvent};
pub use ready::Readiness;
pub use registry::{Handle, ObjectRegistry};
pub use value::{BasicValue, Bounds, DivIcon, Icon, LatLng, LatLngBounds, Point};

/// Geomap core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
