//! Translation of network node resources into per-host dataplane records.
//!
//! A node change event is split into independent key/value records (host IP,
//! tunnel addresses, VXLAN MACs, wireguard settings and address blocks).  Each
//! field is parsed on its own so a bad value only turns its own record into a
//! delete, and the node's pod CIDRs are diffed against the previous event to
//! send deletes for blocks that went away.

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod processor;
pub mod source;
pub mod tracker;
pub mod types;

pub use config::Config;
pub use error::{Error, FieldFailure, Result};
pub use extract::{Field, FieldResult};
pub use model::{OutputRecord, RecordKey, RecordValue};
pub use processor::{NodeUpdateProcessor, ProcessorOptions, Translation, UpdateProcessor};
pub use tracker::CidrTracker;
pub use types::{ChangeEvent, NodeDescriptor, Resource, ResourceKey};
