//! Cache Module
//!
//! The caching facade and the components it composes: key validation,
//! TTL normalization, value encoding and cluster topology detection.

mod codec;
mod facade;
mod key;
mod topology;
mod ttl;


// Re-export public types
pub use codec::{JsonCodec, ValueCodec};
pub use facade::CacheFacade;
pub use key::{validate_key, validate_keys, RESERVED_KEY_CHARACTERS};
pub use topology::{ClusterTopology, NodeConnector, NodeDescriptor, Topology};
pub use ttl::{normalize_ttl, NormalizedTtl, RelativeInterval, Ttl};
