//! Platform adapter contract: the polymorphic interface every integration implements,
//! the value types flowing through it, and the descriptors adapters are built from.
//!
//! Callers (the lifecycle coordinator, a web handler, an external scheduler) only
//! ever hold `Arc<dyn PlatformAdapter>`. Platform quirks such as missing refresh
//! tokens or different character limits surface declaratively through
//! [`PlatformCapabilities`] instead of type inspection.

pub mod adapter;
pub mod capabilities;
pub mod content;
pub mod descriptor;
pub mod kind;
pub mod registry;

pub use adapter::*;
pub use capabilities::*;
pub use content::*;
pub use descriptor::*;
pub use kind::*;
pub use registry::*;
