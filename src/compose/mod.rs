//! Composition layer: turns descriptors into registered records.

pub mod context;
pub mod ingress;
pub mod service;
pub mod sidecar;
pub mod variant;

pub use context::{Assembly, ComposedService, Edge};
pub use ingress::PublicEntryPoint;
pub use service::{MeshPeer, MeshService, ServiceProps};
pub use variant::{ContainerDescriptor, Hosting, ProcessDescriptor, ServerlessDescriptor};
