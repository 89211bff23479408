//! Spec layer: topology file schema + validated assembly construction.
//!
//! This module is intentionally separate from composition and rendering.
//! It owns:
//! - the serde-friendly topology shape (TOML or JSON)
//! - validation of names, edges and the public entry point

pub mod topology;

pub use topology::{
    ClusterSpec, ConnectionSpec, HealthCheckSpec, MeshSpec, NetworkSpec, PublicSpec, ServiceSpec,
    TopologySpec,
};
