//! Compose sidecar-proxy mesh services into a desired-state description of
//! a container cluster, service mesh and public load balancer.
//!
//! ```no_run
//! use mesh_composer::{assembly, config::Settings, render};
//!
//! let settings = Settings::default();
//! let greeter = assembly::greeter(&settings)?;
//! println!("{}", render::render_document(&greeter)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assembly;
pub mod compose;
pub mod config;
pub mod error;
pub mod model;
pub mod render;
pub mod spec;

pub use compose::{Assembly, MeshPeer, MeshService, ServiceProps};
pub use error::{ComposeError, Error, Result};
