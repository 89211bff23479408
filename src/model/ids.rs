//! Identifiers shared between records.
//!
//! Service names double as DNS labels (`<name>.internal`), so they are
//! validated once here and every derived id is built from a valid name.

use crate::error::ComposeError;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("static regex")
});

/// Internal-only DNS suffix for mesh routes.
pub const ROUTE_SUFFIX: &str = "internal";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Network-addressable unit whose traffic is governed by grants.
    ExecutionGroupId
);
string_id!(TaskDefinitionId);
string_id!(MeshNodeId);
string_id!(
    /// Stable mesh-internal name resolving to exactly one node.
    MeshRouteName
);

/// Name and inbound port of one logical service. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ServiceIdentity {
    name: String,
    port: u16,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, port: u16) -> Result<Self, ComposeError> {
        let name = name.into();
        if !DNS_LABEL.is_match(&name) {
            return Err(ComposeError::InvalidName { name });
        }
        if port == 0 {
            return Err(ComposeError::InvalidPort { service: name, port });
        }
        Ok(Self { name, port })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn execution_group(&self) -> ExecutionGroupId {
        ExecutionGroupId(format!("{}-security-group", self.name))
    }

    pub fn task_definition(&self) -> TaskDefinitionId {
        TaskDefinitionId(format!("{}-task-definition", self.name))
    }

    pub fn mesh_node(&self) -> MeshNodeId {
        MeshNodeId(self.name.clone())
    }

    pub fn mesh_route(&self) -> MeshRouteName {
        MeshRouteName(format!("{}.{}", self.name, ROUTE_SUFFIX))
    }

    /// Scheduler registration name.
    pub fn scheduler_service(&self) -> String {
        format!("{}-service", self.name)
    }

    pub fn virtual_node_id(&self) -> String {
        format!("{}-virtual-node", self.name)
    }

    pub fn virtual_service_id(&self) -> String {
        format!("{}-virtual-service", self.name)
    }

    /// Every document resource id owned by this service.
    pub fn resource_ids(&self) -> [String; 5] {
        [
            self.execution_group().0,
            self.task_definition().0,
            self.scheduler_service(),
            self.virtual_node_id(),
            self.virtual_service_id(),
        ]
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.port)
    }
}
