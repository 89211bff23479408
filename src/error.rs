use thiserror::Error;

/// Errors raised while composing services into an assembly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("invalid service name '{name}': must be a lowercase DNS label")]
    InvalidName { name: String },

    #[error("invalid port for service '{service}': {port} is not a usable TCP port")]
    InvalidPort { service: String, port: u16 },

    #[error("service '{0}' is already registered in this assembly")]
    DuplicateService(String),

    #[error("application container of '{0}' has no health check")]
    MissingHealthCheck(String),

    #[error(
        "proxy health check of '{service}' needs a start period of at least {min_secs}s, got {actual_secs}s"
    )]
    ProxyGracePeriod {
        service: String,
        min_secs: u64,
        actual_secs: u64,
    },

    #[error(
        "task of '{service}' reserves {available} MiB but its containers need {required} MiB"
    )]
    InsufficientTaskMemory {
        service: String,
        required: u32,
        available: u32,
    },

    #[error("mesh listener health check of '{service}': {reason}")]
    ListenerHealthCheck { service: String, reason: String },

    #[error("service '{0}' is not composed in this assembly (missing execution group or mesh node)")]
    UnknownService(String),

    #[error("mesh route '{route}' of '{service}' is not registered")]
    UnregisteredRoute { service: String, route: String },

    #[error("service '{0}' cannot be connected to itself")]
    SelfConnection(String),

    #[error("load balancer target '{0}' is not a composed service")]
    UnknownTarget(String),

    #[error(
        "task of '{service}' reserves {available} CPU units but its containers need {required}"
    )]
    InsufficientTaskCpu {
        service: String,
        required: u32,
        available: u32,
    },

    #[error("resource id '{id}' is already taken by {owner}")]
    ResourceIdConflict { id: String, owner: String },

    #[error("load balancer '{0}' is already defined")]
    DuplicateLoadBalancer(String),

    #[error("output '{0}' is already defined")]
    DuplicateOutput(String),
}

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised while rendering the desired-state document.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("resource id '{id}' is used by both a {existing} and a {kind}")]
    DuplicateResource {
        id: String,
        existing: &'static str,
        kind: &'static str,
    },

    #[error("failed to serialize document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Topology file errors.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("failed to read topology file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML topology: {0}")]
    Toml(#[source] toml::de::Error),

    #[error("failed to parse JSON topology: {0}")]
    Json(#[source] serde_json::Error),

    #[error("invalid topology: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

pub type Result<T> = std::result::Result<T, Error>;
