//! coalesce-client: Resolvers built on the coalesce engine
//!
//! This crate wires the generic loader from `coalesce-domain` to concrete
//! lookups:
//! - Avatar URL resolution keyed by uuid and pixel size
//! - Username to user id resolution with negative caching
//! - Configuration loading from YAML and environment variables
//! - Structured logging initialisation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               coalesce-client               │
//! ├─────────────────────────────────────────────┤
//! │  resolvers/     - Avatar and user lookups   │
//! │  config         - Layered configuration     │
//! │  observability/ - Logging setup             │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │               coalesce-domain               │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod observability;
pub mod resolvers;

pub use self::config::{ClientConfig, ConfigLoadError, LoggingSettings};
pub use resolvers::avatar::{AvatarApi, AvatarRequest, AvatarResolver, AvatarResponse, AvatarSource};
pub use resolvers::users::{UserApi, UserRecord, UserResolver, UserSource, Username};
