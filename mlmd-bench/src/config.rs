//! Configuration for a benchmark run.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `MLMD_BENCH__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `MLMD_BENCH__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `MLMD_BENCH__THREAD_ENV_CONFIG__NUM_THREADS=8` sets the number of worker threads
//! - `MLMD_BENCH__MLMD_CONFIG__TYPE=fake_database` selects the store
//!
//! # YAML Configuration File
//!
//! ```yaml
//! mlmd_config:
//!   type: in_memory
//!   name: bench
//!
//! thread_env_config:
//!   num_threads: 4
//!
//! workload_configs:
//!   - num_operations: 100
//!     fill_types_config:
//!       specification: artifact_type
//!       num_properties: { minimum: 1, maximum: 10 }
//! ```

use std::fmt;
use std::path::Path;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use mlmd_store::{EventType, NodeKind, TypeKind};
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

pub use mlmd_store::ConnectionConfig;

use crate::Error;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "MLMD_BENCH__";

/// An inclusive range `[minimum, maximum]` sampled uniformly.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct UniformDistribution {
    /// Smallest value that can be sampled.
    pub minimum: u64,
    /// Largest value that can be sampled.
    pub maximum: u64,
}

impl UniformDistribution {
    /// Creates a new distribution over `[minimum, maximum]`.
    pub const fn new(minimum: u64, maximum: u64) -> Self {
        Self { minimum, maximum }
    }

    /// Returns a sampler for this range, or `InvalidConfig` if the range is empty.
    pub fn sampler(&self) -> crate::Result<Uniform<u64>> {
        Uniform::new_inclusive(self.minimum, self.maximum).map_err(|_| {
            Error::InvalidConfig(format!(
                "empty range: minimum {} is larger than maximum {}",
                self.minimum, self.maximum
            ))
        })
    }
}

/// Which kind of type a [`FillTypesConfig`] creates or updates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillTypesSpecification {
    /// Artifact types.
    ArtifactType,
    /// Execution types.
    ExecutionType,
    /// Context types.
    ContextType,
}

impl FillTypesSpecification {
    /// The kind of type this specification targets.
    pub fn kind(self) -> TypeKind {
        match self {
            Self::ArtifactType => TypeKind::Artifact,
            Self::ExecutionType => TypeKind::Execution,
            Self::ContextType => TypeKind::Context,
        }
    }
}

/// Creates or updates types.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct FillTypesConfig {
    /// The kind of type to fill.
    pub specification: FillTypesSpecification,
    /// Add properties to existing types instead of inserting new ones.
    #[serde(default)]
    pub update: bool,
    /// Number of properties per new type, or number of added properties per updated type.
    pub num_properties: UniformDistribution,
}

/// Which kind of node a [`FillNodesConfig`] creates or updates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillNodesSpecification {
    /// Artifacts.
    Artifact,
    /// Executions.
    Execution,
    /// Contexts.
    Context,
}

impl FillNodesSpecification {
    /// The kind of node this specification targets.
    pub fn kind(self) -> NodeKind {
        match self {
            Self::Artifact => NodeKind::Artifact,
            Self::Execution => NodeKind::Execution,
            Self::Context => NodeKind::Context,
        }
    }
}

/// Creates or updates artifacts, executions or contexts.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct FillNodesConfig {
    /// The kind of node to fill.
    pub specification: FillNodesSpecification,
    /// Add properties to existing nodes instead of inserting new ones.
    #[serde(default)]
    pub update: bool,
    /// Number of properties per new node, or number of added properties per updated node.
    pub num_properties: UniformDistribution,
    /// Length of generated string values.
    pub string_value_bytes: UniformDistribution,
}

/// Which edge a [`FillContextEdgesConfig`] creates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillContextEdgesSpecification {
    /// Attributes artifacts to contexts.
    Attribution,
    /// Associates executions with contexts.
    Association,
}

impl FillContextEdgesSpecification {
    /// The kind of node linked to a context.
    pub fn kind(self) -> NodeKind {
        match self {
            Self::Attribution => NodeKind::Artifact,
            Self::Association => NodeKind::Execution,
        }
    }
}

/// Creates attributions or associations.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct FillContextEdgesConfig {
    /// The kind of edge to fill.
    pub specification: FillContextEdgesSpecification,
}

/// Which event a [`FillEventsConfig`] creates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillEventsSpecification {
    /// Input events.
    Input,
    /// Output events. An artifact is the output of at most one execution.
    Output,
}

impl FillEventsSpecification {
    /// The event type created by this specification.
    pub fn event_type(self) -> EventType {
        match self {
            Self::Input => EventType::Input,
            Self::Output => EventType::Output,
        }
    }
}

/// Creates events between existing artifacts and executions.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct FillEventsConfig {
    /// The kind of event to fill.
    pub specification: FillEventsSpecification,
}

/// Which read a [`ReadTypesConfig`] issues.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ReadTypesSpecification {
    AllArtifactTypes,
    AllExecutionTypes,
    AllContextTypes,
    ArtifactTypesById,
    ExecutionTypesById,
    ContextTypesById,
    ArtifactTypeByName,
    ExecutionTypeByName,
    ContextTypeByName,
}

/// Reads types.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ReadTypesConfig {
    /// The read to issue.
    pub specification: ReadTypesSpecification,
}

/// Which read a [`ReadNodesByPropertiesConfig`] issues.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ReadNodesByPropertiesSpecification {
    ArtifactsById,
    ExecutionsById,
    ContextsById,
    ArtifactsByType,
    ExecutionsByType,
    ContextsByType,
    ArtifactByTypeAndName,
    ExecutionByTypeAndName,
    ContextByTypeAndName,
}

/// Reads nodes by id, type or name.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ReadNodesByPropertiesConfig {
    /// The read to issue.
    pub specification: ReadNodesByPropertiesSpecification,
}

/// Which read a [`ReadNodesViaContextEdgesConfig`] issues.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ReadNodesViaContextEdgesSpecification {
    ArtifactsByContext,
    ExecutionsByContext,
    ContextsByArtifact,
    ContextsByExecution,
}

/// Reads nodes linked by attributions or associations.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ReadNodesViaContextEdgesConfig {
    /// The read to issue.
    pub specification: ReadNodesViaContextEdgesSpecification,
}

/// Which read a [`ReadEventsConfig`] issues.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ReadEventsSpecification {
    EventsByArtifactIds,
    EventsByExecutionIds,
}

/// Reads events of artifacts or executions.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ReadEventsConfig {
    /// The read to issue.
    pub specification: ReadEventsSpecification,
}

/// The kind of load a workload generates, with its kind-specific parameters.
///
/// Exactly one of the `*_config` keys must be present on a workload entry.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum WorkloadKind {
    FillTypesConfig(FillTypesConfig),
    FillNodesConfig(FillNodesConfig),
    FillContextEdgesConfig(FillContextEdgesConfig),
    FillEventsConfig(FillEventsConfig),
    ReadTypesConfig(ReadTypesConfig),
    ReadNodesByPropertiesConfig(ReadNodesByPropertiesConfig),
    ReadNodesViaContextEdgesConfig(ReadNodesViaContextEdgesConfig),
    ReadEventsConfig(ReadEventsConfig),
}

/// One configured workload.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct WorkloadConfig {
    /// Number of operations to prepare and execute.
    pub num_operations: usize,

    /// Seed for the workload's random generator.
    ///
    /// Runs with the same seed against the same store state generate the same requests. A random
    /// seed is used if this is not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// What the workload does.
    #[serde(flatten)]
    pub kind: WorkloadKind,
}

/// Settings of the worker thread pool.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreadEnvConfig {
    /// Number of worker threads executing each workload.
    ///
    /// # Default
    ///
    /// `1`
    ///
    /// # Environment Variable
    ///
    /// `MLMD_BENCH__THREAD_ENV_CONFIG__NUM_THREADS`
    pub num_threads: usize,

    /// Attempts per operation before the run is aborted.
    ///
    /// Set to `null` to retry failing operations forever.
    ///
    /// # Default
    ///
    /// `10`
    ///
    /// # Environment Variable
    ///
    /// `MLMD_BENCH__THREAD_ENV_CONFIG__MAX_ATTEMPTS`
    pub max_attempts: Option<u32>,
}

impl Default for ThreadEnvConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            max_attempts: Some(10),
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// `RUST_LOG` takes precedence if it is set.
    ///
    /// # Default
    ///
    /// `info`
    ///
    /// # Environment Variable
    ///
    /// `MLMD_BENCH__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `auto`
    ///
    /// # Environment Variable
    ///
    /// `MLMD_BENCH__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for a benchmark run.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// The store every connection is opened against.
    pub mlmd_config: ConnectionConfig,

    /// Worker thread pool settings.
    pub thread_env_config: ThreadEnvConfig,

    /// Logging settings.
    pub logging: Logging,

    /// Workloads to run, in order.
    pub workload_configs: Vec<WorkloadConfig>,
}

impl Config {
    /// Loads configuration from the YAML file at `path` and the environment.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `MLMD_BENCH__`)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if a workload names an
    /// unknown kind or specification.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.mlmd_config, ConnectionConfig::default());
            assert_eq!(config.thread_env_config.num_threads, 1);
            assert_eq!(config.thread_env_config.max_attempts, Some(10));
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert!(config.workload_configs.is_empty());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MLMD_BENCH__THREAD_ENV_CONFIG__NUM_THREADS", "8");
            jail.set_env("MLMD_BENCH__MLMD_CONFIG__TYPE", "fake_database");
            jail.set_env("MLMD_BENCH__LOGGING__LEVEL", "debug");

            let config = Config::load(None).unwrap();

            assert_eq!(config.thread_env_config.num_threads, 8);
            assert_eq!(config.mlmd_config, ConnectionConfig::FakeDatabase);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            mlmd_config:
                type: in_memory
                name: bench
            thread_env_config:
                num_threads: 4
                max_attempts: 3
            logging:
                format: simplified
            workload_configs:
                - num_operations: 100
                  seed: 42
                  fill_types_config:
                      specification: artifact_type
                      num_properties: { minimum: 1, maximum: 10 }
                - num_operations: 50
                  fill_nodes_config:
                      specification: context
                      update: true
                      num_properties: { minimum: 1, maximum: 3 }
                      string_value_bytes: { minimum: 4, maximum: 16 }
                - num_operations: 10
                  read_events_config:
                      specification: events_by_execution_ids
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(
                config.mlmd_config,
                ConnectionConfig::InMemory {
                    name: "bench".into()
                }
            );
            assert_eq!(config.thread_env_config.num_threads, 4);
            assert_eq!(config.thread_env_config.max_attempts, Some(3));
            assert_eq!(config.logging.format, LogFormat::Simplified);

            let workloads = &dbg!(&config).workload_configs;
            assert_eq!(workloads.len(), 3);
            assert_eq!(
                workloads[0],
                WorkloadConfig {
                    num_operations: 100,
                    seed: Some(42),
                    kind: WorkloadKind::FillTypesConfig(FillTypesConfig {
                        specification: FillTypesSpecification::ArtifactType,
                        update: false,
                        num_properties: UniformDistribution::new(1, 10),
                    }),
                }
            );

            let WorkloadKind::FillNodesConfig(fill_nodes) = &workloads[1].kind else {
                panic!("expected fill_nodes_config");
            };
            assert!(fill_nodes.update);
            assert_eq!(fill_nodes.specification, FillNodesSpecification::Context);
            assert_eq!(workloads[1].seed, None);

            assert_eq!(
                workloads[2].kind,
                WorkloadKind::ReadEventsConfig(ReadEventsConfig {
                    specification: ReadEventsSpecification::EventsByExecutionIds,
                })
            );

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            thread_env_config:
                num_threads: 4
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("MLMD_BENCH__THREAD_ENV_CONFIG__NUM_THREADS", "2");

            let config = Config::load(Some(tempfile.path())).unwrap();
            assert_eq!(config.thread_env_config.num_threads, 2);

            Ok(())
        });
    }

    #[test]
    fn null_max_attempts_retries_forever() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            thread_env_config:
                num_threads: 3
                max_attempts: null
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();
            assert_eq!(config.thread_env_config.num_threads, 3);
            assert_eq!(config.thread_env_config.max_attempts, None);

            Ok(())
        });
    }

    #[test]
    fn unknown_specification_is_rejected() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            workload_configs:
                - num_operations: 1
                  fill_types_config:
                      specification: model_type
                      num_properties: { minimum: 1, maximum: 1 }
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            assert!(Config::load(Some(tempfile.path())).is_err());
            Ok(())
        });
    }

    #[test]
    fn empty_range_is_invalid() {
        let err = UniformDistribution::new(5, 1).sampler().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
