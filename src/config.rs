//! Configuration for the simulation core.
//!
//! Configuration comes from YAML or JSON files and is exposed two ways:
//!
//! - [`ConfigStore`] is a hierarchical key/value store addressed by
//!   `/`-separated paths such as `network/bus/bandwidth`.
//! - Typed parameter structs ([`GeneralParams`], [`BusParams`],
//!   [`EMeshParams`], ...) are read out of the store once and handed to model
//!   constructors. A required parameter that is missing or malformed is a
//!   fatal [`ConfigError`]: link timing is load-bearing for the results, so
//!   nothing is silently defaulted.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! general:
//!   total_cores: 16
//!   num_processes: 1
//!   core_frequency: 1.0        # GHz
//!
//! network:
//!   user: emesh_hop_by_hop_basic
//!   mcp_detour: false
//!   emesh_hop_by_hop_basic:
//!     link_bandwidth: 64       # bits/cycle
//!     hop_latency: 2           # cycles
//!     broadcast_tree_enabled: false
//!     queue_model:
//!       enabled: true
//!       type: contention
//!
//! progress_trace:
//!   enabled: false
//!   interval: 5000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::instruction::InstructionType;
use crate::network::NetworkModelType;
use crate::queue_model::QueueModelType;
use crate::time::ComponentPeriod;
use crate::types::{CoreId, CoreList, ProcessId};

/// Errors that can occur while loading or reading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing configuration parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid value for configuration parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Hierarchical key/value configuration store.
///
/// Sections nest arbitrarily; leaves may be numbers, booleans or strings.
/// Numeric and boolean getters also accept their string spelling so that
/// values coming from text-only sources (`"64"`, `"true"`) work unchanged.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    root: serde_yaml::Value,
    case_sensitive: bool,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()))
    }
}

impl ConfigStore {
    /// Wraps an already-parsed document. Key lookup is case-insensitive.
    pub fn new(root: serde_yaml::Value) -> Self {
        Self {
            root,
            case_sensitive: false,
        }
    }

    /// Makes key lookup case-sensitive.
    pub fn case_sensitive(mut self, enable: bool) -> Self {
        self.case_sensitive = enable;
        self
    }

    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        Ok(Self::new(serde_yaml::from_str(yaml)?))
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Loads a store from a file, picking the format from the extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let content = std::fs::read_to_string(path)?;

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Serializes any typed configuration into a store.
    pub fn from_serializable<T: Serialize>(value: &T) -> ConfigResult<Self> {
        Ok(Self::new(serde_yaml::to_value(value)?))
    }

    /// The underlying document.
    pub fn root(&self) -> &serde_yaml::Value {
        &self.root
    }

    pub(crate) fn key_matches(&self, key: &serde_yaml::Value, name: &str) -> bool {
        match key.as_str() {
            Some(k) if self.case_sensitive => k == name,
            Some(k) => k.eq_ignore_ascii_case(name),
            None => false,
        }
    }

    /// Looks up the value at a `/`-separated path.
    pub fn lookup(&self, path: &str) -> Option<&serde_yaml::Value> {
        let mut node = &self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let mapping = node.as_mapping()?;
            node = mapping
                .iter()
                .find(|(k, _)| self.key_matches(k, part))
                .map(|(_, v)| v)?;
        }
        Some(node)
    }

    /// Returns true if a key or section exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    fn require(&self, path: &str) -> ConfigResult<&serde_yaml::Value> {
        match self.lookup(path) {
            Some(serde_yaml::Value::Null) | None => {
                Err(ConfigError::MissingParameter(path.to_string()))
            }
            Some(v) => Ok(v),
        }
    }

    pub fn get_int(&self, path: &str) -> ConfigResult<i64> {
        let value = self.require(path)?;
        match value {
            serde_yaml::Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| ConfigError::invalid(path, format!("{:?} is not an integer", n))),
            serde_yaml::Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(path, format!("'{}' is not an integer", s))),
            other => Err(ConfigError::invalid(
                path,
                format!("expected an integer, found {:?}", other),
            )),
        }
    }

    /// Reads a non-negative integer.
    pub fn get_uint(&self, path: &str) -> ConfigResult<u64> {
        let value = self.get_int(path)?;
        u64::try_from(value)
            .map_err(|_| ConfigError::invalid(path, format!("{} is negative", value)))
    }

    pub fn get_bool(&self, path: &str) -> ConfigResult<bool> {
        let value = self.require(path)?;
        match value {
            serde_yaml::Value::Bool(b) => Ok(*b),
            serde_yaml::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(ConfigError::invalid(path, format!("'{}' is not a boolean", s))),
            },
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(ConfigError::invalid(path, format!("{:?} is not a boolean", n))),
            },
            other => Err(ConfigError::invalid(
                path,
                format!("expected a boolean, found {:?}", other),
            )),
        }
    }

    pub fn get_float(&self, path: &str) -> ConfigResult<f64> {
        let value = self.require(path)?;
        match value {
            serde_yaml::Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ConfigError::invalid(path, format!("{:?} is not a number", n))),
            serde_yaml::Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(path, format!("'{}' is not a number", s))),
            other => Err(ConfigError::invalid(
                path,
                format!("expected a number, found {:?}", other),
            )),
        }
    }

    pub fn get_string(&self, path: &str) -> ConfigResult<String> {
        let value = self.require(path)?;
        match value {
            serde_yaml::Value::String(s) => Ok(s.clone()),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            other => Err(ConfigError::invalid(
                path,
                format!("expected a string, found {:?}", other),
            )),
        }
    }

    // The `_or` getters default only when the key is absent; a present but
    // malformed value is still an error.

    pub fn get_uint_or(&self, path: &str, default: u64) -> ConfigResult<u64> {
        if self.contains(path) {
            self.get_uint(path)
        } else {
            Ok(default)
        }
    }

    pub fn get_bool_or(&self, path: &str, default: bool) -> ConfigResult<bool> {
        if self.contains(path) {
            self.get_bool(path)
        } else {
            Ok(default)
        }
    }

    pub fn get_float_or(&self, path: &str, default: f64) -> ConfigResult<f64> {
        if self.contains(path) {
            self.get_float(path)
        } else {
            Ok(default)
        }
    }

    pub fn get_string_or(&self, path: &str, default: &str) -> ConfigResult<String> {
        if self.contains(path) {
            self.get_string(path)
        } else {
            Ok(default.to_string())
        }
    }

    /// Parses a string parameter with `FromStr`.
    pub fn get_parsed<T>(&self, path: &str) -> ConfigResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get_string(path)?;
        raw.parse()
            .map_err(|e: T::Err| ConfigError::invalid(path, e.to_string()))
    }
}

/// Process-level simulation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneralParams {
    /// Total number of simulated cores, control-plane core included.
    pub total_cores: u32,
    /// Number of host processes.
    pub num_processes: u32,
    /// Process number of this process.
    pub current_process: ProcessId,
    /// Core clock frequency in GHz.
    pub core_frequency: f64,
    /// Whether instructions are costed at all.
    pub enable_performance_modeling: bool,
    /// Run each core's performance model on its own host thread.
    pub perf_model_own_thread: bool,
    /// Directory for per-core output files.
    pub output_dir: String,
}

fn u32_param(store: &ConfigStore, path: &str, default: u32) -> ConfigResult<u32> {
    let value = store.get_uint_or(path, u64::from(default))?;
    u32::try_from(value).map_err(|_| ConfigError::invalid(path, format!("{} does not fit in 32 bits", value)))
}

impl GeneralParams {
    pub fn new(total_cores: u32) -> Self {
        Self {
            total_cores,
            num_processes: 1,
            current_process: 0,
            core_frequency: 1.0,
            enable_performance_modeling: true,
            perf_model_own_thread: false,
            output_dir: "output".to_string(),
        }
    }

    pub fn from_store(store: &ConfigStore) -> ConfigResult<Self> {
        let total_cores = store.get_uint("general/total_cores")?;
        let total_cores = u32::try_from(total_cores)
            .map_err(|_| ConfigError::invalid("general/total_cores", "too many cores"))?;

        Ok(Self {
            total_cores,
            num_processes: u32_param(store, "general/num_processes", 1)?,
            current_process: u32_param(store, "general/current_process", 0)?,
            core_frequency: store.get_float_or("general/core_frequency", 1.0)?,
            enable_performance_modeling: store
                .get_bool_or("general/enable_performance_modeling", true)?,
            perf_model_own_thread: store.get_bool_or("general/perf_model_own_thread", false)?,
            output_dir: store.get_string_or("general/output_dir", "output")?,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.total_cores == 0 {
            return Err(ConfigError::Validation(
                "general/total_cores must be positive".to_string(),
            ));
        }
        if self.num_processes == 0 || self.num_processes > self.total_cores {
            return Err(ConfigError::Validation(format!(
                "general/num_processes must be in 1..={}, got {}",
                self.total_cores, self.num_processes
            )));
        }
        if self.current_process >= self.num_processes {
            return Err(ConfigError::Validation(format!(
                "general/current_process {} out of range for {} processes",
                self.current_process, self.num_processes
            )));
        }
        if ComponentPeriod::from_ghz(self.core_frequency).is_none() {
            return Err(ConfigError::invalid(
                "general/core_frequency",
                format!("{} GHz is not a usable frequency", self.core_frequency),
            ));
        }
        Ok(())
    }
}

/// Queue-model selection for a network resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueModelParams {
    /// With queue modeling disabled a mesh degrades to a pure hop counter.
    pub enabled: bool,
    #[serde(rename = "type")]
    pub model_type: QueueModelType,
}

impl QueueModelParams {
    pub fn enabled(model_type: QueueModelType) -> Self {
        Self {
            enabled: true,
            model_type,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            model_type: QueueModelType::Contention,
        }
    }
}

/// Parameters of the shared bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusParams {
    /// Bus bandwidth in bits per core cycle.
    pub bandwidth: u64,
    pub queue_model: QueueModelParams,
}

impl BusParams {
    pub const SECTION: &'static str = "network/bus";

    pub fn new(bandwidth: u64) -> Self {
        Self {
            bandwidth,
            queue_model: QueueModelParams::enabled(QueueModelType::Contention),
        }
    }

    pub fn from_store(store: &ConfigStore) -> ConfigResult<Self> {
        let bandwidth = store.get_uint("network/bus/bandwidth")?;
        if bandwidth == 0 {
            return Err(ConfigError::invalid(
                "network/bus/bandwidth",
                "bandwidth must be positive",
            ));
        }
        let model_type = if store.contains("network/bus/queue_model/type") {
            store.get_parsed("network/bus/queue_model/type")?
        } else {
            QueueModelType::Contention
        };

        Ok(Self {
            bandwidth,
            queue_model: QueueModelParams {
                enabled: store.get_bool_or("network/bus/queue_model/enabled", true)?,
                model_type,
            },
        })
    }
}

/// Parameters of the hop-by-hop electrical mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EMeshParams {
    /// Link bandwidth in bits per core cycle.
    pub link_bandwidth: u64,
    /// Per-hop router+link latency in core cycles.
    pub hop_latency: u64,
    pub queue_model: QueueModelParams,
    pub broadcast_tree_enabled: bool,
}

impl EMeshParams {
    pub const SECTION: &'static str = "network/emesh_hop_by_hop_basic";

    pub fn new(link_bandwidth: u64, hop_latency: u64) -> Self {
        Self {
            link_bandwidth,
            hop_latency,
            queue_model: QueueModelParams::enabled(QueueModelType::Contention),
            broadcast_tree_enabled: false,
        }
    }

    pub fn with_queue_model(mut self, queue_model: QueueModelParams) -> Self {
        self.queue_model = queue_model;
        self
    }

    pub fn with_broadcast_tree(mut self, enable: bool) -> Self {
        self.broadcast_tree_enabled = enable;
        self
    }

    pub fn from_store(store: &ConfigStore) -> ConfigResult<Self> {
        const LINK_BANDWIDTH: &str = "network/emesh_hop_by_hop_basic/link_bandwidth";

        let link_bandwidth = store.get_uint(LINK_BANDWIDTH)?;
        if link_bandwidth == 0 {
            return Err(ConfigError::invalid(
                LINK_BANDWIDTH,
                "bandwidth must be positive",
            ));
        }

        Ok(Self {
            link_bandwidth,
            hop_latency: store.get_uint("network/emesh_hop_by_hop_basic/hop_latency")?,
            queue_model: QueueModelParams {
                enabled: store.get_bool("network/emesh_hop_by_hop_basic/queue_model/enabled")?,
                model_type: store.get_parsed("network/emesh_hop_by_hop_basic/queue_model/type")?,
            },
            broadcast_tree_enabled: store
                .get_bool_or("network/emesh_hop_by_hop_basic/broadcast_tree_enabled", false)?,
        })
    }
}

/// Network selection and per-topology parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Topology used for core-to-core traffic.
    pub user: NetworkModelType,
    /// Exclude traffic to or from the control-plane core from contention
    /// accounting.
    pub mcp_detour: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<BusParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emesh_hop_by_hop_basic: Option<EMeshParams>,
}

impl NetworkParams {
    pub fn from_store(store: &ConfigStore) -> ConfigResult<Self> {
        let user: NetworkModelType = store.get_parsed("network/user")?;

        // The selected topology's parameters are mandatory; the others are
        // read only when their section is present.
        let bus = if user == NetworkModelType::Bus || store.contains(BusParams::SECTION) {
            Some(BusParams::from_store(store)?)
        } else {
            None
        };
        let emesh = if user == NetworkModelType::EMeshHopByHopBasic
            || store.contains(EMeshParams::SECTION)
        {
            Some(EMeshParams::from_store(store)?)
        } else {
            None
        };

        Ok(Self {
            user,
            mcp_detour: store.get_bool_or("network/mcp_detour", false)?,
            bus,
            emesh_hop_by_hop_basic: emesh,
        })
    }
}

/// Per-core progress trace parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTraceParams {
    pub enabled: bool,
    /// Minimum cycle advance between two trace lines.
    pub interval: u64,
}

impl Default for ProgressTraceParams {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 0,
        }
    }
}

impl ProgressTraceParams {
    pub fn enabled(interval: u64) -> Self {
        Self {
            enabled: true,
            interval,
        }
    }

    pub fn from_store(store: &ConfigStore) -> ConfigResult<Self> {
        if !store.get_bool_or("progress_trace/enabled", false)? {
            return Ok(Self::default());
        }
        let params = Self::enabled(store.get_uint("progress_trace/interval")?);
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.enabled && self.interval == 0 {
            return Err(ConfigError::invalid(
                "progress_trace/interval",
                "progress trace interval is zero",
            ));
        }
        Ok(())
    }
}

/// Static per-type instruction costs, in core cycles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticInstructionCosts {
    costs: BTreeMap<InstructionType, u64>,
}

impl Default for StaticInstructionCosts {
    fn default() -> Self {
        let costs = InstructionType::STATIC
            .iter()
            .map(|ty| (*ty, ty.default_cycles()))
            .collect();
        Self { costs }
    }
}

impl StaticInstructionCosts {
    pub fn from_store(store: &ConfigStore) -> ConfigResult<Self> {
        if let Some(section) = store.lookup("static_instruction_costs") {
            if let Some(mapping) = section.as_mapping() {
                for key in mapping.keys() {
                    let known = InstructionType::STATIC
                        .iter()
                        .any(|ty| store.key_matches(key, ty.name()));
                    if !known {
                        let name = key.as_str().map_or_else(|| format!("{:?}", key), str::to_string);
                        let path = format!("static_instruction_costs/{}", name);
                        return Err(ConfigError::invalid(&path, "not a statically costed instruction type"));
                    }
                }
            } else if !section.is_null() {
                return Err(ConfigError::invalid(
                    "static_instruction_costs",
                    "expected a mapping of instruction type to cycles",
                ));
            }
        }

        let mut table = Self::default();
        for ty in InstructionType::STATIC {
            let key = format!("static_instruction_costs/{}", ty.name());
            if store.contains(&key) {
                table.set(*ty, store.get_uint(&key)?);
            }
        }
        Ok(table)
    }

    /// Cycle cost of a statically costed instruction type, `None` for types
    /// whose cost is only known at run time.
    pub fn get(&self, ty: InstructionType) -> Option<u64> {
        self.costs.get(&ty).copied()
    }

    pub fn set(&mut self, ty: InstructionType, cycles: u64) {
        self.costs.insert(ty, cycles);
    }
}

/// Complete simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub general: GeneralParams,
    pub network: NetworkParams,
    #[serde(default)]
    pub progress_trace: ProgressTraceParams,
    #[serde(default)]
    pub static_instruction_costs: StaticInstructionCosts,
}

impl SimConfig {
    /// Reads every typed section out of a store and validates the result.
    pub fn from_store(store: &ConfigStore) -> ConfigResult<Self> {
        let config = Self {
            general: GeneralParams::from_store(store)?,
            network: NetworkParams::from_store(store)?,
            progress_trace: ProgressTraceParams::from_store(store)?,
            static_instruction_costs: StaticInstructionCosts::from_store(store)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        Self::from_store(&ConfigStore::from_yaml(yaml)?)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Self::from_store(&ConfigStore::from_json(json)?)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        Self::from_store(&ConfigStore::from_file(path)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.general.validate()?;
        self.progress_trace.validate()?;

        match self.network.user {
            NetworkModelType::Bus if self.network.bus.is_none() => {
                return Err(ConfigError::MissingParameter(BusParams::SECTION.to_string()));
            }
            NetworkModelType::EMeshHopByHopBasic if self.network.emesh_hop_by_hop_basic.is_none() => {
                return Err(ConfigError::MissingParameter(EMeshParams::SECTION.to_string()));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn total_cores(&self) -> u32 {
        self.general.total_cores
    }

    /// The control-plane core is always the last core.
    pub fn mcp_core(&self) -> CoreId {
        self.general.total_cores - 1
    }

    /// Cores are dealt out to processes round-robin.
    pub fn process_for_core(&self, core: CoreId) -> ProcessId {
        core % self.general.num_processes
    }

    pub fn core_list_for_process(&self, process: ProcessId) -> CoreList {
        (0..self.general.total_cores)
            .filter(|&core| self.process_for_core(core) == process)
            .collect()
    }

    pub fn core_list_for_current_process(&self) -> CoreList {
        self.core_list_for_process(self.general.current_process)
    }

    pub fn num_local_cores(&self) -> usize {
        self.core_list_for_current_process().len()
    }

    /// Clock domain of the cores.
    pub fn core_domain(&self) -> ConfigResult<ComponentPeriod> {
        ComponentPeriod::from_ghz(self.general.core_frequency).ok_or_else(|| {
            ConfigError::invalid(
                "general/core_frequency",
                format!("{} GHz is not a usable frequency", self.general.core_frequency),
            )
        })
    }
}

/// Builder for creating a [`SimConfig`] programmatically.
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Starts from a `total_cores` system on a magic (zero-latency) network.
    pub fn new(total_cores: u32) -> Self {
        Self {
            config: SimConfig {
                general: GeneralParams::new(total_cores),
                network: NetworkParams {
                    user: NetworkModelType::Magic,
                    mcp_detour: false,
                    bus: None,
                    emesh_hop_by_hop_basic: None,
                },
                progress_trace: ProgressTraceParams::default(),
                static_instruction_costs: StaticInstructionCosts::default(),
            },
        }
    }

    pub fn processes(mut self, num_processes: u32, current: ProcessId) -> Self {
        self.config.general.num_processes = num_processes;
        self.config.general.current_process = current;
        self
    }

    pub fn core_frequency(mut self, ghz: f64) -> Self {
        self.config.general.core_frequency = ghz;
        self
    }

    pub fn perf_model_own_thread(mut self, enable: bool) -> Self {
        self.config.general.perf_model_own_thread = enable;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.general.output_dir = dir.into();
        self
    }

    pub fn bus(mut self, params: BusParams) -> Self {
        self.config.network.user = NetworkModelType::Bus;
        self.config.network.bus = Some(params);
        self
    }

    pub fn emesh(mut self, params: EMeshParams) -> Self {
        self.config.network.user = NetworkModelType::EMeshHopByHopBasic;
        self.config.network.emesh_hop_by_hop_basic = Some(params);
        self
    }

    pub fn mcp_detour(mut self, enable: bool) -> Self {
        self.config.network.mcp_detour = enable;
        self
    }

    pub fn progress_trace(mut self, params: ProgressTraceParams) -> Self {
        self.config.progress_trace = params;
        self
    }

    pub fn instruction_cost(mut self, ty: InstructionType, cycles: u64) -> Self {
        self.config.static_instruction_costs.set(ty, cycles);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
