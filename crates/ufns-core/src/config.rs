//! Simulation and decoder configuration, loadable from TOML.
//!
//! ```toml
//! [lattice]
//! size = 5
//! topology = "planar"
//!
//! [decoder]
//! policy = "node_suspension"
//! max_rounds = 200
//! ```

use crate::lattice::{LatticeError, LatticeGraph, Topology};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid lattice: {0}")]
    Lattice(#[from] LatticeError),
}

// ---------------------------------------------------------------------------
// Decoder configuration
// ---------------------------------------------------------------------------

/// How clusters are ordered into growth rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Every non-neutral cluster grows every round.
    Uniform,
    /// Smaller clusters grow first; bucket `2 * (size - 1) + support`.
    Balanced,
    /// Node-trees hold back the parts of a cluster that still owe delay.
    #[default]
    NodeSuspension,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub policy: GrowthPolicy,
    /// Last bucket index that may run. `None` derives a bound from the
    /// lattice size.
    pub max_rounds: Option<u32>,
}

impl DecoderConfig {
    pub fn with_policy(policy: GrowthPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Round limit for `graph`: the configured one, or eight half-steps per
    /// vertex, which no converging run can exceed.
    pub fn round_limit(&self, graph: &LatticeGraph) -> u32 {
        self.max_rounds.unwrap_or_else(|| {
            let vertices = graph.stabilizer_count() + graph.boundary_count();
            (8 * vertices).max(16) as u32
        })
    }
}

// ---------------------------------------------------------------------------
// Lattice configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeConfig {
    pub size: usize,
    #[serde(default)]
    pub topology: Topology,
}

impl LatticeConfig {
    pub fn build(&self) -> Result<LatticeGraph, LatticeError> {
        match self.topology {
            Topology::Toric => LatticeGraph::toric(self.size),
            Topology::Planar => LatticeGraph::planar(self.size),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
}

impl SimulationConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lattice.size < 2 {
            return Err(LatticeError::InvalidSize(self.lattice.size).into());
        }
        Ok(())
    }
}
