//! Hyperparameter records passed to the forward passes.
//!
//! Each record is plain data owned by the caller. Only [`BatchNormParam`]
//! carries state across calls: its running statistics are written back by
//! every batch-norm forward call, so the same record must be kept for the
//! lifetime of one logical normalization layer.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};

fn default_eps() -> f64 {
    1e-5
}

fn default_momentum() -> f64 {
    0.9
}

/// Whether a stochastic or statistics-tracking layer runs in training or inference mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    #[default]
    Train,
    Test,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Test => "test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Mode::Train),
            "test" => Ok(Mode::Test),
            other => Err(LayerError::InvalidMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = LayerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_string()
    }
}

/// Convolution hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvParam {
    /// Pixels between adjacent receptive fields, both directions
    pub stride: usize,

    /// Zero padding added symmetrically to height and width
    pub pad: usize,
}

impl ConvParam {
    pub fn new(stride: usize, pad: usize) -> Self {
        ConvParam { stride, pad }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let param: Self = serde_json::from_str(json)?;
        param.validate()?;
        Ok(param)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(LayerError::invalid_parameter("stride", "must be positive"));
        }
        Ok(())
    }
}

impl Default for ConvParam {
    fn default() -> Self {
        ConvParam { stride: 1, pad: 0 }
    }
}

/// Max pooling hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolParam {
    pub pool_height: usize,
    pub pool_width: usize,
    pub stride: usize,
}

impl PoolParam {
    pub fn new(pool_height: usize, pool_width: usize, stride: usize) -> Self {
        PoolParam { pool_height, pool_width, stride }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let param: Self = serde_json::from_str(json)?;
        param.validate()?;
        Ok(param)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.pool_height == 0 {
            return Err(LayerError::invalid_parameter("pool_height", "must be positive"));
        }
        if self.pool_width == 0 {
            return Err(LayerError::invalid_parameter("pool_width", "must be positive"));
        }
        if self.stride == 0 {
            return Err(LayerError::invalid_parameter("stride", "must be positive"));
        }
        Ok(())
    }
}

/// Batch normalization hyperparameters and running statistics.
///
/// `running_mean` and `running_var` start out absent and are filled with zeros
/// the first time a forward call sees the feature count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchNormParam {
    pub mode: Mode,

    /// Constant added to the variance before taking the square root
    #[serde(default = "default_eps")]
    pub eps: f64,

    /// Decay of the running statistics
    #[serde(default = "default_momentum")]
    pub momentum: f64,

    #[serde(default)]
    pub running_mean: Option<Array1<f64>>,

    #[serde(default)]
    pub running_var: Option<Array1<f64>>,
}

impl BatchNormParam {
    pub fn new(mode: Mode) -> Self {
        BatchNormParam {
            mode,
            eps: default_eps(),
            momentum: default_momentum(),
            running_mean: None,
            running_var: None,
        }
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Persist the record, running statistics included.
    pub fn save(&self, path: &str) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        let mut file = File::create(path)?;
        file.write_all(&serialized)?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(bincode::deserialize(&data)?)
    }
}

impl Default for BatchNormParam {
    fn default() -> Self {
        BatchNormParam::new(Mode::Train)
    }
}

/// Layer and group normalization hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormParam {
    #[serde(default = "default_eps")]
    pub eps: f64,
}

impl NormParam {
    pub fn new(eps: f64) -> Self {
        NormParam { eps }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for NormParam {
    fn default() -> Self {
        NormParam { eps: default_eps() }
    }
}

/// Inverted dropout hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropoutParam {
    /// Probability of keeping each unit
    pub p: f64,
    pub mode: Mode,

    /// Seed for a reproducible mask; fresh entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl DropoutParam {
    pub fn new(p: f64, mode: Mode) -> Self {
        DropoutParam { p, mode, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let param: Self = serde_json::from_str(json)?;
        param.validate()?;
        Ok(param)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.p > 0.0 && self.p <= 1.0) {
            return Err(LayerError::invalid_parameter(
                "p".to_string(),
                format!("keep probability must lie in (0, 1], got {}", self.p),
            ));
        }
        Ok(())
    }
}
