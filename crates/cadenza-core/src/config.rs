//! Simulation setup, validation, and option-string parsing.
//!
//! [`SimulationSetup`] is the immutable description of the run that the
//! integrators build their phase graphs from. [`validate()`](SimulationSetup::validate)
//! checks its structural invariants before any integrator is built.

use std::fmt;

use tracing::info;

use crate::error::ConfigError;
use crate::flags::SimFlags;

/// Environment variable consulted when no device list is given.
pub const DEVICE_ENV_VAR: &str = "CADENZA_DEVICE";

// ── BoundaryModel ──────────────────────────────────────────────────

/// How solid boundaries are modelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryModel {
    /// Lennard-Jones repulsive boundary forces.
    LennardJones,
    /// Monaghan-Kajtar boundary forces.
    Monaghan,
    /// Dynamic boundary particles.
    Dynamic,
    /// Dummy boundary particles with extrapolated fields.
    Dummy,
    /// Semi-analytical boundaries (boundary elements and vertices).
    SemiAnalytical,
}

impl BoundaryModel {
    /// Printable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::LennardJones => "Lennard-Jones",
            Self::Monaghan => "Monaghan-Kajtar",
            Self::Dynamic => "Dynamic",
            Self::Dummy => "Dummy",
            Self::SemiAnalytical => "Semi-analytical",
        }
    }
}

impl fmt::Display for BoundaryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Filters ────────────────────────────────────────────────────────

/// A density filter that can run between time steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Shepard (zeroth-order) density renormalization.
    Shepard,
    /// Moving-least-squares (first-order) density correction.
    Mls,
}

impl FilterKind {
    /// Printable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Shepard => "Shepard",
            Self::Mls => "MLS",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An enabled filter and how often it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterFreq {
    /// Which filter.
    pub kind: FilterKind,
    /// Run every `frequency` iterations.
    pub frequency: u32,
}

impl FilterFreq {
    /// Create a filter entry.
    pub const fn new(kind: FilterKind, frequency: u32) -> Self {
        Self { kind, frequency }
    }

    /// Whether the filter is due at the given iteration.
    pub fn is_due(&self, iteration: u64) -> bool {
        self.frequency > 0 && iteration % u64::from(self.frequency) == 0
    }
}

// ── EffPresConfig ──────────────────────────────────────────────────

/// Settings of the iterative effective-pressure solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffPresConfig {
    /// Give up iterating after this many passes, converged or not.
    pub max_iterations: u32,
}

impl Default for EffPresConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
        }
    }
}

// ── SimulationSetup ────────────────────────────────────────────────

/// Immutable description of a simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationSetup {
    /// Boundary model.
    pub boundary_model: BoundaryModel,
    /// Enabled simulation features.
    pub flags: SimFlags,
    /// Effective-pressure solver settings; `None` disables the solver.
    pub effpres: Option<EffPresConfig>,
    /// Rebuild the neighbor list every `neib_freq` iterations.
    pub neib_freq: u32,
    /// Enabled filters, in the order they run.
    pub filters: Vec<FilterFreq>,
    /// Devices the run is split across.
    pub devices: Vec<u32>,
    /// Stop after this many iterations, if set.
    pub max_iterations: Option<u64>,
}

impl Default for SimulationSetup {
    fn default() -> Self {
        Self {
            boundary_model: BoundaryModel::LennardJones,
            flags: SimFlags::DEFAULT,
            effpres: None,
            neib_freq: 10,
            filters: Vec::new(),
            devices: vec![0],
            max_iterations: None,
        }
    }
}

impl SimulationSetup {
    /// Check the structural invariants of the setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.neib_freq == 0 {
            return Err(ConfigError::InvalidNeibFreq);
        }
        if let Some(effpres) = &self.effpres {
            if effpres.max_iterations == 0 {
                return Err(ConfigError::InvalidEffPresIterations);
            }
        }
        if self.max_iterations == Some(0) {
            return Err(ConfigError::InvalidMaxIterations);
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if filter.frequency == 0 {
                return Err(ConfigError::InvalidFilterFrequency {
                    filter: filter.kind.name(),
                });
            }
            if self.filters[..i].iter().any(|f| f.kind == filter.kind) {
                return Err(ConfigError::DuplicateFilter {
                    filter: filter.kind.name(),
                });
            }
        }
        check_devices(&self.devices)
    }

    /// Whether the run spans more than one device.
    pub fn multi_device(&self) -> bool {
        self.devices.len() > 1
    }

    /// Whether the effective-pressure solver is enabled.
    pub fn effpres_enabled(&self) -> bool {
        self.effpres.is_some()
    }

    /// Iteration cap of the effective-pressure solver (zero if disabled).
    pub fn effpres_max_iterations(&self) -> u32 {
        self.effpres.map_or(0, |e| e.max_iterations)
    }
}

fn check_devices(devices: &[u32]) -> Result<(), ConfigError> {
    if devices.is_empty() {
        return Err(ConfigError::EmptyDeviceList);
    }
    for (i, &device) in devices.iter().enumerate() {
        if devices[..i].contains(&device) {
            return Err(ConfigError::DuplicateDevice { device });
        }
    }
    Ok(())
}

// ── Option strings ─────────────────────────────────────────────────

/// Parse a comma-separated device list such as `"0,1,3"`.
pub fn parse_device_list(spec: &str) -> Result<Vec<u32>, ConfigError> {
    let devices = spec
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidDeviceToken {
                    token: token.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    check_devices(&devices)?;
    Ok(devices)
}

/// The device list to use when none was given on the command line.
///
/// Reads [`DEVICE_ENV_VAR`], falling back to device 0.
pub fn default_devices() -> Result<Vec<u32>, ConfigError> {
    devices_or_default(std::env::var(DEVICE_ENV_VAR).ok())
}

fn devices_or_default(spec: Option<String>) -> Result<Vec<u32>, ConfigError> {
    let spec = spec
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "0".to_string());
    info!(devices = %spec, "no devices specified, falling back to default");
    parse_device_list(&spec)
}

const TRUE_VALUES: [&str; 3] = ["yes", "true", "1"];
const FALSE_VALUES: [&str; 3] = ["no", "false", "0"];

/// Interpret an option value as a boolean.
///
/// Accepts `yes`/`true`/`1` and `no`/`false`/`0`; anything else is an error
/// naming the option key.
pub fn parse_bool_option(key: &str, value: &str) -> Result<bool, ConfigError> {
    if TRUE_VALUES.contains(&value) {
        Ok(true)
    } else if FALSE_VALUES.contains(&value) {
        Ok(false)
    } else {
        Err(ConfigError::InvalidBoolOption {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
