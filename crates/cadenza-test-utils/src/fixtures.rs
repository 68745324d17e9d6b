//! Reusable simulation setups.
//!
//! Each fixture returns a valid [`SimulationSetup`] exercising one
//! family of optional phase-graph features:
//!
//! - [`basic_setup`]: Lennard-Jones boundaries, nothing optional.
//! - [`boundary_setup`]: a given boundary model.
//! - [`effpres_setup`]: the effective-pressure solver with a small cap.
//! - [`filtered_setup`]: Shepard every step and MLS every other step.
//! - [`multi_device_setup`]: two devices (halo imports).
//! - [`full_setup`]: everything at once.

use cadenza_core::{
    BoundaryModel, EffPresConfig, FilterFreq, FilterKind, SimFlags, SimulationSetup,
};

pub fn basic_setup() -> SimulationSetup {
    SimulationSetup {
        neib_freq: 2,
        ..Default::default()
    }
}

pub fn boundary_setup(boundary_model: BoundaryModel) -> SimulationSetup {
    SimulationSetup {
        boundary_model,
        ..basic_setup()
    }
}

pub fn effpres_setup(max_iterations: u32) -> SimulationSetup {
    SimulationSetup {
        effpres: Some(EffPresConfig { max_iterations }),
        ..basic_setup()
    }
}

pub fn filtered_setup() -> SimulationSetup {
    SimulationSetup {
        filters: vec![
            FilterFreq::new(FilterKind::Shepard, 1),
            FilterFreq::new(FilterKind::Mls, 2),
        ],
        ..basic_setup()
    }
}

pub fn multi_device_setup() -> SimulationSetup {
    SimulationSetup {
        devices: vec![0, 1],
        ..basic_setup()
    }
}

pub fn full_setup() -> SimulationSetup {
    SimulationSetup {
        boundary_model: BoundaryModel::SemiAnalytical,
        flags: SimFlags::DEFAULT
            | SimFlags::XSPH
            | SimFlags::MOVING_BODIES
            | SimFlags::INLET_OUTLET
            | SimFlags::DENSITY_SUM
            | SimFlags::INTERNAL_ENERGY,
        effpres: Some(EffPresConfig { max_iterations: 4 }),
        devices: vec![0, 1, 2],
        ..filtered_setup()
    }
}
