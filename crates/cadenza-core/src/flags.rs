//! Bit-flag fields: per-command modifiers ([`CommandFlags`]) and the
//! enabled simulation features ([`SimFlags`]).

bitflags::bitflags! {
    /// Scheme-specific modifiers attached to a command.
    ///
    /// The integration step bits tell the backend which stage of the
    /// scheme a kernel belongs to; the particle type bits restrict a
    /// kernel to a subset of particles.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct CommandFlags: u64 {
        /// Command belongs to the initialization step (before the main loop).
        const INITIALIZATION_STEP = 1 << 0;
        /// Command belongs to the first integration step (predictor).
        const INTEGRATOR_STEP_1 = 1 << 1;
        /// Command belongs to the second integration step (corrector).
        const INTEGRATOR_STEP_2 = 1 << 2;
        /// Every integration step bit.
        const ALL_INTEGRATION_STEPS = Self::INITIALIZATION_STEP.bits()
            | Self::INTEGRATOR_STEP_1.bits()
            | Self::INTEGRATOR_STEP_2.bits();

        /// Restrict to fluid particles.
        const FLUID = 1 << 8;
        /// Restrict to boundary particles.
        const BOUNDARY = 1 << 9;
        /// Restrict to vertex particles.
        const VERTEX = 1 << 10;
        /// Every particle type bit.
        const ALL_PARTICLE_TYPES = Self::FLUID.bits() | Self::BOUNDARY.bits() | Self::VERTEX.bits();

        /// Kernels run in repacking mode (no gravity, artificial damping).
        const REPACKING = 1 << 16;
    }
}

impl Default for CommandFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags::bitflags! {
    /// Enabled simulation features.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct SimFlags: u64 {
        /// Adaptive time-stepping.
        const DTADAPT = 1 << 0;
        /// XSPH velocity correction.
        const XSPH = 1 << 1;
        /// Analytical planes.
        const PLANES = 1 << 2;
        /// Digital elevation model topography.
        const DEM = 1 << 3;
        /// Moving boundaries and rigid bodies.
        const MOVING_BODIES = 1 << 4;
        /// Open boundaries (inlet/outlet).
        const INLET_OUTLET = 1 << 5;
        /// Water depth computation.
        const WATER_DEPTH = 1 << 6;
        /// Summation density.
        const DENSITY_SUM = 1 << 7;
        /// Gamma from Gauss quadrature instead of the dynamic gamma equation.
        const GAMMA_QUADRATURE = 1 << 8;
        /// Particle repacking before the simulation proper.
        const REPACKING = 1 << 9;
        /// Internal energy computation.
        const INTERNAL_ENERGY = 1 << 10;
        /// Multi-fluid support.
        const MULTIFLUID = 1 << 11;
    }
}

impl SimFlags {
    /// The flags enabled by default.
    pub const DEFAULT: Self = Self::DTADAPT;

    /// `true` unless gamma comes from Gauss quadrature.
    pub const fn using_dynamic_gamma(self) -> bool {
        !self.contains(Self::GAMMA_QUADRATURE)
    }
}

impl Default for SimFlags {
    fn default() -> Self {
        Self::empty()
    }
}
