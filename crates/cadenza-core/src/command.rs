//! The closed set of commands the integrator can issue, with their
//! static traits.
//!
//! Commands fall into two groups: "administrative" commands that manage
//! named states and buffers (creating, renaming, sharing, importing from
//! peer devices) and the numerical kernels of the scheme. Which buffers a
//! particular command instance touches is declared by the integrator on
//! the command descriptor; the traits here are per-kind defaults only.

use std::fmt;

/// How a kind of command uses particle buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// The command touches no buffer.
    None,
    /// The command always works on the same set of buffers.
    Static,
    /// The command needs a parameter specifying the buffers to operate on.
    Dynamic,
}

/// A kind of schedulable command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Do nothing.
    Idle,

    // ── state management ───────────────────────────────────────
    /// Create an empty named state (`dst`).
    InitState,
    /// Rename state `src` to `dst`.
    RenameState,
    /// Release state `src` and all of its buffers.
    ReleaseState,
    /// Make the declared buffers of `src` also visible in `dst`.
    ShareBuffers,
    /// Exchange the declared buffers between `src` and `dst`.
    SwapStateBuffers,
    /// Move the declared buffers from `src` to `dst`.
    MoveStateBuffers,
    /// Import the declared buffers of halo particles from peer devices.
    UpdateExternal,

    // ── neighbor search ────────────────────────────────────────
    /// Compute the cell hash of each particle.
    CalcHash,
    /// Sort particles by hash.
    Sort,
    /// Reorder particle data following the sort.
    Reorder,
    /// Build the neighbor list.
    BuildNeibs,

    // ── integration ────────────────────────────────────────────
    /// Compute forces and the CFL time-step bound.
    Forces,
    /// Euler update of positions and velocities.
    Euler,
    /// Density by summation.
    DensitySum,
    /// Integrate the dynamic gamma equation.
    IntegrateGamma,
    /// Compute the initial renormalization factor gamma.
    InitGamma,
    /// Reduce per-object forces and torques on the host.
    ReduceBodiesForces,
    /// Advance moving bodies on the host.
    MoveBodies,

    // ── boundary conditions ────────────────────────────────────
    /// Semi-analytical boundary conditions on boundary elements.
    SaSegmentBoundaryConditions,
    /// Semi-analytical boundary conditions on vertices.
    SaVertexBoundaryConditions,
    /// Dummy-particle boundary conditions.
    DummyBoundaryConditions,
    /// Initial mass of open-boundary vertices.
    InitIoMass,
    /// Disable particles that left the domain through an outlet.
    DisableOutgoing,

    // ── effective pressure solver ──────────────────────────────
    /// Clear the solver's convergence flag.
    JacobiResetStopCriterion,
    /// Free-surface boundary conditions for the effective pressure.
    JacobiFsBoundaryConditions,
    /// Wall boundary conditions for the effective pressure.
    JacobiWallBoundaryConditions,
    /// Assemble the Jacobi matrix and right-hand side.
    JacobiBuildVectors,
    /// One Jacobi update of the effective pressure.
    JacobiUpdateEffPres,
    /// Evaluate the residual and set the convergence flag.
    JacobiStopCriterion,

    // ── post-processing ────────────────────────────────────────
    /// Run the integrator's current filter.
    Filter,
    /// Final adjustments at the end of particle repacking.
    RepackingFinalize,
}

impl CommandKind {
    /// Every command kind, in declaration order.
    pub const ALL: [CommandKind; 32] = [
        Self::Idle,
        Self::InitState,
        Self::RenameState,
        Self::ReleaseState,
        Self::ShareBuffers,
        Self::SwapStateBuffers,
        Self::MoveStateBuffers,
        Self::UpdateExternal,
        Self::CalcHash,
        Self::Sort,
        Self::Reorder,
        Self::BuildNeibs,
        Self::Forces,
        Self::Euler,
        Self::DensitySum,
        Self::IntegrateGamma,
        Self::InitGamma,
        Self::ReduceBodiesForces,
        Self::MoveBodies,
        Self::SaSegmentBoundaryConditions,
        Self::SaVertexBoundaryConditions,
        Self::DummyBoundaryConditions,
        Self::InitIoMass,
        Self::DisableOutgoing,
        Self::JacobiResetStopCriterion,
        Self::JacobiFsBoundaryConditions,
        Self::JacobiWallBoundaryConditions,
        Self::JacobiBuildVectors,
        Self::JacobiUpdateEffPres,
        Self::JacobiStopCriterion,
        Self::Filter,
        Self::RepackingFinalize,
    ];

    /// Printable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::InitState => "INIT_STATE",
            Self::RenameState => "RENAME_STATE",
            Self::ReleaseState => "RELEASE_STATE",
            Self::ShareBuffers => "SHARE_BUFFERS",
            Self::SwapStateBuffers => "SWAP_STATE_BUFFERS",
            Self::MoveStateBuffers => "MOVE_STATE_BUFFERS",
            Self::UpdateExternal => "UPDATE_EXTERNAL",
            Self::CalcHash => "CALCHASH",
            Self::Sort => "SORT",
            Self::Reorder => "REORDER",
            Self::BuildNeibs => "BUILDNEIBS",
            Self::Forces => "FORCES",
            Self::Euler => "EULER",
            Self::DensitySum => "DENSITY_SUM",
            Self::IntegrateGamma => "INTEGRATE_GAMMA",
            Self::InitGamma => "INIT_GAMMA",
            Self::ReduceBodiesForces => "REDUCE_BODIES_FORCES",
            Self::MoveBodies => "MOVE_BODIES",
            Self::SaSegmentBoundaryConditions => "SA_SEGMENT_BOUNDARY_CONDITIONS",
            Self::SaVertexBoundaryConditions => "SA_VERTEX_BOUNDARY_CONDITIONS",
            Self::DummyBoundaryConditions => "DUMMY_BOUNDARY_CONDITIONS",
            Self::InitIoMass => "INIT_IO_MASS",
            Self::DisableOutgoing => "DISABLE_OUTGOING",
            Self::JacobiResetStopCriterion => "JACOBI_RESET_STOP_CRITERION",
            Self::JacobiFsBoundaryConditions => "JACOBI_FS_BOUNDARY_CONDITIONS",
            Self::JacobiWallBoundaryConditions => "JACOBI_WALL_BOUNDARY_CONDITIONS",
            Self::JacobiBuildVectors => "JACOBI_BUILD_VECTORS",
            Self::JacobiUpdateEffPres => "JACOBI_UPDATE_EFFPRES",
            Self::JacobiStopCriterion => "JACOBI_STOP_CRITERION",
            Self::Filter => "FILTER",
            Self::RepackingFinalize => "REPACKING_FINALIZE",
        }
    }

    /// Whether the command runs only on particles owned by this device
    /// (as opposed to halo copies imported from peers).
    pub const fn only_internal(self) -> bool {
        match self {
            Self::Idle
            | Self::InitState
            | Self::RenameState
            | Self::ReleaseState
            | Self::ShareBuffers
            | Self::SwapStateBuffers
            | Self::MoveStateBuffers
            | Self::UpdateExternal
            | Self::CalcHash
            | Self::Sort
            | Self::Reorder
            | Self::ReduceBodiesForces
            | Self::MoveBodies
            | Self::JacobiResetStopCriterion
            | Self::JacobiStopCriterion => false,
            Self::BuildNeibs
            | Self::Forces
            | Self::Euler
            | Self::DensitySum
            | Self::IntegrateGamma
            | Self::InitGamma
            | Self::SaSegmentBoundaryConditions
            | Self::SaVertexBoundaryConditions
            | Self::DummyBoundaryConditions
            | Self::InitIoMass
            | Self::DisableOutgoing
            | Self::JacobiFsBoundaryConditions
            | Self::JacobiWallBoundaryConditions
            | Self::JacobiBuildVectors
            | Self::JacobiUpdateEffPres
            | Self::Filter
            | Self::RepackingFinalize => true,
        }
    }

    /// How the command uses buffers.
    pub const fn buffer_usage(self) -> BufferUsage {
        match self {
            Self::Idle
            | Self::InitState
            | Self::RenameState
            | Self::ReleaseState
            | Self::MoveBodies
            | Self::JacobiResetStopCriterion => BufferUsage::None,
            Self::ShareBuffers
            | Self::SwapStateBuffers
            | Self::MoveStateBuffers
            | Self::UpdateExternal => BufferUsage::Dynamic,
            _ => BufferUsage::Static,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = CommandKind::ALL.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CommandKind::ALL.len());
    }

    #[test]
    fn state_management_is_not_internal() {
        assert!(!CommandKind::RenameState.only_internal());
        assert!(!CommandKind::UpdateExternal.only_internal());
        assert!(CommandKind::Forces.only_internal());
        assert!(CommandKind::Filter.only_internal());
    }

    #[test]
    fn buffer_usage_table() {
        assert_eq!(CommandKind::Idle.buffer_usage(), BufferUsage::None);
        assert_eq!(CommandKind::SwapStateBuffers.buffer_usage(), BufferUsage::Dynamic);
        assert_eq!(CommandKind::Euler.buffer_usage(), BufferUsage::Static);
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(CommandKind::BuildNeibs.to_string(), "BUILDNEIBS");
    }
}
