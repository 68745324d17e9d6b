//! Integrator step metadata attached to each command.

use std::fmt;

use crate::flags::CommandFlags;

/// Which step of the integration scheme a command belongs to.
///
/// By convention `-1` means undetermined, `0` is the initialization
/// before the main loop, and `1, 2, ...` are the successive steps of the
/// scheme (predictor, corrector).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StepInfo {
    /// Step number.
    pub number: i32,
    /// Whether this is the last step of the scheme.
    pub last: bool,
}

impl StepInfo {
    /// Step number of commands that belong to no particular step.
    pub const UNDETERMINED: i32 = -1;

    /// A step with the given number, not marked last.
    pub const fn new(number: i32) -> Self {
        Self {
            number,
            last: false,
        }
    }

    /// The undetermined step.
    pub const fn undetermined() -> Self {
        Self::new(Self::UNDETERMINED)
    }

    /// The initialization step (number 0).
    pub const fn initialization() -> Self {
        Self::new(0)
    }

    /// Copy of `self` marked as the last step.
    pub const fn into_last(self) -> Self {
        Self {
            number: self.number,
            last: true,
        }
    }

    /// `true` for the undetermined step.
    pub const fn is_undetermined(&self) -> bool {
        self.number == Self::UNDETERMINED
    }

    /// The integration step flag matching this step number.
    pub const fn integration_flag(&self) -> CommandFlags {
        match self.number {
            0 => CommandFlags::INITIALIZATION_STEP,
            1 => CommandFlags::INTEGRATOR_STEP_1,
            2 => CommandFlags::INTEGRATOR_STEP_2,
            _ => CommandFlags::empty(),
        }
    }
}

impl Default for StepInfo {
    fn default() -> Self {
        Self::undetermined()
    }
}

impl From<i32> for StepInfo {
    fn from(number: i32) -> Self {
        Self::new(number)
    }
}

impl fmt::Display for StepInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undetermined() {
            return f.write_str("step ?");
        }
        write!(f, "step {}", self.number)?;
        if self.last {
            f.write_str(" (last)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_undetermined() {
        let step = StepInfo::default();
        assert!(step.is_undetermined());
        assert!(!step.last);
        assert!(step.integration_flag().is_empty());
    }

    #[test]
    fn integration_flags_follow_step_number() {
        assert_eq!(
            StepInfo::initialization().integration_flag(),
            CommandFlags::INITIALIZATION_STEP
        );
        assert_eq!(StepInfo::new(1).integration_flag(), CommandFlags::INTEGRATOR_STEP_1);
        assert_eq!(
            StepInfo::new(2).into_last().integration_flag(),
            CommandFlags::INTEGRATOR_STEP_2
        );
    }

    #[test]
    fn display() {
        assert_eq!(StepInfo::undetermined().to_string(), "step ?");
        assert_eq!(StepInfo::new(2).into_last().to_string(), "step 2 (last)");
    }
}
