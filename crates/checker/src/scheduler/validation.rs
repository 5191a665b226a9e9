//! Admission rules for checks entering the schedule.

use crate::error::CheckerError;
use crate::types::Check;

/// Shortest interval, in seconds, a check may be scheduled at.
pub const MINIMUM_CHECK_INTERVAL: u64 = 15;

/// Validate a check before it is scheduled
pub fn validate_check(check: &Check) -> Result<(), CheckerError> {
    if check.id.is_empty() {
        return Err(CheckerError::MissingId);
    }

    validate_check_interval(check.interval)?;

    if check.target.is_none() {
        return Err(CheckerError::MissingTarget);
    }

    if check.spec.is_none() {
        return Err(CheckerError::MissingSpec);
    }

    Ok(())
}

/// Validate check interval against the scheduling floor
pub fn validate_check_interval(interval: u64) -> Result<(), CheckerError> {
    if interval < MINIMUM_CHECK_INTERVAL {
        return Err(CheckerError::IntervalTooShort {
            minimum: MINIMUM_CHECK_INTERVAL,
            interval,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckSpec, HttpCheck, Target};

    fn valid() -> Check {
        Check::new("check-1", 30)
            .with_target(Target::new("sg", "sg-1"))
            .with_spec(CheckSpec::Http(HttpCheck::default()))
    }

    #[test]
    fn test_validate_check() {
        assert!(validate_check(&valid()).is_ok());

        let mut missing_id = valid();
        missing_id.id.clear();
        assert!(matches!(validate_check(&missing_id), Err(CheckerError::MissingId)));

        let mut missing_target = valid();
        missing_target.target = None;
        assert!(matches!(validate_check(&missing_target), Err(CheckerError::MissingTarget)));

        let mut missing_spec = valid();
        missing_spec.spec = None;
        assert!(matches!(validate_check(&missing_spec), Err(CheckerError::MissingSpec)));
    }

    #[test]
    fn test_validate_check_interval() {
        assert!(validate_check_interval(15).is_ok()); // Min
        assert!(validate_check_interval(60).is_ok());

        assert!(validate_check_interval(14).is_err());
        assert!(validate_check_interval(0).is_err());
    }
}
