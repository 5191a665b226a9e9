use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::CheckerError;
use crate::resolver::Resolver;
use crate::types::{Check, Target};

/// A check paired with the concrete targets it should run against.
///
/// This is what the scheduler publishes and what runners consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckWithTargets {
    pub check: Check,
    pub targets: Vec<Target>,
}

impl CheckWithTargets {
    pub async fn resolve(resolver: &dyn Resolver, ctx: &RunContext, check: Check) -> Result<Self, CheckerError> {
        let target = check.target.as_ref().ok_or(CheckerError::MissingTarget)?;
        let targets = resolver.resolve(ctx, target).await?;
        if targets.is_empty() {
            return Err(CheckerError::NoTargets(target.to_string()));
        }
        Ok(Self { check, targets })
    }
}
