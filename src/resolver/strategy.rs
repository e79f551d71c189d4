//! Per-role resolution rules
//!
//! Each strategy is a pure function of the context and the tag snapshot.

use super::context::VersionUpgradeContext;
use super::{Resolution, VersionPlan};
use crate::domain::{BranchRole, VersionValue};
use crate::error::{PolicyViolation, Result};
use crate::history::TagSnapshot;
use tracing::debug;

/// Resolution rule for one target role
pub type Strategy = fn(&VersionUpgradeContext, &TagSnapshot) -> Result<Resolution>;

/// The strategy table
pub fn for_role(role: BranchRole) -> Strategy {
    match role {
        BranchRole::Alpha => alpha,
        BranchRole::Beta => beta,
        BranchRole::Main => main,
    }
}

fn plan(ctx: &VersionUpgradeContext, next: VersionValue) -> Resolution {
    Resolution::Bump(VersionPlan {
        role: ctx.target,
        previous: ctx.current.clone(),
        next,
    })
}

/// Next counter on `base`, above every existing tag of the role on that base
fn next_on_line(
    snapshot: &TagSnapshot,
    role: BranchRole,
    identifier: &str,
    base: &VersionValue,
) -> Result<VersionValue> {
    match snapshot.highest_on_base(role, base) {
        Some(tag) => tag.version.next_prerelease(),
        None => Ok(base.with_prerelease(identifier, 0)),
    }
}

/// Alpha: bump only on a signal; extend the open line unless the candidate overtakes it
pub fn alpha(ctx: &VersionUpgradeContext, snapshot: &TagSnapshot) -> Result<Resolution> {
    let magnitude = match ctx.signal.magnitude {
        Some(magnitude) => magnitude,
        None => {
            return Ok(Resolution::NoBump {
                reason: "no release signal".to_string(),
            })
        }
    };
    let identifier = ctx
        .identifier()
        .unwrap_or(ctx.format.alpha_identifier.as_str());

    let main_base = snapshot
        .latest(BranchRole::Main)
        .map(|t| t.version.base_version())
        .unwrap_or_else(|| VersionValue::new(0, 0, 0));

    let open_line = snapshot
        .latest(BranchRole::Alpha)
        .map(|t| t.version.base_version())
        .filter(|base| !snapshot.is_sealed(base));

    let next = match open_line {
        Some(current) => {
            let candidate = main_base.bump(magnitude)?;
            if candidate > current {
                candidate.with_prerelease(identifier, 0)
            } else {
                next_on_line(snapshot, BranchRole::Alpha, identifier, &current)?
            }
        }
        None => {
            let sealed = snapshot
                .highest_base(&[BranchRole::Beta, BranchRole::Main])
                .map_or(main_base.clone(), |base| base.max(main_base));
            debug!(%sealed, "no open alpha line, bumping from the highest sealed base");
            sealed.bump_for(magnitude, Some(identifier))?
        }
    };

    Ok(plan(ctx, next))
}

/// Beta: promotion from Alpha, or a fix on an open Beta line
pub fn beta(ctx: &VersionUpgradeContext, snapshot: &TagSnapshot) -> Result<Resolution> {
    let identifier = ctx
        .identifier()
        .unwrap_or(ctx.format.beta_identifier.as_str());
    let latest_beta = snapshot
        .latest(BranchRole::Beta)
        .map(|t| t.version.base_version());

    if ctx.source_role == Some(BranchRole::Alpha) {
        let alpha = snapshot
            .latest(BranchRole::Alpha)
            .ok_or(PolicyViolation::NothingToPromote {
                target: BranchRole::Beta,
                source_role: BranchRole::Alpha,
            })?;
        let alpha_base = alpha.version.base_version();

        let next = match latest_beta {
            Some(beta_base) if alpha_base <= beta_base => {
                // Beta is at least as advanced: stay on its line
                if snapshot.is_released(&beta_base) {
                    return Err(PolicyViolation::NoOpenLine {
                        role: BranchRole::Beta,
                        version: beta_base.to_string(),
                    }
                    .into());
                }
                next_on_line(snapshot, BranchRole::Beta, identifier, &beta_base)?
            }
            _ => {
                if snapshot.is_released(&alpha_base) {
                    return Err(PolicyViolation::NoOpenLine {
                        role: BranchRole::Alpha,
                        version: alpha_base.to_string(),
                    }
                    .into());
                }
                alpha_base.with_prerelease(identifier, 0)
            }
        };
        return Ok(plan(ctx, next));
    }

    match latest_beta.clone().filter(|base| !snapshot.is_released(base)) {
        Some(base) => Ok(plan(
            ctx,
            next_on_line(snapshot, BranchRole::Beta, identifier, &base)?,
        )),
        None => Err(PolicyViolation::BetaRequiresAlpha {
            source_branch: ctx.source_branch.clone(),
            base: latest_beta.map(|b| b.to_string()),
        }
        .into()),
    }
}

/// Main: the latest Beta version with its pre-release stripped
pub fn main(ctx: &VersionUpgradeContext, snapshot: &TagSnapshot) -> Result<Resolution> {
    if ctx.source_role != Some(BranchRole::Beta) {
        return Err(PolicyViolation::MainRequiresBeta {
            source_branch: ctx.source_branch.clone(),
        }
        .into());
    }

    let beta = snapshot
        .latest(BranchRole::Beta)
        .ok_or(PolicyViolation::NothingToPromote {
            target: BranchRole::Main,
            source_role: BranchRole::Beta,
        })?;
    let next = beta.version.base_version();

    if let Some(released) = snapshot.highest(BranchRole::Main) {
        if next <= released.version {
            return Err(PolicyViolation::AlreadyReleased {
                version: next.to_string(),
            }
            .into());
        }
    }

    Ok(plan(ctx, next))
}
