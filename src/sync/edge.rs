use crate::domain::BranchRole;
use crate::git::IntegrationMode;
use std::fmt;

/// A directed propagation from one tier into the next one down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationEdge {
    pub source: BranchRole,
    pub target: BranchRole,
    pub mode: IntegrationMode,
}

impl PropagationEdge {
    /// The edge leaving `source`, if any
    ///
    /// Main rebases Beta onto itself; Beta is merged into Alpha. Alpha feeds
    /// nothing automatically.
    pub fn from_role(source: BranchRole) -> Option<Self> {
        let target = source.downstream()?;
        let mode = match source {
            BranchRole::Main => IntegrationMode::Rebase,
            _ => IntegrationMode::Merge,
        };
        Some(PropagationEdge {
            source,
            target,
            mode,
        })
    }

    /// Every edge a change on `role` has to travel, in order
    pub fn downstream_of(role: BranchRole) -> Vec<Self> {
        let mut edges = Vec::new();
        let mut current = role;
        while let Some(edge) = Self::from_role(current) {
            edges.push(edge);
            current = edge.target;
        }
        edges
    }
}

impl fmt::Display for PropagationEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}
