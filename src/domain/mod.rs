//! Domain logic - pure business rules independent of git operations

pub mod branch;
pub mod commit;
pub mod prerelease;
pub mod tag;
pub mod version;

pub use branch::{BranchMap, BranchRole};
pub use commit::ParsedCommit;
pub use prerelease::PreRelease;
pub use tag::{TagFormat, TagRecord};
pub use version::{BumpMagnitude, VersionValue};
