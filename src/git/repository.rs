use crate::error::{ReleaseError, Result};
use crate::git::{
    Author, CommitInfo, ConflictPolicy, FileChange, IntegrationMode, IntegrationOutcome,
    PushOutcome, TagRef,
};
use crate::metadata;
use git2::build::CheckoutBuilder;
use git2::{
    ErrorCode, FetchOptions, Index, IndexConflict, IndexEntry, IndexTime, ObjectType, Oid,
    PushOptions, RebaseOptions, RemoteCallbacks, Repository as Git2Repo, Signature, Sort,
};
use std::cell::RefCell;
use std::path::Path;
use tracing::{debug, warn};

/// Stage bits of an index entry's flags
const STAGE_MASK: u16 = 0x3000;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)
            .map_err(|e| ReleaseError::backend(format!("Not in a git repository: {}", e)))?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }

    /// Borrow the underlying git2 repository
    pub fn git2(&self) -> &Git2Repo {
        &self.repo
    }

    fn signature(author: &Author) -> Result<Signature<'static>> {
        Ok(Signature::now(&author.name, &author.email)?)
    }

    fn merge(
        &self,
        source: Oid,
        target: Oid,
        policy: &ConflictPolicy,
        message: &str,
        author: &Author,
    ) -> Result<IntegrationOutcome> {
        let ours = self.repo.find_commit(target)?;
        let theirs = self.repo.find_commit(source)?;
        let mut index = self.repo.merge_commits(&ours, &theirs, None)?;

        if index.has_conflicts() {
            let unresolved = self.resolve_conflicts(&mut index, policy, false)?;
            if !unresolved.is_empty() {
                return Ok(IntegrationOutcome::Conflicted { paths: unresolved });
            }
        }

        let tree_id = index.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Self::signature(author)?;
        let head = self
            .repo
            .commit(None, &sig, &sig, message, &tree, &[&ours, &theirs])?;

        Ok(IntegrationOutcome::Integrated { head })
    }

    fn rebase(
        &self,
        source: Oid,
        target: Oid,
        policy: &ConflictPolicy,
        author: &Author,
    ) -> Result<IntegrationOutcome> {
        let upstream = self.repo.find_annotated_commit(source)?;
        let branch = self.repo.find_annotated_commit(target)?;
        let mut opts = RebaseOptions::new();
        opts.inmemory(true);

        let mut rebase = self
            .repo
            .rebase(Some(&branch), Some(&upstream), None, Some(&mut opts))?;
        let committer = Self::signature(author)?;
        let mut head = source;

        loop {
            match rebase.next().map(|op| op.map(|_| ())) {
                None => break,
                Some(Err(e)) => {
                    rebase.abort()?;
                    return Err(e.into());
                }
                Some(Ok(())) => {}
            }

            let mut index = rebase.inmemory_index()?;
            if index.has_conflicts() {
                // In a rebase the upstream being built is "ours"
                let unresolved = self.resolve_conflicts(&mut index, policy, true)?;
                if !unresolved.is_empty() {
                    rebase.abort()?;
                    return Ok(IntegrationOutcome::Conflicted { paths: unresolved });
                }
            }

            match rebase.commit(None, &committer, None) {
                Ok(oid) => head = oid,
                Err(e) if e.code() == ErrorCode::Applied => {
                    debug!("skipping commit already present upstream");
                }
                Err(e) => {
                    rebase.abort()?;
                    return Err(e.into());
                }
            }
        }

        rebase.finish(None)?;
        Ok(IntegrationOutcome::Integrated { head })
    }

    /// Apply `policy` to the conflicts in `index`.
    ///
    /// Returns the paths that stay unresolved; the index is only modified when
    /// every conflict was resolved.
    fn resolve_conflicts(
        &self,
        index: &mut Index,
        policy: &ConflictPolicy,
        source_is_ours: bool,
    ) -> Result<Vec<String>> {
        let conflicts = index
            .conflicts()?
            .collect::<std::result::Result<Vec<IndexConflict>, git2::Error>>()?;

        let mut unresolved = Vec::new();
        let mut resolved = Vec::new();

        for conflict in conflicts {
            let path = conflict_path(&conflict);
            let (source_side, target_side) = if source_is_ours {
                (conflict.our, conflict.their)
            } else {
                (conflict.their, conflict.our)
            };

            match policy {
                ConflictPolicy::PreferSource { path: meta } if *meta == path => {
                    match source_side {
                        Some(entry) => resolved.push((path, entry)),
                        None => unresolved.push(path),
                    }
                }
                ConflictPolicy::PatchMetadata { path: meta, version } if *meta == path => {
                    if let (Some(source), Some(target)) = (&source_side, &target_side) {
                        self.warn_on_metadata_drift(&path, source.id, target.id)?;
                    }
                    match target_side.or(source_side) {
                        Some(entry) => match self.patch_entry(&path, entry, version)? {
                            Some(patched) => resolved.push((path, patched)),
                            None => unresolved.push(path),
                        },
                        None => unresolved.push(path),
                    }
                }
                _ => unresolved.push(path),
            }
        }

        if !unresolved.is_empty() {
            return Ok(unresolved);
        }

        for (path, mut entry) in resolved {
            index.remove_path(Path::new(&path))?;
            entry.flags &= !STAGE_MASK;
            index.add(&entry)?;
        }

        Ok(Vec::new())
    }

    /// Warn when the source side of a patched metadata file carries edits
    /// beyond its version, since only the target side is kept
    fn warn_on_metadata_drift(&self, path: &str, source: Oid, target: Oid) -> Result<()> {
        let source_blob = self.repo.find_blob(source)?;
        let target_blob = self.repo.find_blob(target)?;
        let source_content = String::from_utf8_lossy(source_blob.content());
        let target_content = String::from_utf8_lossy(target_blob.content());

        if metadata::differs_beyond_version(path, &source_content, &target_content) {
            warn!(
                path,
                "source edits to the metadata file beyond its version are not carried over"
            );
        }
        Ok(())
    }

    /// Rewrite the version field of a metadata blob, returning the new entry
    fn patch_entry(&self, path: &str, entry: IndexEntry, version: &str) -> Result<Option<IndexEntry>> {
        let blob = self.repo.find_blob(entry.id)?;
        let content = String::from_utf8_lossy(blob.content()).into_owned();

        let patched = match metadata::write_version(path, &content, version) {
            Ok(patched) => patched,
            Err(e) => {
                debug!(path, error = %e, "metadata file cannot be patched");
                return Ok(None);
            }
        };

        let id = self.repo.blob(patched.as_bytes())?;
        Ok(Some(IndexEntry {
            id,
            file_size: patched.len() as u32,
            ..entry
        }))
    }
}

fn conflict_path(conflict: &IndexConflict) -> String {
    conflict
        .our
        .as_ref()
        .or(conflict.their.as_ref())
        .or(conflict.ancestor.as_ref())
        .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
        .unwrap_or_default()
}

fn blob_entry(path: &str, id: Oid, mode: u32, size: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode,
        uid: 0,
        gid: 0,
        file_size: size as u32,
        id,
        flags: path.len().min(0xfff) as u16,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

/// Credentials for fetch and push: SSH keys from ~/.ssh, the SSH agent,
/// then libgit2's defaults.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed_types| {
        if allowed_types.contains(git2::CredentialType::SSH_KEY) {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            let key_paths = [
                format!("{}/.ssh/id_ed25519", home),
                format!("{}/.ssh/id_rsa", home),
                format!("{}/.ssh/id_ecdsa", home),
            ];

            for key_path in key_paths {
                let path = Path::new(&key_path);
                if path.exists() {
                    if let Ok(cred) =
                        git2::Cred::ssh_key(username_from_url.unwrap_or("git"), None, path, None)
                    {
                        return Ok(cred);
                    }
                }
            }

            if let Ok(cred) = git2::Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")) {
                return Ok(cred);
            }
        }

        git2::Cred::default()
    });
    callbacks
}

impl super::Repository for Git2Repository {
    fn list_tags(&self) -> Result<Vec<TagRef>> {
        let names = self
            .repo
            .tag_names(None)
            .map_err(|e| ReleaseError::backend(format!("Cannot list tags: {}", e)))?;

        let mut tags = Vec::new();
        for name in names.iter().flatten() {
            let reference = self.repo.find_reference(&format!("refs/tags/{}", name))?;
            let object = reference.peel(ObjectType::Any)?;
            let raw = match reference.target() {
                Some(oid) => self.repo.find_object(oid, None)?,
                None => continue,
            };

            let commit = object.peel_to_commit()?;
            let created = raw
                .as_tag()
                .and_then(|tag| tag.tagger().map(|s| s.when().seconds()))
                .unwrap_or_else(|| commit.time().seconds());

            tags.push(TagRef {
                name: name.to_string(),
                target: commit.id(),
                created,
            });
        }

        Ok(tags)
    }

    fn fetch(&self, remote_name: &str) -> Result<()> {
        let mut remote = self.repo.find_remote(remote_name).map_err(|_| {
            ReleaseError::backend(format!("Remote '{}' not found", remote_name))
        })?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());

        // All branches into remote-tracking refs, all tags as-is
        let refspec_heads = format!("+refs/heads/*:refs/remotes/{}/*", remote_name);
        let refspecs = [refspec_heads.as_str(), "+refs/tags/*:refs/tags/*"];
        remote
            .fetch(&refspecs, Some(&mut fetch_options), None)
            .map_err(|e| {
                ReleaseError::backend(format!(
                    "Failed to fetch from remote '{}': {}",
                    remote_name, e
                ))
            })?;

        Ok(())
    }

    fn branch_head(&self, branch_name: &str) -> Result<Oid> {
        let branch = self
            .repo
            .find_branch(branch_name, git2::BranchType::Local)
            .map_err(|e| {
                ReleaseError::backend(format!("Cannot find branch '{}': {}", branch_name, e))
            })?;

        branch.get().target().ok_or_else(|| {
            ReleaseError::backend(format!("Branch '{}' has no target", branch_name))
        })
    }

    fn remote_branch_head(&self, remote: &str, branch: &str) -> Result<Option<Oid>> {
        let name = format!("refs/remotes/{}/{}", remote, branch);
        match self.repo.find_reference(&name) {
            Ok(reference) => Ok(reference.target()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(ReleaseError::backend(format!("Cannot read {}: {}", name, e))),
        }
    }

    fn commit_message(&self, oid: Oid) -> Result<String> {
        let commit = self.repo.find_commit(oid)?;
        Ok(commit.message().unwrap_or_default().to_string())
    }

    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<CommitInfo>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(to)?;
        if let Some(from) = from {
            revwalk.hide(from)?;
        }

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result?;
            let commit = self.repo.find_commit(oid)?;
            commits.push(CommitInfo {
                message: commit.message().unwrap_or("(empty message)").to_string(),
            });
        }

        Ok(commits)
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self.repo.graph_descendant_of(descendant, ancestor)?)
    }

    fn read_file(&self, commit: Oid, path: &str) -> Result<Option<String>> {
        let tree = self.repo.find_commit(commit)?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }

    fn commit_files(
        &self,
        parent: Oid,
        changes: &[FileChange],
        message: &str,
        author: &Author,
    ) -> Result<Oid> {
        let parent_commit = self.repo.find_commit(parent)?;
        let mut index = Index::new()?;
        index.read_tree(&parent_commit.tree()?)?;

        for change in changes {
            let mode = index
                .get_path(Path::new(&change.path), 0)
                .map(|entry| entry.mode)
                .unwrap_or(0o100644);
            let id = self.repo.blob(change.content.as_bytes())?;
            index.add(&blob_entry(&change.path, id, mode, change.content.len()))?;
        }

        let tree_id = index.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Self::signature(author)?;
        Ok(self
            .repo
            .commit(None, &sig, &sig, message, &tree, &[&parent_commit])?)
    }

    fn integrate(
        &self,
        source: Oid,
        target: Oid,
        mode: IntegrationMode,
        policy: &ConflictPolicy,
        message: &str,
        author: &Author,
    ) -> Result<IntegrationOutcome> {
        if self.is_ancestor(source, target)? {
            return Ok(IntegrationOutcome::UpToDate);
        }
        // Target has nothing of its own: fast-forward
        if self.is_ancestor(target, source)? {
            return Ok(IntegrationOutcome::Integrated { head: source });
        }

        match mode {
            IntegrationMode::Merge => self.merge(source, target, policy, message, author),
            IntegrationMode::Rebase => self.rebase(source, target, policy, author),
        }
    }

    fn update_branch(&self, branch: &str, oid: Oid) -> Result<()> {
        let refname = format!("refs/heads/{}", branch);
        self.repo.reference(
            &refname,
            oid,
            true,
            &format!("release-ladder: move {} to {}", branch, oid),
        )?;

        let checked_out = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.name().map(|n| n == refname))
            .unwrap_or(false);
        if checked_out && !self.repo.is_bare() {
            self.repo
                .checkout_head(Some(CheckoutBuilder::new().force()))?;
        }

        Ok(())
    }

    fn create_tag(
        &self,
        name: &str,
        target: Oid,
        message: &str,
        author: &Author,
        force: bool,
    ) -> Result<()> {
        let object = self
            .repo
            .find_object(target, None)
            .map_err(|e| ReleaseError::tag(format!("Cannot find object: {}", e)))?;
        let sig = Self::signature(author)?;

        self.repo
            .tag(name, &object, &sig, message, force)
            .map_err(|e| ReleaseError::tag(format!("Cannot create tag '{}': {}", name, e)))?;

        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.repo
            .tag_delete(name)
            .map_err(|e| ReleaseError::tag(format!("Cannot delete tag '{}': {}", name, e)))
    }

    fn push_branch(
        &self,
        remote_name: &str,
        branch: &str,
        expected: Option<Oid>,
    ) -> Result<PushOutcome> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|e| ReleaseError::remote(format!("Cannot find remote: {}", e)))?;

        let refname = format!("refs/heads/{}", branch);
        let expected_oid = expected.unwrap_or_else(Oid::zero);
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        let mut callbacks = remote_callbacks();
        // Lease: abort during negotiation unless the remote ref is unchanged
        callbacks.push_negotiation(|updates| {
            for update in updates {
                if update.dst_refname() == Some(refname.as_str()) && update.src() != expected_oid {
                    *rejection.borrow_mut() = Some(format!(
                        "{} is at {} on the remote, expected {}",
                        refname,
                        update.src(),
                        expected_oid
                    ));
                    return Err(git2::Error::from_str("stale lease"));
                }
            }
            Ok(())
        });
        callbacks.push_update_reference(|name, status| {
            if let Some(message) = status {
                *rejection.borrow_mut() = Some(format!("{} rejected: {}", name, message));
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refspec = format!("+{0}:{0}", refname);
        let result = remote.push(&[refspec.as_str()], Some(&mut push_options));
        let rejected = rejection.borrow().clone();

        match (result, rejected) {
            (_, Some(reason)) => Ok(PushOutcome::Rejected { reason }),
            (Ok(()), None) => Ok(PushOutcome::Pushed),
            (Err(e), None) => Err(ReleaseError::remote(format!("Push failed: {}", e))),
        }
    }

    fn push_tags(&self, remote_name: &str, tag_names: &[&str]) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|e| ReleaseError::remote(format!("Cannot find remote: {}", e)))?;

        let refspecs: Vec<String> = tag_names
            .iter()
            .map(|tag| format!("refs/tags/{}:refs/tags/{}", tag, tag))
            .collect();
        let refspec_strs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(remote_callbacks());

        remote
            .push(&refspec_strs, Some(&mut push_options))
            .map_err(|e| ReleaseError::remote(format!("Push failed: {}", e)))?;

        Ok(())
    }
}

// SAFETY: Git2Repository wraps git2::Repository which is Send.
// release-ladder drives a repository from a single thread at a time.
unsafe impl Sync for Git2Repository {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Repository;
    use std::fs;
    use tempfile::TempDir;

    fn author() -> Author {
        Author::new("Test User", "test@example.com")
    }

    fn init_repo() -> (TempDir, Git2Repository) {
        let dir = TempDir::new().expect("Could not create temp dir");
        let repo = Git2Repo::init(dir.path()).expect("Could not init git repo");
        {
            let mut config = repo.config().expect("Could not get config");
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        fs::write(dir.path().join("README.md"), "hello\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        {
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = repo.signature().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
                .unwrap();
        }
        (dir, Git2Repository::from_git2(repo))
    }

    fn head(repo: &Git2Repository) -> Oid {
        repo.git2().head().unwrap().target().unwrap()
    }

    #[test]
    fn test_commit_files_and_read_back() {
        let (_dir, repo) = init_repo();
        let base = head(&repo);

        let oid = repo
            .commit_files(
                base,
                &[FileChange::new("package.json", "{\"version\": \"1.0.0\"}\n")],
                "chore(release): 1.0.0",
                &author(),
            )
            .unwrap();

        assert_eq!(
            repo.read_file(oid, "package.json").unwrap().as_deref(),
            Some("{\"version\": \"1.0.0\"}\n")
        );
        assert_eq!(repo.read_file(oid, "missing.txt").unwrap(), None);
        assert_eq!(
            repo.read_file(oid, "README.md").unwrap().as_deref(),
            Some("hello\n")
        );
        assert!(repo.is_ancestor(base, oid).unwrap());
        assert_eq!(repo.commit_message(oid).unwrap(), "chore(release): 1.0.0");
    }

    #[test]
    fn test_annotated_tags_are_listed_with_commit_target() {
        let (_dir, repo) = init_repo();
        let base = head(&repo);

        repo.create_tag("v1.0.0", base, "release 1.0.0", &author(), false)
            .unwrap();
        let tags = repo.list_tags().unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "v1.0.0");
        assert_eq!(tags[0].target, base);
    }

    #[test]
    fn test_create_tag_twice_requires_force() {
        let (_dir, repo) = init_repo();
        let base = head(&repo);

        repo.create_tag("v1.0.0", base, "first", &author(), false)
            .unwrap();
        assert!(repo
            .create_tag("v1.0.0", base, "again", &author(), false)
            .is_err());
        assert!(repo
            .create_tag("v1.0.0", base, "again", &author(), true)
            .is_ok());
    }

    #[test]
    fn test_integrate_up_to_date_and_fast_forward() {
        let (_dir, repo) = init_repo();
        let base = head(&repo);
        let next = repo
            .commit_files(base, &[FileChange::new("a.txt", "a\n")], "add a", &author())
            .unwrap();

        let up_to_date = repo
            .integrate(base, next, IntegrationMode::Merge, &ConflictPolicy::Abort, "m", &author())
            .unwrap();
        assert_eq!(up_to_date, IntegrationOutcome::UpToDate);

        let fast_forward = repo
            .integrate(next, base, IntegrationMode::Rebase, &ConflictPolicy::Abort, "m", &author())
            .unwrap();
        assert_eq!(fast_forward, IntegrationOutcome::Integrated { head: next });
    }

    fn package(version: &str, dependency: &str) -> String {
        format!(
            "{{\n  \"name\": \"demo\",\n  \"version\": \"{}\",\n\n  \"private\": true,\n  \"license\": \"MIT\",\n\n  \"dependencies\": {{ \"left-pad\": \"{}\" }}\n}}\n",
            version, dependency
        )
    }

    /// Two commits that both rewrite the version line of package.json
    fn diverged_metadata(repo: &Git2Repository, source_dependency: &str) -> (Oid, Oid) {
        let base = repo
            .commit_files(
                head(repo),
                &[FileChange::new("package.json", package("1.0.0", "1.0.0"))],
                "chore: package",
                &author(),
            )
            .unwrap();
        let target = repo
            .commit_files(
                base,
                &[FileChange::new("package.json", package("1.1.0-alpha.0", "1.0.0"))],
                "chore(release): v1.1.0-alpha.0",
                &author(),
            )
            .unwrap();
        let source = repo
            .commit_files(
                base,
                &[FileChange::new("package.json", package("1.0.1-beta.0", source_dependency))],
                "chore(release): v1.0.1-beta.0",
                &author(),
            )
            .unwrap();
        (source, target)
    }

    fn merge_with(repo: &Git2Repository, source: Oid, target: Oid, policy: ConflictPolicy) -> IntegrationOutcome {
        repo.integrate(source, target, IntegrationMode::Merge, &policy, "merge", &author())
            .unwrap()
    }

    #[test]
    fn test_metadata_conflict_policies() {
        let (_dir, repo) = init_repo();
        let (source, target) = diverged_metadata(&repo, "1.0.0");

        assert_eq!(
            merge_with(&repo, source, target, ConflictPolicy::Abort),
            IntegrationOutcome::Conflicted {
                paths: vec!["package.json".to_string()]
            }
        );

        let prefer = merge_with(
            &repo,
            source,
            target,
            ConflictPolicy::PreferSource {
                path: "package.json".to_string(),
            },
        );
        let IntegrationOutcome::Integrated { head } = prefer else {
            panic!("expected a merge, got {:?}", prefer);
        };
        let content = repo.read_file(head, "package.json").unwrap().unwrap();
        assert!(content.contains("\"version\": \"1.0.1-beta.0\""));

        let patched = merge_with(
            &repo,
            source,
            target,
            ConflictPolicy::PatchMetadata {
                path: "package.json".to_string(),
                version: "1.1.0-alpha.1".to_string(),
            },
        );
        let IntegrationOutcome::Integrated { head } = patched else {
            panic!("expected a merge, got {:?}", patched);
        };
        assert_eq!(
            repo.read_file(head, "package.json").unwrap().unwrap(),
            package("1.1.0-alpha.1", "1.0.0")
        );
        assert_eq!(repo.git2().find_commit(head).unwrap().parent_count(), 2);
    }

    #[test]
    fn test_patched_metadata_keeps_target_side() {
        let (_dir, repo) = init_repo();
        let (source, target) = diverged_metadata(&repo, "2.0.0");

        let outcome = merge_with(
            &repo,
            source,
            target,
            ConflictPolicy::PatchMetadata {
                path: "package.json".to_string(),
                version: "1.1.0-alpha.1".to_string(),
            },
        );
        let IntegrationOutcome::Integrated { head } = outcome else {
            panic!("expected a merge, got {:?}", outcome);
        };
        // Source edits beyond the version are not carried over
        let content = repo.read_file(head, "package.json").unwrap().unwrap();
        assert!(content.contains("\"left-pad\": \"1.0.0\""));
        assert!(content.contains("\"version\": \"1.1.0-alpha.1\""));
    }

    #[test]
    fn test_commits_between_oldest_first() {
        let (_dir, repo) = init_repo();
        let base = head(&repo);
        let first = repo
            .commit_files(base, &[FileChange::new("a.txt", "a\n")], "feat: a", &author())
            .unwrap();
        let second = repo
            .commit_files(first, &[FileChange::new("b.txt", "b\n")], "fix: b", &author())
            .unwrap();

        let commits = repo.commits_between(Some(base), second).unwrap();
        let messages: Vec<&str> = commits.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["feat: a", "fix: b"]);
    }

    #[test]
    fn test_update_branch_creates_ref() {
        let (_dir, repo) = init_repo();
        let base = head(&repo);
        repo.update_branch("beta", base).unwrap();
        assert_eq!(repo.branch_head("beta").unwrap(), base);
    }

    #[test]
    fn test_missing_remote_is_backend_unavailable() {
        let (_dir, repo) = init_repo();
        let err = repo.fetch("origin").unwrap_err();
        assert!(matches!(err, ReleaseError::BackendUnavailable(_)));
    }
}
