//! Read-only introspection of the content repository through the `git` binary.

use crate::constants::{GitStatus, DEFAULT_REMOTE};
use crate::{ContentError, ContentResult};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    pub committed_only: bool,
    pub staged_only: bool,
    pub include_untracked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameStatus {
    pub status: GitStatus,
    pub score: Option<u8>,
    pub path: PathBuf,
    pub old_path: Option<PathBuf>,
}

/// File-mode comparison between HEAD and the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionChange {
    pub changed: bool,
    pub old_mode: Option<String>,
    pub new_mode: Option<String>,
}

/// Every changed path against a base revision, bucketed by status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    pub modified: BTreeSet<PathBuf>,
    pub added: BTreeSet<PathBuf>,
    pub deleted: BTreeSet<PathBuf>,
    pub renamed: BTreeSet<(PathBuf, PathBuf)>,
}

impl ChangedFiles {
    pub fn status_of(&self, path: &Path) -> Option<GitStatus> {
        if self.added.contains(path) {
            Some(GitStatus::Added)
        } else if self.renamed.iter().any(|(_, new)| new == path) {
            Some(GitStatus::Renamed)
        } else if self.modified.contains(path) {
            Some(GitStatus::Modified)
        } else if self.deleted.contains(path) {
            Some(GitStatus::Deleted)
        } else {
            None
        }
    }

    pub fn old_path_of(&self, path: &Path) -> Option<&Path> {
        self.renamed
            .iter()
            .find(|(_, new)| new == path)
            .map(|(old, _)| old.as_path())
    }

    pub fn all_changed(&self) -> BTreeSet<PathBuf> {
        self.modified
            .iter()
            .chain(self.added.iter())
            .chain(self.renamed.iter().map(|(_, new)| new))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GitUtil {
    root: PathBuf,
}

impl GitUtil {
    /// Opens the repository containing `path`.
    pub fn open(path: &Path) -> ContentResult<Self> {
        let output = run_git(path, &["rev-parse", "--show-toplevel"])?;
        let root = PathBuf::from(output.trim());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_from_git_root(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            return path.to_path_buf();
        }
        let canonical_root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        canonical
            .strip_prefix(&canonical_root)
            .or_else(|_| path.strip_prefix(&self.root))
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    pub fn current_branch(&self) -> ContentResult<String> {
        Ok(self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?.trim().to_string())
    }

    pub fn remotes(&self) -> ContentResult<Vec<String>> {
        Ok(self
            .git(&["remote"])?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Returns `main` when `origin/main` exists, else `master` when
    /// `origin/master` exists, else `None`.
    pub fn find_primary_branch(&self) -> Option<String> {
        ["main", "master"]
            .into_iter()
            .find(|branch| self.ref_exists(&format!("refs/remotes/{DEFAULT_REMOTE}/{branch}")))
            .map(str::to_string)
    }

    pub fn ref_exists(&self, reference: &str) -> bool {
        self.git(&["rev-parse", "--verify", "--quiet", reference]).is_ok()
    }

    /// Resolves a base revision to the ref git should diff against. Remote
    /// qualified names keep their remote only if it exists; bare branch names
    /// prefer the remote-tracking ref; SHAs pass through.
    pub fn resolve_base(&self, base: &str) -> ContentResult<String> {
        if is_sha(base) {
            return Ok(base.to_string());
        }
        let remotes = self.remotes()?;
        if let Some((remote, branch)) = base.split_once('/') {
            if remotes.iter().any(|known| known == remote) {
                return Ok(format!("{remote}/{branch}"));
            }
        }
        let tracking = format!("{DEFAULT_REMOTE}/{base}");
        if remotes.iter().any(|known| known == DEFAULT_REMOTE)
            && self.ref_exists(&format!("refs/remotes/{tracking}"))
        {
            return Ok(tracking);
        }
        Ok(base.to_string())
    }

    pub fn modified_files(&self, base: &str, options: DiffOptions) -> ContentResult<BTreeSet<PathBuf>> {
        Ok(self.changed_files(base, options)?.modified)
    }

    pub fn added_files(&self, base: &str, options: DiffOptions) -> ContentResult<BTreeSet<PathBuf>> {
        Ok(self.changed_files(base, options)?.added)
    }

    pub fn deleted_files(&self, base: &str, options: DiffOptions) -> ContentResult<BTreeSet<PathBuf>> {
        Ok(self.changed_files(base, options)?.deleted)
    }

    pub fn renamed_files(
        &self,
        base: &str,
        options: DiffOptions,
    ) -> ContentResult<BTreeSet<(PathBuf, PathBuf)>> {
        Ok(self.changed_files(base, options)?.renamed)
    }

    pub fn renamed_files_new_names(
        &self,
        base: &str,
        options: DiffOptions,
    ) -> ContentResult<BTreeSet<PathBuf>> {
        Ok(self
            .renamed_files(base, options)?
            .into_iter()
            .map(|(_, new)| new)
            .collect())
    }

    /// modified ∪ added ∪ renamed-new.
    pub fn all_changed_files(&self, base: &str) -> ContentResult<BTreeSet<PathBuf>> {
        Ok(self
            .changed_files(
                base,
                DiffOptions {
                    include_untracked: true,
                    ..DiffOptions::default()
                },
            )?
            .all_changed())
    }

    /// Classifies every path changed against `base`. When `base` is the current
    /// branch only the last commit is considered.
    pub fn changed_files(&self, base: &str, options: DiffOptions) -> ContentResult<ChangedFiles> {
        let current = self.current_branch()?;
        let base_branch = base.rsplit_once('/').map(|(_, branch)| branch).unwrap_or(base);
        if base == current || base_branch == current && !is_sha(base) && base.contains('/') && self.is_remote_of_current(base) {
            debug!(base, "base is the current branch, using the last commit only");
            let entries = self.name_status(&["HEAD~1", "HEAD"])?;
            let entries = self.reclassify_partial_renames(entries, &["HEAD~1", "HEAD"])?;
            return Ok(bucket(entries));
        }

        let resolved = self.resolve_base(base)?;
        let mut entries = Vec::new();
        if !options.staged_only {
            let range = format!("{resolved}...HEAD");
            let committed = self.name_status(&[range.as_str()])?;
            entries.extend(self.reclassify_partial_renames(committed, &[range.as_str()])?);
        }
        if !options.committed_only {
            let staged = self.name_status(&["--cached", "HEAD"])?;
            entries.extend(self.reclassify_partial_renames(staged, &["--cached", "HEAD"])?);
            if !options.staged_only {
                let unstaged = self.name_status(&[])?;
                entries.extend(self.reclassify_partial_renames(unstaged, &[])?);
                if options.include_untracked {
                    entries.extend(self.untracked_files()?.into_iter().map(|path| NameStatus {
                        status: GitStatus::Added,
                        score: None,
                        path,
                        old_path: None,
                    }));
                }
            }
        }
        Ok(merge_statuses(entries))
    }

    fn is_remote_of_current(&self, base: &str) -> bool {
        base.split_once('/')
            .map(|(remote, _)| {
                self.remotes()
                    .map(|remotes| remotes.iter().any(|known| known == remote))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Renames git detected with less than full similarity are probed again
    /// without rename detection and reported under the statuses git gives the
    /// two paths individually.
    fn reclassify_partial_renames(
        &self,
        entries: Vec<NameStatus>,
        diff_args: &[&str],
    ) -> ContentResult<Vec<NameStatus>> {
        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            let partial = entry.status == GitStatus::Renamed && entry.score.is_some_and(|score| score < 100);
            let Some(old_path) = entry.old_path.clone().filter(|_| partial) else {
                result.push(entry);
                continue;
            };
            let old = old_path.to_string_lossy().to_string();
            let new = entry.path.to_string_lossy().to_string();
            let mut args = vec!["diff", "--name-status", "--no-renames"];
            args.extend_from_slice(diff_args);
            args.extend_from_slice(&["--", old.as_str(), new.as_str()]);
            let probed = parse_name_status(&self.git(&args)?);
            debug!(old = %old, new = %new, probed = probed.len(), "reclassified partial rename");
            if probed.is_empty() {
                result.push(NameStatus {
                    status: GitStatus::Deleted,
                    score: None,
                    path: old_path,
                    old_path: None,
                });
                result.push(NameStatus {
                    status: GitStatus::Added,
                    score: None,
                    path: entry.path,
                    old_path: None,
                });
            } else {
                result.extend(probed);
            }
        }
        Ok(result)
    }

    fn name_status(&self, diff_args: &[&str]) -> ContentResult<Vec<NameStatus>> {
        let mut args = vec!["diff", "--name-status", "-M"];
        args.extend_from_slice(diff_args);
        Ok(parse_name_status(&self.git(&args)?))
    }

    fn untracked_files(&self) -> ContentResult<Vec<PathBuf>> {
        Ok(self
            .git(&["ls-files", "--others", "--exclude-standard"])?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Compares the file mode recorded in HEAD with the one in the index.
    pub fn has_file_permissions_changed(&self, path: &Path) -> ContentResult<PermissionChange> {
        let relative = self.path_from_git_root(path);
        let relative = relative.to_string_lossy().to_string();
        let old_mode = self
            .git(&["ls-tree", "HEAD", "--", relative.as_str()])
            .ok()
            .and_then(|output| first_field(&output));
        let new_mode = self
            .git(&["ls-files", "--stage", "--", relative.as_str()])
            .ok()
            .and_then(|output| first_field(&output));
        Ok(PermissionChange {
            changed: old_mode.is_some() && new_mode.is_some() && old_mode != new_mode,
            old_mode,
            new_mode,
        })
    }

    /// Returns the `<remote>/<tag>` (or bare `tag`) ref used for file reads.
    pub fn file_ref(&self, tag: &str, from_remote: bool) -> String {
        if !from_remote || is_sha(tag) || tag.contains('/') {
            return tag.to_string();
        }
        format!("{DEFAULT_REMOTE}/{tag}")
    }

    pub fn file_exists_in_revision(&self, path: &Path, reference: &str) -> bool {
        let relative = self.path_from_git_root(path);
        let object = format!("{reference}:{}", to_git_path(&relative));
        self.git(&["cat-file", "-e", object.as_str()]).is_ok()
    }

    pub fn read_file_bytes(&self, path: &Path, reference: &str) -> ContentResult<Vec<u8>> {
        let relative = self.path_from_git_root(path);
        let object = format!("{reference}:{}", to_git_path(&relative));
        debug!(object = %object, "git show");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(["show", object.as_str()])
            .output()?;
        if !output.status.success() {
            return Err(ContentError::Git(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }

    fn git(&self, args: &[&str]) -> ContentResult<String> {
        run_git(&self.root, args)
    }
}

fn run_git(directory: &Path, args: &[&str]) -> ContentResult<String> {
    debug!(args = ?args, "git");
    let output = Command::new("git").arg("-C").arg(directory).args(args).output()?;
    if !output.status.success() {
        return Err(ContentError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub fn is_sha(value: &str) -> bool {
    value.len() == 40 && value.chars().all(|character| character.is_ascii_hexdigit())
}

fn to_git_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn first_field(output: &str) -> Option<String> {
    output
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .map(str::to_string)
}

/// Parses `git diff --name-status` output.
pub fn parse_name_status(output: &str) -> Vec<NameStatus> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let code = fields.next()?.trim();
            let letter = code.chars().next()?;
            let status = GitStatus::from_letter(letter)?;
            let score = code[1..].parse::<u8>().ok();
            let first = PathBuf::from(fields.next()?);
            match (letter, fields.next()) {
                ('R', Some(second)) => Some(NameStatus {
                    status,
                    score,
                    path: PathBuf::from(second),
                    old_path: Some(first),
                }),
                ('C', Some(second)) => Some(NameStatus {
                    status,
                    score,
                    path: PathBuf::from(second),
                    old_path: None,
                }),
                _ => Some(NameStatus {
                    status,
                    score,
                    path: first,
                    old_path: None,
                }),
            }
        })
        .collect()
}

fn bucket(entries: Vec<NameStatus>) -> ChangedFiles {
    let mut changed = ChangedFiles::default();
    for entry in entries {
        match (entry.status, entry.old_path) {
            (GitStatus::Renamed, Some(old)) => {
                changed.renamed.insert((old, entry.path));
            }
            (GitStatus::Added, _) => {
                changed.added.insert(entry.path);
            }
            (GitStatus::Deleted, _) => {
                changed.deleted.insert(entry.path);
            }
            _ => {
                changed.modified.insert(entry.path);
            }
        }
    }
    changed
}

/// Folds committed, staged and working-tree entries into one status per path.
/// A path added against the base stays added even when modified afterwards,
/// renamed paths are not also reported as modified, and deleted paths win.
fn merge_statuses(entries: Vec<NameStatus>) -> ChangedFiles {
    let mut changed = bucket(entries);
    let renamed_new = changed
        .renamed
        .iter()
        .map(|(_, new)| new.clone())
        .collect::<BTreeSet<_>>();
    let renamed_old = changed
        .renamed
        .iter()
        .map(|(old, _)| old.clone())
        .collect::<BTreeSet<_>>();
    changed.modified = changed
        .modified
        .iter()
        .filter(|path| {
            !changed.added.contains(*path)
                && !renamed_new.contains(*path)
                && !changed.deleted.contains(*path)
        })
        .cloned()
        .collect();
    changed.added = changed
        .added
        .iter()
        .filter(|path| !changed.deleted.contains(*path) && !renamed_new.contains(*path))
        .cloned()
        .collect();
    let deleted_after_rename = changed.deleted.clone();
    changed
        .renamed
        .retain(|(_, new)| !deleted_after_rename.contains(new));
    changed.deleted = changed
        .deleted
        .iter()
        .filter(|path| !renamed_old.contains(*path) && !changed.added.contains(*path))
        .cloned()
        .collect();
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_status_lines() {
        let entries = parse_name_status(
            "M\tPacks/A/Integrations/A/A.yml\nA\tPacks/A/Scripts/S/S.yml\nR087\tPacks/A/old.yml\tPacks/A/new.yml\nD\tTests/conf.json\n",
        );
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[2].status, GitStatus::Renamed);
        assert_eq!(entries[2].score, Some(87));
        assert_eq!(entries[2].old_path.as_deref(), Some(Path::new("Packs/A/old.yml")));
        assert_eq!(entries[3].status, GitStatus::Deleted);
    }

    #[test]
    fn added_then_modified_stays_added() {
        let changed = merge_statuses(vec![
            NameStatus {
                status: GitStatus::Added,
                score: None,
                path: PathBuf::from("a.yml"),
                old_path: None,
            },
            NameStatus {
                status: GitStatus::Modified,
                score: None,
                path: PathBuf::from("a.yml"),
                old_path: None,
            },
        ]);
        assert!(changed.added.contains(Path::new("a.yml")));
        assert!(changed.modified.is_empty());
        assert_eq!(changed.status_of(Path::new("a.yml")), Some(GitStatus::Added));
    }

    #[test]
    fn renamed_files_are_not_modified() {
        let changed = merge_statuses(vec![
            NameStatus {
                status: GitStatus::Renamed,
                score: Some(100),
                path: PathBuf::from("new.yml"),
                old_path: Some(PathBuf::from("old.yml")),
            },
            NameStatus {
                status: GitStatus::Modified,
                score: None,
                path: PathBuf::from("new.yml"),
                old_path: None,
            },
        ]);
        assert!(changed.modified.is_empty());
        assert_eq!(changed.old_path_of(Path::new("new.yml")), Some(Path::new("old.yml")));
        assert_eq!(
            changed.all_changed().into_iter().collect::<Vec<_>>(),
            vec![PathBuf::from("new.yml")]
        );
    }

    #[test]
    fn detects_sha() {
        assert!(is_sha("0123456789abcdef0123456789abcdef01234567"));
        assert!(!is_sha("origin/master"));
    }
}
