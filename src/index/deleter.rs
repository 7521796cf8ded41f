use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::core::error::Result;
use crate::index::segment_infos::{SegmentInfos, SEGMENTS_PREFIX};
use crate::store::directory::Directory;

/// One committed generation and the files it references
#[derive(Debug, Clone)]
pub struct CommitPoint {
    pub generation: u64,
    pub segments_file: String,
    pub files: Vec<String>,
    pub deleted: bool,
}

impl CommitPoint {
    /// Marks the commit for collection; its files are released once no
    /// retained commit references them
    pub fn delete(&mut self) {
        self.deleted = true;
    }
}

/// Chooses which commit generations survive
pub trait DeletionPolicy: Send + Sync {
    /// Called with all commits found when the writer opens
    fn on_init(&mut self, commits: &mut [CommitPoint]);

    /// Called after every commit, newest last
    fn on_commit(&mut self, commits: &mut [CommitPoint]);
}

/// Default policy: only the newest commit survives
#[derive(Debug, Default)]
pub struct KeepOnlyLastCommit;

impl DeletionPolicy for KeepOnlyLastCommit {
    fn on_init(&mut self, commits: &mut [CommitPoint]) {
        self.on_commit(commits);
    }

    fn on_commit(&mut self, commits: &mut [CommitPoint]) {
        if let Some((_last, rest)) = commits.split_last_mut() {
            for commit in rest {
                commit.delete();
            }
        }
    }
}

/// Wraps another policy and can pin the newest commit
///
/// A pinned commit survives collection until the snapshot is released,
/// letting backups copy a consistent file set while writing continues.
pub struct SnapshotDeletionPolicy {
    inner: Box<dyn DeletionPolicy>,
    snapshot: Option<u64>,
    last_commit: Option<u64>,
}

impl SnapshotDeletionPolicy {
    pub fn new(inner: Box<dyn DeletionPolicy>) -> Self {
        SnapshotDeletionPolicy {
            inner,
            snapshot: None,
            last_commit: None,
        }
    }

    /// Pins the most recent commit; returns its generation
    pub fn snapshot(&mut self) -> Option<u64> {
        self.snapshot = self.last_commit;
        self.snapshot
    }

    pub fn release(&mut self) {
        self.snapshot = None;
    }

    pub fn snapshotted_generation(&self) -> Option<u64> {
        self.snapshot
    }
}

impl DeletionPolicy for SnapshotDeletionPolicy {
    fn on_init(&mut self, commits: &mut [CommitPoint]) {
        self.last_commit = commits.last().map(|c| c.generation);
        self.inner.on_init(commits);
        self.guard(commits);
    }

    fn on_commit(&mut self, commits: &mut [CommitPoint]) {
        self.last_commit = commits.last().map(|c| c.generation);
        self.inner.on_commit(commits);
        self.guard(commits);
    }
}

impl SnapshotDeletionPolicy {
    fn guard(&self, commits: &mut [CommitPoint]) {
        if let Some(pinned) = self.snapshot {
            for commit in commits {
                if commit.generation == pinned {
                    commit.deleted = false;
                }
            }
        }
    }
}

/// Reference-counts index files across retained commits and physically
/// deletes the ones nothing references
pub struct IndexFileDeleter {
    dir: Arc<dyn Directory>,
    policy: Box<dyn DeletionPolicy>,
    ref_counts: HashMap<String, u32>,
    commits: Vec<CommitPoint>,
}

impl IndexFileDeleter {
    pub fn new(dir: Arc<dyn Directory>, mut policy: Box<dyn DeletionPolicy>) -> Result<Self> {
        let mut commits = Vec::new();
        let listing = dir.list()?;
        let mut generations: Vec<u64> = listing
            .iter()
            .filter_map(|f| f.strip_prefix(SEGMENTS_PREFIX))
            .filter_map(crate::index::segment_infos::from_base36)
            .collect();
        generations.sort_unstable();
        for generation in generations {
            // Unreadable commits are skipped rather than resurrected
            if let Ok(infos) = SegmentInfos::read(dir.as_ref(), generation) {
                let files = infos.files(dir.as_ref())?;
                commits.push(CommitPoint {
                    generation,
                    segments_file: infos.segments_file_name(),
                    files,
                    deleted: false,
                });
            }
        }

        let mut ref_counts: HashMap<String, u32> = HashMap::new();
        for commit in &commits {
            for file in &commit.files {
                *ref_counts.entry(file.clone()).or_insert(0) += 1;
            }
        }
        policy.on_init(&mut commits);
        let mut deleter = IndexFileDeleter {
            dir,
            policy,
            ref_counts,
            commits,
        };
        deleter.collect()?;
        Ok(deleter)
    }

    fn inc_ref_all(&mut self, files: &[String]) {
        for file in files {
            *self.ref_counts.entry(file.clone()).or_insert(0) += 1;
        }
    }

    fn dec_ref_all(&mut self, files: &[String]) -> Result<()> {
        for file in files {
            let remove = {
                let count = self.ref_counts.entry(file.clone()).or_insert(1);
                *count -= 1;
                *count == 0
            };
            if remove {
                self.ref_counts.remove(file);
                debug!("deleting unreferenced index file {}", file);
                self.dir.delete(file)?;
            }
        }
        Ok(())
    }

    /// Registers the just-committed generation and lets the policy retire
    /// older ones
    pub fn checkpoint(&mut self, infos: &SegmentInfos) -> Result<()> {
        let files = infos.files(self.dir.as_ref())?;
        self.inc_ref_all(&files);
        self.commits.push(CommitPoint {
            generation: infos.generation,
            segments_file: infos.segments_file_name(),
            files,
            deleted: false,
        });
        let mut commits = std::mem::take(&mut self.commits);
        self.policy.on_commit(&mut commits);
        self.commits = commits;
        self.collect()
    }

    /// Drops deleted commit points and their newly unreferenced files
    fn collect(&mut self) -> Result<()> {
        let mut retained = Vec::with_capacity(self.commits.len());
        let dropped: Vec<CommitPoint> = {
            let mut dropped = Vec::new();
            for commit in std::mem::take(&mut self.commits) {
                if commit.deleted {
                    dropped.push(commit);
                } else {
                    retained.push(commit);
                }
            }
            self.commits = retained;
            dropped
        };
        for commit in dropped {
            debug!(
                "retiring commit {} ({})",
                commit.generation, commit.segments_file
            );
            self.dec_ref_all(&commit.files)?;
        }
        Ok(())
    }

    pub fn commits(&self) -> &[CommitPoint] {
        &self.commits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(generation: u64) -> CommitPoint {
        CommitPoint {
            generation,
            segments_file: format!("segments_{}", generation),
            files: vec![format!("segments_{}", generation)],
            deleted: false,
        }
    }

    #[test]
    fn test_keep_only_last() {
        let mut commits = vec![commit(1), commit(2), commit(3)];
        KeepOnlyLastCommit.on_commit(&mut commits);
        assert!(commits[0].deleted && commits[1].deleted);
        assert!(!commits[2].deleted);
    }

    #[test]
    fn test_snapshot_pins_commit() {
        let mut policy = SnapshotDeletionPolicy::new(Box::new(KeepOnlyLastCommit));
        let mut commits = vec![commit(1)];
        policy.on_commit(&mut commits);
        policy.snapshot();

        let mut commits = vec![commit(1), commit(2)];
        policy.on_commit(&mut commits);
        assert!(!commits[0].deleted, "snapshotted commit must survive");
        assert!(!commits[1].deleted);

        policy.release();
        let mut commits = vec![commit(1), commit(2), commit(3)];
        policy.on_commit(&mut commits);
        assert!(commits[0].deleted && commits[1].deleted);
    }
}
