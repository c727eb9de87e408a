//! Atomic artifact writer
//!
//! Artifacts are written to a hidden temporary sibling, flushed and synced,
//! then renamed into place. The artifacts of one platform are staged together
//! and only renamed once all of them staged cleanly. Files being replaced are
//! moved aside first and restored if a later rename fails, so a failing
//! platform never leaves a half-written pair behind.

use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::ArtifactIoError;
use crate::types::GeneratedArtifact;

/// Files touched by one commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Scoped handle on the output root.
///
/// Temporary files still registered when the guard drops (a panicking or
/// cancelled unit) are removed.
#[derive(Debug)]
pub struct OutputDir {
    root: PathBuf,
    pending: Mutex<Vec<PathBuf>>,
}

impl OutputDir {
    pub fn acquire(root: &Path) -> Result<Self, ArtifactIoError> {
        fs::create_dir_all(root).map_err(|e| ArtifactIoError::new(root, e))?;
        debug!("Output root acquired: {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an artifact under this root
    pub fn resolve(&self, artifact: &GeneratedArtifact) -> PathBuf {
        self.root.join(&artifact.output_path)
    }

    /// Write a group of artifacts all-or-nothing.
    ///
    /// Artifacts whose current content already matches are left untouched.
    pub fn commit(&self, artifacts: &[&GeneratedArtifact]) -> Result<WriteSummary, ArtifactIoError> {
        let mut summary = WriteSummary::default();
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();

        for artifact in artifacts {
            let target = self.resolve(artifact);
            if is_unchanged(&target, &artifact.content) {
                summary.unchanged.push(target);
                continue;
            }
            match self.stage(&target, &artifact.content) {
                Ok(temp) => staged.push((temp, target)),
                Err(e) => {
                    self.discard(staged.iter().map(|(temp, _)| temp));
                    return Err(e);
                }
            }
        }

        if let Some((_, target)) = staged.iter().find(|(_, target)| target.is_dir()) {
            let error = ArtifactIoError::new(target, io::Error::other("target is a directory"));
            self.discard(staged.iter().map(|(temp, _)| temp));
            return Err(error);
        }

        let mut placed: Vec<Placed> = Vec::with_capacity(staged.len());
        let mut remaining = staged.iter();
        while let Some((temp, target)) = remaining.next() {
            match place(temp, target) {
                Ok(entry) => {
                    self.forget(temp);
                    placed.push(entry);
                }
                Err(e) => {
                    self.discard(std::iter::once(temp).chain(remaining.map(|(t, _)| t)));
                    roll_back(placed);
                    return Err(ArtifactIoError::new(target, e));
                }
            }
        }

        for entry in placed {
            if let Some(backup) = &entry.backup {
                if let Err(e) = fs::remove_file(backup) {
                    warn!("Could not remove backup {}: {}", backup.display(), e);
                }
            }
            debug!("Wrote {}", entry.target.display());
            summary.written.push(entry.target);
        }

        Ok(summary)
    }

    fn stage(&self, target: &Path, content: &str) -> Result<PathBuf, ArtifactIoError> {
        let parent = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| ArtifactIoError::new(parent, e))?;

        let temp = sibling(target, "tmp");
        self.pending.lock().push(temp.clone());

        let result = File::create(&temp).and_then(|file| {
            let mut writer = BufWriter::with_capacity(64 * 1024, file);
            writer.write_all(content.as_bytes())?;
            writer.flush()?;
            writer.get_ref().sync_all()
        });

        match result {
            Ok(()) => Ok(temp),
            Err(e) => {
                self.discard(std::iter::once(&temp));
                Err(ArtifactIoError::new(target, e))
            }
        }
    }

    fn discard<'p>(&self, temps: impl Iterator<Item = &'p PathBuf>) {
        for temp in temps {
            if temp.exists() {
                if let Err(e) = fs::remove_file(temp) {
                    warn!("Could not remove temporary file {}: {}", temp.display(), e);
                }
            }
            self.forget(temp);
        }
    }

    fn forget(&self, temp: &Path) {
        self.pending.lock().retain(|p| p != temp);
    }
}

impl Drop for OutputDir {
    fn drop(&mut self) {
        for temp in self.pending.get_mut().drain(..) {
            if temp.exists() {
                let _ = fs::remove_file(&temp);
            }
        }
    }
}

/// An artifact renamed into place, with the file it replaced
struct Placed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

fn place(temp: &Path, target: &Path) -> io::Result<Placed> {
    let backup = if target.exists() {
        let backup = sibling(target, "bak");
        fs::rename(target, &backup)?;
        Some(backup)
    } else {
        None
    };
    match fs::rename(temp, target) {
        Ok(()) => Ok(Placed {
            target: target.to_path_buf(),
            backup,
        }),
        Err(e) => {
            if let Some(backup) = &backup {
                let _ = fs::rename(backup, target);
            }
            Err(e)
        }
    }
}

/// Undo earlier renames of a commit, newest first
fn roll_back(placed: Vec<Placed>) {
    for entry in placed.into_iter().rev() {
        let restored = match &entry.backup {
            Some(backup) => fs::rename(backup, &entry.target),
            None => fs::remove_file(&entry.target),
        };
        if let Err(e) = restored {
            warn!("Could not roll back {}: {}", entry.target.display(), e);
        }
    }
}

/// Hidden `.<name>.<suffix>` next to `target`
fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{file_name}.{suffix}"))
}

fn is_unchanged(target: &Path, content: &str) -> bool {
    fs::read(target).is_ok_and(|existing| existing == content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactKind;
    use tempfile::TempDir;

    fn artifact(path: &str, content: &str) -> GeneratedArtifact {
        GeneratedArtifact {
            platform: "bukkit".to_string(),
            kind: ArtifactKind::Manifest,
            content: content.to_string(),
            output_path: PathBuf::from(path),
        }
    }

    fn leftover_temps(root: &Path) -> usize {
        walk(root)
            .iter()
            .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
            .count()
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    out.extend(walk(&path));
                } else {
                    out.push(path);
                }
            }
        }
        out
    }

    #[test]
    fn test_commit_writes_pair() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Ok(out) = OutputDir::acquire(&temp_dir.path().join("out")) else {
            panic!("acquire should succeed");
        };
        let code = artifact("bukkit/demo_bukkit.java", "class A {}\n");
        let manifest = artifact("bukkit/plugin.yml", "name: demo\n");

        let Ok(summary) = out.commit(&[&code, &manifest]) else {
            panic!("commit should succeed");
        };
        assert_eq!(summary.written.len(), 2);
        assert_eq!(
            fs::read_to_string(out.root().join("bukkit/plugin.yml")).ok(),
            Some("name: demo\n".to_string())
        );
        assert_eq!(leftover_temps(out.root()), 0);
    }

    #[test]
    fn test_unchanged_files_are_skipped() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Ok(out) = OutputDir::acquire(temp_dir.path()) else {
            panic!("acquire should succeed");
        };
        let manifest = artifact("velocity/velocity-plugin.json", "{}\n");
        assert!(out.commit(&[&manifest]).is_ok());

        let Ok(again) = out.commit(&[&manifest]) else {
            panic!("second commit should succeed");
        };
        assert!(again.written.is_empty());
        assert_eq!(again.unchanged.len(), 1);
    }

    #[test]
    fn test_failed_stage_leaves_nothing() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Ok(out) = OutputDir::acquire(temp_dir.path()) else {
            panic!("acquire should succeed");
        };
        // A regular file where a directory is needed blocks the second artifact
        assert!(fs::write(temp_dir.path().join("blocked"), "x").is_ok());
        let good = artifact("nukkit/nukkit.yml", "name: demo\n");
        let bad = artifact("blocked/demo_nukkit.java", "class A {}\n");

        let Err(error) = out.commit(&[&good, &bad]) else {
            panic!("commit should fail");
        };
        assert!(error.path.starts_with(temp_dir.path().join("blocked")));
        assert!(!temp_dir.path().join("nukkit/nukkit.yml").exists());
        assert_eq!(leftover_temps(temp_dir.path()), 0);
    }

    #[test]
    fn test_directory_target_leaves_previous_pair() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Ok(out) = OutputDir::acquire(temp_dir.path()) else {
            panic!("acquire should succeed");
        };
        let code_path = temp_dir.path().join("bukkit/demo_bukkit.java");
        assert!(fs::create_dir_all(temp_dir.path().join("bukkit/plugin.yml/nested")).is_ok());
        assert!(fs::write(&code_path, "class Old {}\n").is_ok());

        let code = artifact("bukkit/demo_bukkit.java", "class New {}\n");
        let manifest = artifact("bukkit/plugin.yml", "name: demo\n");
        let Err(error) = out.commit(&[&code, &manifest]) else {
            panic!("commit onto a directory should fail");
        };
        assert_eq!(error.path, temp_dir.path().join("bukkit/plugin.yml"));
        assert_eq!(
            fs::read_to_string(&code_path).ok(),
            Some("class Old {}\n".to_string())
        );
        assert_eq!(leftover_temps(temp_dir.path()), 0);
    }

    #[test]
    fn test_replacing_files_leaves_no_backups() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Ok(out) = OutputDir::acquire(temp_dir.path()) else {
            panic!("acquire should succeed");
        };
        let first = artifact("fabric/fabric.mod.json", "{\"version\": \"1\"}\n");
        let second = artifact("fabric/fabric.mod.json", "{\"version\": \"2\"}\n");
        assert!(out.commit(&[&first]).is_ok());

        let Ok(summary) = out.commit(&[&second]) else {
            panic!("replacing commit should succeed");
        };
        assert_eq!(summary.written.len(), 1);
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("fabric/fabric.mod.json")).ok(),
            Some("{\"version\": \"2\"}\n".to_string())
        );
        let names: Vec<_> = walk(temp_dir.path())
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["fabric.mod.json".to_string()]);
    }
}
