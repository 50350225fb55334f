//! Cloning repositories and reusing clones we already have.

use std::fs::{self, File};
use std::path::Path;

use failure::{Error, ResultExt};
use git2::build::RepoBuilder;
use git2::Repository;

/// Written inside `.git/` once a clone has fully finished, so an interrupted
/// clone is never mistaken for a reusable one.
const CLONE_MARKER: &str = "clone-complete";

/// What we found at a prospective clone path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CloneState {
    /// Nothing there yet.
    Missing,
    /// A directory exists but the completion marker doesn't, most likely the
    /// leftovers of a clone that died partway through.
    Partial,
    /// A fully cloned repository, safe to reuse.
    Ready,
}

pub fn clone_state(dest: &Path) -> CloneState {
    if !dest.exists() {
        CloneState::Missing
    } else if dest.join(".git").join(CLONE_MARKER).is_file() {
        CloneState::Ready
    } else {
        CloneState::Partial
    }
}

/// Make sure a complete clone exists at `dest`, cloning from `url` if needed.
///
/// Partial clones left behind by an earlier crash are deleted and cloned
/// again from scratch.
pub fn ensure_clone(url: &str, dest: &Path) -> Result<Repository, Error> {
    match clone_state(dest) {
        CloneState::Ready => {
            debug!("{} already cloned", dest.display());
            let repo = Repository::open(dest).context("Couldn't open the existing clone")?;
            Ok(repo)
        }
        CloneState::Partial => {
            warn!("Removing partial clone at {}", dest.display());
            fs::remove_dir_all(dest).context("Couldn't remove the partial clone")?;
            clone_repo(url, dest)
        }
        CloneState::Missing => clone_repo(url, dest),
    }
}

fn clone_repo(url: &str, dest: &Path) -> Result<Repository, Error> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|_| format!("Couldn't create {}", parent.display()))?;
    }

    debug!("Cloning {} into {}", url, dest.display());
    let repo = RepoBuilder::new()
        .clone(url, dest)
        .context("`git clone` failed")?;

    File::create(dest.join(".git").join(CLONE_MARKER))
        .context("Couldn't record clone completion")?;

    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use tempfile;

    macro_rules! require_program {
        ($name:expr) => {{
            let exists = ::std::process::Command::new($name)
                .arg("--help")
                .stdout(::std::process::Stdio::null())
                .stderr(::std::process::Stdio::null())
                .status()
                .is_ok();
            if !exists {
                eprintln!("Couldn't find \"{}\"", $name);
                return;
            }
        }};
    }

    /// Create a tiny repository with a single commit for cloning from.
    fn scratch_repo(dir: &::std::path::Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(dir)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .unwrap();
            assert!(status.success(), "git {:?} failed", args);
        };

        run(&["init"]);
        ::std::fs::write(dir.join("README"), "scratch\n").unwrap();
        run(&["add", "README"]);
        run(&[
            "-c",
            "user.name=scratch",
            "-c",
            "user.email=scratch@localhost",
            "commit",
            "-m",
            "initial",
        ]);
    }

    #[test]
    fn missing_directory_is_missing() {
        let temp = tempfile::tempdir().unwrap();

        let got = clone_state(&temp.path().join("nope"));

        assert_eq!(got, CloneState::Missing);
    }

    #[test]
    fn directory_without_marker_is_partial() {
        let temp = tempfile::tempdir().unwrap();
        ::std::fs::create_dir_all(temp.path().join("clone").join(".git")).unwrap();

        let got = clone_state(&temp.path().join("clone"));

        assert_eq!(got, CloneState::Partial);
    }

    #[test]
    fn directory_with_marker_is_ready() {
        let temp = tempfile::tempdir().unwrap();
        let git_dir = temp.path().join("clone").join(".git");
        ::std::fs::create_dir_all(&git_dir).unwrap();
        ::std::fs::write(git_dir.join(CLONE_MARKER), "").unwrap();

        let got = clone_state(&temp.path().join("clone"));

        assert_eq!(got, CloneState::Ready);
    }

    #[test]
    fn clone_writes_the_completion_marker() {
        require_program!("git");

        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        ::std::fs::create_dir(&src).unwrap();
        scratch_repo(&src);
        let dest = temp.path().join("dest");

        ensure_clone(src.to_str().unwrap(), &dest).unwrap();

        assert_eq!(clone_state(&dest), CloneState::Ready);
    }

    #[test]
    fn second_run_reuses_the_clone() {
        require_program!("git");

        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        ::std::fs::create_dir(&src).unwrap();
        scratch_repo(&src);
        let dest = temp.path().join("dest");

        ensure_clone(src.to_str().unwrap(), &dest).unwrap();
        let marker = dest.join(".git").join(CLONE_MARKER);
        let first_cloned = marker.metadata().unwrap().modified().unwrap();

        ensure_clone(src.to_str().unwrap(), &dest).unwrap();

        // An untouched marker means nothing was re-cloned.
        assert_eq!(marker.metadata().unwrap().modified().unwrap(), first_cloned);
    }

    #[test]
    fn partial_clone_is_replaced() {
        require_program!("git");

        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        ::std::fs::create_dir(&src).unwrap();
        scratch_repo(&src);

        let dest = temp.path().join("dest");
        ::std::fs::create_dir_all(dest.join(".git")).unwrap();
        ::std::fs::write(dest.join("stale"), "left behind by a crash").unwrap();

        ensure_clone(src.to_str().unwrap(), &dest).unwrap();

        assert_eq!(clone_state(&dest), CloneState::Ready);
        assert!(!dest.join("stale").exists());
    }
}
