//! The per-repository pipeline: metadata, stats file, clone, churn reports.

use std::fmt::{self, Display, Formatter};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use failure::{Error, Fail, ResultExt};

use churn::{self, ChurnMode};
use github::{GitHub, RepoMetadata};
use input::WorkItem;
use vcs;

/// Where the artifact files and clones end up.
///
/// The default layout matches what the tool documents: three flat artifact
/// directories plus a clone tree, all relative to the working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    /// `github/<owner>-<name>` stats tables.
    pub stats_dir: PathBuf,
    /// `overall/<owner>-<name>` aggregate churn reports.
    pub overall_dir: PathBuf,
    /// `monthly/<owner>-<name>` month-by-month churn reports.
    pub monthly_dir: PathBuf,
    /// `git/<owner>/<name>` clones.
    pub clone_root: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> OutputLayout {
        OutputLayout::rooted(".")
    }
}

impl OutputLayout {
    /// The standard layout, relative to `root` instead of the working
    /// directory.
    pub fn rooted<P: AsRef<Path>>(root: P) -> OutputLayout {
        let root = root.as_ref();

        OutputLayout {
            stats_dir: root.join("github"),
            overall_dir: root.join("overall"),
            monthly_dir: root.join("monthly"),
            clone_root: root.join("git"),
        }
    }

    /// Create the three artifact directories if they don't exist yet. The
    /// clone tree is created lazily, one repository at a time.
    pub fn create_dirs(&self) -> Result<(), Error> {
        for dir in &[&self.stats_dir, &self.overall_dir, &self.monthly_dir] {
            fs::create_dir_all(dir)
                .with_context(|_| format!("Couldn't create {}", dir.display()))?;
        }

        Ok(())
    }

    fn clone_path(&self, meta: &RepoMetadata) -> PathBuf {
        self.clone_root.join(&meta.owner).join(&meta.name)
    }
}

/// The pipeline step a repository failed at.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    Metadata,
    Stats,
    Clone,
    OverallChurn,
    MonthlyChurn,
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match *self {
            Step::Metadata => "metadata lookup",
            Step::Stats => "writing the stats file",
            Step::Clone => "cloning",
            Step::OverallChurn => "the overall churn run",
            Step::MonthlyChurn => "the monthly churn run",
        };

        write!(f, "{}", name)
    }
}

/// A repository's pipeline was abandoned, with the step it died at and the
/// underlying cause.
#[derive(Debug)]
pub struct AnalysisError {
    pub step: Step,
    cause: Error,
}

impl AnalysisError {
    fn new(step: Step, cause: Error) -> AnalysisError {
        AnalysisError { step, cause }
    }
}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.cause)
    }
}

impl Fail for AnalysisError {
    fn cause(&self) -> Option<&dyn Fail> {
        Some(self.cause.as_fail())
    }
}

/// Runs the whole pipeline for one repository at a time.
///
/// An `Analyzer` is shared between workers, so it holds nothing mutable.
#[derive(Debug, Clone)]
pub struct Analyzer {
    github: GitHub,
    layout: OutputLayout,
}

impl Analyzer {
    pub fn new(token: &str) -> Analyzer {
        Analyzer::with_layout(token, OutputLayout::default())
    }

    pub fn with_layout(token: &str, layout: OutputLayout) -> Analyzer {
        Analyzer::with_github(GitHub::new(token), layout)
    }

    /// Like [`Analyzer::with_layout`], but with an already-built client, so
    /// the API root can be pointed somewhere else.
    pub fn with_github(github: GitHub, layout: OutputLayout) -> Analyzer {
        Analyzer { github, layout }
    }

    /// Analyze one repository to completion.
    ///
    /// Steps run strictly in order; the first failure abandons the rest and
    /// leaves any artifacts written so far as they are.
    pub fn analyze(&self, item: &WorkItem) -> Result<(), AnalysisError> {
        let started = Instant::now();

        let meta = self
            .github
            .repository(&item.id)
            .map_err(|e| AnalysisError::new(Step::Metadata, e))?;

        info!("Analyzing: {}", meta.clone_url);

        self.write_stats(&meta)
            .map_err(|e| AnalysisError::new(Step::Stats, e))?;

        let clone_path = self.layout.clone_path(&meta);
        vcs::ensure_clone(&meta.clone_url, &clone_path)
            .map_err(|e| AnalysisError::new(Step::Clone, e))?;

        churn::run(
            &clone_path,
            ChurnMode::Overall,
            &self.layout.overall_dir.join(meta.slug()),
        )
        .map_err(|e| AnalysisError::new(Step::OverallChurn, e))?;

        churn::run(
            &clone_path,
            ChurnMode::Monthly,
            &self.layout.monthly_dir.join(meta.slug()),
        )
        .map_err(|e| AnalysisError::new(Step::MonthlyChurn, e))?;

        info!(
            "Finished {} in {:.1}s",
            item.id,
            started.elapsed().as_secs_f64()
        );

        Ok(())
    }

    /// Write the two-line `forks;branches;watchers;stars` table, flushed and
    /// closed before the next step starts.
    fn write_stats(&self, meta: &RepoMetadata) -> Result<(), Error> {
        let path = self.layout.stats_dir.join(meta.slug());
        let mut file =
            File::create(&path).with_context(|_| format!("Couldn't create {}", path.display()))?;

        writeln!(file, "forks;branches;watchers;stars")?;
        writeln!(
            file,
            "{};{};{};{}",
            meta.forks, meta.branches, meta.watchers, meta.stars
        )?;
        file.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile;

    fn dummy_metadata() -> RepoMetadata {
        RepoMetadata {
            owner: String::from("acme"),
            name: String::from("widget"),
            forks: 3,
            branches: 7,
            watchers: 14,
            stars: 42,
            clone_url: String::from("https://github.com/acme/widget.git"),
        }
    }

    #[test]
    fn stats_file_has_the_delimited_table() {
        let temp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::rooted(temp.path());
        layout.create_dirs().unwrap();
        let analyzer = Analyzer::with_layout("token", layout);

        analyzer.write_stats(&dummy_metadata()).unwrap();

        let contents =
            ::std::fs::read_to_string(temp.path().join("github").join("acme-widget")).unwrap();
        assert_eq!(contents, "forks;branches;watchers;stars\n3;7;14;42\n");
    }

    #[test]
    fn stats_file_is_overwritten_on_rerun() {
        let temp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::rooted(temp.path());
        layout.create_dirs().unwrap();
        let analyzer = Analyzer::with_layout("token", layout);
        analyzer.write_stats(&dummy_metadata()).unwrap();

        let mut newer = dummy_metadata();
        newer.stars = 43;
        analyzer.write_stats(&newer).unwrap();

        let contents =
            ::std::fs::read_to_string(temp.path().join("github").join("acme-widget")).unwrap();
        assert_eq!(contents, "forks;branches;watchers;stars\n3;7;14;43\n");
    }

    #[test]
    fn create_dirs_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::rooted(temp.path());

        layout.create_dirs().unwrap();
        layout.create_dirs().unwrap();

        assert!(temp.path().join("github").is_dir());
        assert!(temp.path().join("overall").is_dir());
        assert!(temp.path().join("monthly").is_dir());
    }

    #[test]
    fn clone_path_is_owner_then_name() {
        let layout = OutputLayout::rooted("/work");

        let got = layout.clone_path(&dummy_metadata());

        assert_eq!(got, PathBuf::from("/work/git/acme/widget"));
    }

    #[test]
    fn metadata_failure_leaves_no_artifacts_behind() {
        let temp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::rooted(temp.path());
        layout.create_dirs().unwrap();
        // Port 1 is never listening, so the lookup dies before any artifact
        // is written.
        let github = GitHub::with_root("token", "http://127.0.0.1:1");
        let analyzer = Analyzer::with_github(github, layout);
        let item = WorkItem {
            raw: String::from("bogus/doesnotexist"),
            id: String::from("bogus/doesnotexist"),
        };

        let err = analyzer.analyze(&item).unwrap_err();

        assert_eq!(err.step, Step::Metadata);
        for dir in &["github", "overall", "monthly"] {
            let entries = ::std::fs::read_dir(temp.path().join(dir)).unwrap().count();
            assert_eq!(entries, 0, "{} should be empty", dir);
        }
        assert!(!temp.path().join("git").exists());
    }

    #[test]
    fn analysis_error_names_the_step() {
        let err = AnalysisError::new(Step::Clone, format_err!("remote hung up"));

        let msg = err.to_string();
        assert!(msg.contains("cloning"));
        assert!(msg.contains("remote hung up"));
    }
}
