//! Update-package installation task
//!
//! A package is a directory: a `package.json` manifest describing it plus
//! the item files to place into the content repository. The task plans
//! one step per item, applies items according to the merge mode, and
//! writes an installation history log when it actually installs (a
//! preview run walks the same steps without touching the repository).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use pkgstream_protocol::{ExceptionDetail, MergeMode};

use crate::task::{OperationTask, StepFailure, TaskError, TaskPlan, TaskStep};

const MANIFEST_NAME: &str = "package.json";

/// Whether the run applies changes or only analyzes the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    Upgrade,
    Preview,
}

/// Package manifest, read from `package.json` inside the package.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageMetadata {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub revision: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub publisher: String,

    #[serde(default)]
    pub readme: String,

    #[serde(default)]
    pub comment: String,

    /// Step count the package declares; item enumeration is used when
    /// absent. A wrong declaration surfaces as progress past 100%.
    #[serde(default)]
    pub commands_count: Option<u32>,
}

pub struct UpdatePackageTask {
    package_path: PathBuf,
    repo_root: PathBuf,
    history_root: PathBuf,
    merge_mode: MergeMode,
    action: InstallAction,
    package_name: Mutex<Option<String>>,
    applied: Mutex<Vec<String>>,
}

impl UpdatePackageTask {
    pub fn new(
        package_path: PathBuf,
        repo_root: PathBuf,
        history_root: PathBuf,
        merge_mode: MergeMode,
        action: InstallAction,
    ) -> Self {
        Self {
            package_path,
            repo_root,
            history_root,
            merge_mode,
            action,
            package_name: Mutex::new(None),
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Resolve a raw package parameter: bare names (no path separator) are
    /// looked up under the packages root.
    pub fn resolve_package_path(packages_root: &Path, raw: &str) -> PathBuf {
        if raw.contains('/') || raw.contains('\\') {
            PathBuf::from(raw)
        } else {
            packages_root.join(raw)
        }
    }

    async fn load_metadata(&self) -> Result<PackageMetadata, TaskError> {
        let manifest_path = self.package_path.join(MANIFEST_NAME);
        let contents = fs::read_to_string(&manifest_path).await.map_err(|e| {
            TaskError::with_detail(
                format!(
                    "The package \"{}\" could not be loaded. The file is not an update package.",
                    self.package_path.display()
                ),
                ExceptionDetail {
                    error_text: e.to_string(),
                    origin: "package-task".to_string(),
                    trace: format!("reading {}", manifest_path.display()),
                },
            )
        })?;

        let metadata: PackageMetadata = serde_json::from_str(&contents).map_err(|e| {
            TaskError::with_detail(
                format!(
                    "The package \"{}\" could not be loaded. The file is not an update package.",
                    self.package_path.display()
                ),
                ExceptionDetail {
                    error_text: e.to_string(),
                    origin: "package-task".to_string(),
                    trace: format!("parsing {}", manifest_path.display()),
                },
            )
        })?;

        if metadata.name.is_empty() {
            return Err(TaskError::new(format!(
                "The package \"{}\" could not be loaded. The file is not an update package.",
                self.package_path.display()
            )));
        }

        Ok(metadata)
    }

    fn enumerate_items(&self) -> Vec<String> {
        let mut items: Vec<String> = WalkDir::new(&self.package_path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.package_path)
                    .ok()
                    .map(|rel| rel.to_string_lossy().into_owned())
            })
            .filter(|rel| rel != MANIFEST_NAME)
            .collect();
        items.sort();
        items
    }

    async fn apply_item(&self, label: &str) -> Result<String, StepFailure> {
        let source = self.package_path.join(label);
        let target = self.repo_root.join(label);

        let io_failure = |e: std::io::Error, doing: &str| StepFailure {
            message: format!("Failed to install item {}", label),
            detail: ExceptionDetail {
                error_text: e.to_string(),
                origin: "package-task".to_string(),
                trace: format!("{} {}", doing, target.display()),
            },
        };

        if self.action == InstallAction::Preview {
            // Analyze only: confirm the item is readable, change nothing
            fs::metadata(&source)
                .await
                .map_err(|e| io_failure(e, "reading"))?;
            return Ok(format!("Analyzed item {}", label));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_failure(e, "creating"))?;
        }

        let exists = fs::metadata(&target).await.is_ok();
        let description = match self.merge_mode {
            MergeMode::Skip if exists => format!("Skipped existing item {}", label),
            MergeMode::Append if exists => {
                let appended = append_target(&target);
                fs::copy(&source, &appended)
                    .await
                    .map_err(|e| io_failure(e, "writing"))?;
                format!("Appended item {}", label)
            }
            MergeMode::Clear if exists => {
                fs::remove_file(&target)
                    .await
                    .map_err(|e| io_failure(e, "clearing"))?;
                fs::copy(&source, &target)
                    .await
                    .map_err(|e| io_failure(e, "writing"))?;
                format!("Replaced item {}", label)
            }
            _ => {
                fs::copy(&source, &target)
                    .await
                    .map_err(|e| io_failure(e, "writing"))?;
                format!("Installed item {}", label)
            }
        };

        self.applied.lock().unwrap().push(label.to_string());
        Ok(description)
    }
}

/// Pick a non-conflicting sibling name for append-mode installs.
fn append_target(target: &Path) -> PathBuf {
    for n in 1u32.. {
        let candidate = target.with_file_name(format!(
            "{}.{}",
            target
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            n
        ));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

#[async_trait]
impl OperationTask for UpdatePackageTask {
    async fn plan(&self) -> Result<TaskPlan, TaskError> {
        if fs::metadata(&self.package_path).await.is_err() {
            return Err(TaskError::new(format!(
                "The package \"{}\" not found.",
                self.package_path.display()
            )));
        }

        let metadata = self.load_metadata().await?;
        *self.package_name.lock().unwrap() = Some(metadata.name.clone());

        let items = self.enumerate_items();
        debug!("Package {} has {} items", metadata.name, items.len());

        let action = match self.action {
            InstallAction::Preview => "Analyzing",
            InstallAction::Upgrade => "Installing",
        };

        let banners = vec![
            format!(
                "Package name: {}\nPackage version: {} (revision: {})\nAuthor: {}\nPublisher: {}\nReadme: {}\nComment: {}",
                metadata.name,
                metadata.version,
                metadata.revision,
                metadata.author,
                metadata.publisher,
                metadata.readme,
                metadata.comment
            ),
            format!("{} package: {}", action, self.package_path.display()),
        ];

        let declared_steps = metadata.commands_count.unwrap_or(items.len() as u32);

        Ok(TaskPlan {
            banners,
            declared_steps,
            steps: items.into_iter().map(|label| TaskStep { label }).collect(),
        })
    }

    async fn run_step(&self, _index: usize, step: &TaskStep) -> Result<String, StepFailure> {
        self.apply_item(&step.label).await
    }

    async fn finish(&self) -> Result<Option<String>, TaskError> {
        if self.action == InstallAction::Preview {
            return Ok(None);
        }

        let package_name = self
            .package_name
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let applied = self.applied.lock().unwrap().clone();

        let dir = self.history_root.join(&package_name);
        fs::create_dir_all(&dir).await.map_err(|e| {
            TaskError::new(format!("Failed to create history directory: {}", e))
        })?;

        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        let history_path = dir.join(format!("{}.log", stamp));
        let mut contents = format!("package: {}\nitems: {}\n", package_name, applied.len());
        for label in &applied {
            contents.push_str(label);
            contents.push('\n');
        }
        fs::write(&history_path, contents).await.map_err(|e| {
            TaskError::new(format!("Failed to write installation history: {}", e))
        })?;

        Ok(Some(history_path.to_string_lossy().into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn make_package(items: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let manifest = serde_json::json!({
            "name": "demo",
            "version": "1.2.0",
            "author": "tests",
        });
        fs::write(
            dir.path().join(MANIFEST_NAME),
            serde_json::to_string(&manifest).unwrap(),
        )
        .await
        .unwrap();
        for (rel, contents) in items {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.unwrap();
            }
            fs::write(path, contents).await.unwrap();
        }
        dir
    }

    fn task(pkg: &TempDir, repo: &TempDir, history: &TempDir, mode: MergeMode) -> UpdatePackageTask {
        UpdatePackageTask::new(
            pkg.path().to_path_buf(),
            repo.path().to_path_buf(),
            history.path().to_path_buf(),
            mode,
            InstallAction::Upgrade,
        )
    }

    #[tokio::test]
    async fn test_plan_lists_items_and_banners() {
        let pkg = make_package(&[("items/a.txt", "a"), ("items/b.txt", "b")]).await;
        let repo = TempDir::new().unwrap();
        let history = TempDir::new().unwrap();
        let task = task(&pkg, &repo, &history, MergeMode::Overwrite);

        let plan = task.plan().await.unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.declared_steps, 2);
        assert!(plan.banners[0].starts_with("Package name: demo"));
        assert!(plan.banners[1].starts_with("Installing package:"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_fatal() {
        let pkg = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        let history = TempDir::new().unwrap();
        let task = task(&pkg, &repo, &history, MergeMode::Overwrite);

        let err = task.plan().await.unwrap_err();
        assert!(err.message.contains("not an update package"));
    }

    #[tokio::test]
    async fn test_install_copies_items_and_writes_history() {
        let pkg = make_package(&[("items/a.txt", "a")]).await;
        let repo = TempDir::new().unwrap();
        let history = TempDir::new().unwrap();
        let task = task(&pkg, &repo, &history, MergeMode::Overwrite);

        let plan = task.plan().await.unwrap();
        for (i, step) in plan.steps.iter().enumerate() {
            task.run_step(i, step).await.unwrap();
        }
        let history_ref = task.finish().await.unwrap().unwrap();

        assert!(repo.path().join("items/a.txt").exists());
        let log = fs::read_to_string(&history_ref).await.unwrap();
        assert!(log.contains("items/a.txt"));
    }

    #[tokio::test]
    async fn test_skip_mode_leaves_existing_item() {
        let pkg = make_package(&[("items/a.txt", "new")]).await;
        let repo = TempDir::new().unwrap();
        let history = TempDir::new().unwrap();
        fs::create_dir_all(repo.path().join("items")).await.unwrap();
        fs::write(repo.path().join("items/a.txt"), "old").await.unwrap();

        let task = task(&pkg, &repo, &history, MergeMode::Skip);
        let plan = task.plan().await.unwrap();
        let description = task.run_step(0, &plan.steps[0]).await.unwrap();

        assert!(description.starts_with("Skipped"));
        let contents = fs::read_to_string(repo.path().join("items/a.txt")).await.unwrap();
        assert_eq!(contents, "old");
    }

    #[tokio::test]
    async fn test_preview_does_not_touch_repository() {
        let pkg = make_package(&[("items/a.txt", "a")]).await;
        let repo = TempDir::new().unwrap();
        let history = TempDir::new().unwrap();
        let task = UpdatePackageTask::new(
            pkg.path().to_path_buf(),
            repo.path().to_path_buf(),
            history.path().to_path_buf(),
            MergeMode::Overwrite,
            InstallAction::Preview,
        );

        let plan = task.plan().await.unwrap();
        assert!(plan.banners[1].starts_with("Analyzing package:"));
        let description = task.run_step(0, &plan.steps[0]).await.unwrap();
        assert!(description.starts_with("Analyzed"));
        assert!(task.finish().await.unwrap().is_none());
        assert!(!repo.path().join("items/a.txt").exists());
    }

    #[test]
    fn test_resolve_bare_name_uses_packages_root() {
        let resolved =
            UpdatePackageTask::resolve_package_path(Path::new("/var/packages"), "demo-1.0");
        assert_eq!(resolved, PathBuf::from("/var/packages/demo-1.0"));

        let absolute =
            UpdatePackageTask::resolve_package_path(Path::new("/var/packages"), "/tmp/pkg");
        assert_eq!(absolute, PathBuf::from("/tmp/pkg"));
    }
}
