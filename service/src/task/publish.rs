//! Publish task
//!
//! Copies items from a source database directory into a target database
//! directory. Scope comes from the root item and the recursive flag;
//! incremental modes skip items whose target is already up to date.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use walkdir::WalkDir;

use pkgstream_protocol::{ExceptionDetail, PublishBody, PublishMode};

use crate::task::{OperationTask, StepFailure, TaskError, TaskPlan, TaskStep};

pub struct PublishTask {
    source_root: PathBuf,
    target_root: PathBuf,
    mode: PublishMode,
    language: Option<String>,
    targets: Vec<String>,
    recursive: bool,
    root_item: Option<String>,
    source_db: String,
    target_db: String,
}

impl PublishTask {
    pub fn from_body(dbs_root: &std::path::Path, body: &PublishBody) -> Self {
        Self {
            source_root: dbs_root.join(&body.source_db),
            target_root: dbs_root.join(&body.target_db),
            mode: body.mode,
            language: body.language.clone(),
            targets: body.targets.clone().unwrap_or_default(),
            recursive: body.recursive,
            root_item: body.root_item.clone(),
            source_db: body.source_db.clone(),
            target_db: body.target_db.clone(),
        }
    }

    fn scope_root(&self) -> PathBuf {
        match &self.root_item {
            Some(root) => self.source_root.join(root),
            None => self.source_root.clone(),
        }
    }

    fn matches_language(&self, rel: &str) -> bool {
        match &self.language {
            Some(lang) => rel.contains(&format!(".{}.", lang)),
            None => true,
        }
    }

    fn enumerate_items(&self) -> Vec<String> {
        let scope = self.scope_root();

        if scope.is_file() {
            return scope
                .strip_prefix(&self.source_root)
                .ok()
                .map(|rel| vec![rel.to_string_lossy().into_owned()])
                .unwrap_or_default();
        }

        let walker = if self.recursive {
            WalkDir::new(&scope)
        } else {
            WalkDir::new(&scope).max_depth(1)
        };

        let mut items: Vec<String> = walker
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.source_root)
                    .ok()
                    .map(|rel| rel.to_string_lossy().into_owned())
            })
            .filter(|rel| self.matches_language(rel))
            .collect();
        items.sort();
        items
    }

    async fn publish_item(&self, label: &str) -> Result<String, StepFailure> {
        let source = self.source_root.join(label);
        let target = self.target_root.join(label);

        let io_failure = |e: std::io::Error, doing: &str| StepFailure {
            message: format!("Failed to publish item {}", label),
            detail: ExceptionDetail {
                error_text: e.to_string(),
                origin: "publish-task".to_string(),
                trace: format!("{} {}", doing, target.display()),
            },
        };

        if matches!(self.mode, PublishMode::Incremental | PublishMode::Smart) {
            if let (Ok(source_meta), Ok(target_meta)) =
                (fs::metadata(&source).await, fs::metadata(&target).await)
            {
                let up_to_date = match (source_meta.modified(), target_meta.modified()) {
                    (Ok(src), Ok(tgt)) => tgt >= src,
                    _ => false,
                };
                if up_to_date {
                    return Ok(format!("Skipped up-to-date item {}", label));
                }
            }
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_failure(e, "creating"))?;
        }
        fs::copy(&source, &target)
            .await
            .map_err(|e| io_failure(e, "writing"))?;

        Ok(format!("Published item {}", label))
    }
}

#[async_trait]
impl OperationTask for PublishTask {
    async fn plan(&self) -> Result<TaskPlan, TaskError> {
        if fs::metadata(&self.source_root).await.is_err() {
            return Err(TaskError::new(format!(
                "Source database \"{}\" not found.",
                self.source_db
            )));
        }

        let scope = self.scope_root();
        if fs::metadata(&scope).await.is_err() {
            return Err(TaskError::new(format!(
                "Root item \"{}\" not found in database \"{}\".",
                self.root_item.as_deref().unwrap_or("/"),
                self.source_db
            )));
        }

        let items = self.enumerate_items();

        let mut banner = format!(
            "Publishing from {} to {} (mode: {}",
            self.source_db,
            self.target_db,
            self.mode.as_str()
        );
        if let Some(lang) = &self.language {
            banner.push_str(&format!(", language: {}", lang));
        }
        if !self.targets.is_empty() {
            banner.push_str(&format!(", targets: {}", self.targets.join(",")));
        }
        banner.push(')');

        Ok(TaskPlan {
            banners: vec![banner],
            declared_steps: items.len() as u32,
            steps: items.into_iter().map(|label| TaskStep { label }).collect(),
        })
    }

    async fn run_step(&self, _index: usize, step: &TaskStep) -> Result<String, StepFailure> {
        self.publish_item(&step.label).await
    }

    async fn finish(&self) -> Result<Option<String>, TaskError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seed(dbs: &TempDir, db: &str, items: &[(&str, &str)]) {
        for (rel, contents) in items {
            let path = dbs.path().join(db).join(rel);
            fs::create_dir_all(path.parent().unwrap()).await.unwrap();
            fs::write(path, contents).await.unwrap();
        }
    }

    fn body(mode: PublishMode, recursive: bool, root_item: Option<&str>) -> PublishBody {
        PublishBody {
            mode,
            language: None,
            targets: None,
            recursive,
            source_db: "master".to_string(),
            target_db: "web".to_string(),
            root_item: root_item.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_recursive_publish_copies_tree() {
        let dbs = TempDir::new().unwrap();
        seed(&dbs, "master", &[("home/a.txt", "a"), ("home/sub/b.txt", "b")]).await;

        let task = PublishTask::from_body(dbs.path(), &body(PublishMode::Full, true, None));
        let plan = task.plan().await.unwrap();
        assert_eq!(plan.steps.len(), 2);

        for (i, step) in plan.steps.iter().enumerate() {
            task.run_step(i, step).await.unwrap();
        }
        assert!(dbs.path().join("web/home/a.txt").exists());
        assert!(dbs.path().join("web/home/sub/b.txt").exists());
    }

    #[tokio::test]
    async fn test_root_item_scopes_the_walk() {
        let dbs = TempDir::new().unwrap();
        seed(
            &dbs,
            "master",
            &[("home/a.txt", "a"), ("settings/c.txt", "c")],
        )
        .await;

        let task =
            PublishTask::from_body(dbs.path(), &body(PublishMode::Full, true, Some("home")));
        let plan = task.plan().await.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].label, "home/a.txt");
    }

    #[tokio::test]
    async fn test_missing_source_db_is_fatal() {
        let dbs = TempDir::new().unwrap();
        let task = PublishTask::from_body(dbs.path(), &body(PublishMode::Full, true, None));
        let err = task.plan().await.unwrap_err();
        assert!(err.message.contains("master"));
    }

    #[tokio::test]
    async fn test_language_filter() {
        let dbs = TempDir::new().unwrap();
        seed(
            &dbs,
            "master",
            &[("home/page.en.txt", "en"), ("home/page.fr.txt", "fr")],
        )
        .await;

        let mut request = body(PublishMode::Full, true, None);
        request.language = Some("en".to_string());
        let task = PublishTask::from_body(dbs.path(), &request);
        let plan = task.plan().await.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.steps[0].label.contains(".en."));
    }

    #[tokio::test]
    async fn test_incremental_skips_up_to_date_items() {
        let dbs = TempDir::new().unwrap();
        seed(&dbs, "master", &[("home/a.txt", "a")]).await;
        // Target copy newer than source
        seed(&dbs, "web", &[("home/a.txt", "already there")]).await;

        let task = PublishTask::from_body(dbs.path(), &body(PublishMode::Incremental, true, None));
        let plan = task.plan().await.unwrap();
        let description = task.run_step(0, &plan.steps[0]).await.unwrap();
        assert!(description.starts_with("Skipped up-to-date"));
    }
}
