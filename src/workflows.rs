//! Workflow definitions on disk and the exclusion list

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use action_flow::{Step, WorkflowDefinition};
use optout_core_types::TargetId;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::ConfigurationError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkflowFile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    steps: Vec<Step>,
}

/// Parses one workflow document. The id defaults to the file stem and the
/// name to the id.
pub fn parse_workflow(
    path: &Path,
    contents: &str,
) -> Result<WorkflowDefinition, ConfigurationError> {
    let malformed = |reason: String| ConfigurationError::WorkflowSource {
        path: path.to_path_buf(),
        reason,
    };

    let file: WorkflowFile =
        serde_yaml::from_str(contents).map_err(|err| malformed(err.to_string()))?;
    let id = match file.id {
        Some(id) => id.trim().to_string(),
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string(),
    };
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(malformed(format!("invalid workflow id `{id}`")));
    }

    let mut workflow = WorkflowDefinition::new(id, file.steps);
    if let Some(name) = file.name.filter(|name| !name.trim().is_empty()) {
        workflow = workflow.with_name(name);
    }
    Ok(workflow)
}

/// Loads every `*.yaml`/`*.yml` file in `dir`, in file-name order.
///
/// A malformed file aborts the load unless `skip_malformed` is set, in which
/// case it is logged and left out. Duplicate ids always abort.
pub fn load_workflows(
    dir: &Path,
    skip_malformed: bool,
) -> Result<Vec<WorkflowDefinition>, ConfigurationError> {
    let io_error = |path: &Path, source| ConfigurationError::WorkflowIo {
        path: path.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|source| io_error(dir, source))? {
        let path = entry.map_err(|source| io_error(dir, source))?.path();
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut workflows = Vec::with_capacity(paths.len());
    let mut seen: HashMap<TargetId, PathBuf> = HashMap::new();
    for path in paths {
        let contents = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        let workflow = match parse_workflow(&path, &contents) {
            Ok(workflow) => workflow,
            Err(err) if skip_malformed => {
                warn!(error = %err, "skipping malformed workflow");
                continue;
            }
            Err(err) => return Err(err),
        };
        if let Some(first) = seen.get(&workflow.id) {
            return Err(ConfigurationError::DuplicateWorkflow {
                id: workflow.id.to_string(),
                first: first.clone(),
                second: path,
            });
        }
        debug!(
            target_id = %workflow.id,
            steps = workflow.steps.len(),
            path = %path.display(),
            "workflow loaded"
        );
        seen.insert(workflow.id.clone(), path);
        workflows.push(workflow);
    }

    info!(dir = %dir.display(), count = workflows.len(), "workflows loaded");
    Ok(workflows)
}

/// Keeps only the targets named in `only`, in workflow order. An empty
/// filter keeps everything.
pub fn select_targets(
    workflows: Vec<WorkflowDefinition>,
    only: &[String],
) -> Result<Vec<WorkflowDefinition>, ConfigurationError> {
    if only.is_empty() {
        return Ok(workflows);
    }
    let wanted: BTreeSet<&str> = only.iter().map(|id| id.trim()).collect();
    for id in &wanted {
        if !workflows.iter().any(|workflow| workflow.id.as_str() == *id) {
            return Err(ConfigurationError::UnknownTarget(id.to_string()));
        }
    }
    Ok(workflows
        .into_iter()
        .filter(|workflow| wanted.contains(workflow.id.as_str()))
        .collect())
}

/// One target id per line; blank lines and `#` comments are ignored.
pub fn parse_exclusions(contents: &str) -> BTreeSet<TargetId> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(TargetId::from)
        .collect()
}

/// A missing file is an empty list.
pub fn load_exclusions(path: &Path) -> Result<BTreeSet<TargetId>, ConfigurationError> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let excluded = parse_exclusions(&contents);
            info!(path = %path.display(), count = excluded.len(), "exclusion list loaded");
            Ok(excluded)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no exclusion list");
            Ok(BTreeSet::new())
        }
        Err(source) => Err(ConfigurationError::Exclusions {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::Action;
    use tempfile::tempdir;

    const ACME: &str = r##"
name: Acme People Search
steps:
  - action: navigate
    url: https://acme.example/optout
  - action: fill
    selector: "#email"
    field: email
  - action: teleport
    where: moon
"##;

    #[test]
    fn id_defaults_to_file_stem() {
        let workflow = parse_workflow(Path::new("flows/acme.yaml"), ACME).unwrap();
        assert_eq!(workflow.id.as_str(), "acme");
        assert_eq!(workflow.name, "Acme People Search");
        assert_eq!(workflow.steps.len(), 3);
        assert_eq!(
            workflow.steps[2],
            Step::Unknown {
                action: "teleport".into()
            }
        );
    }

    #[test]
    fn explicit_id_wins() {
        let workflow = parse_workflow(
            Path::new("x.yaml"),
            "id: beta\nsteps:\n  - action: click\n    selector: '#go'\n",
        )
        .unwrap();
        assert_eq!(workflow.id.as_str(), "beta");
        assert_eq!(workflow.name, "beta");
        assert_eq!(
            workflow.steps,
            vec![Step::Action(Action::Click {
                selector: "#go".into()
            })]
        );
    }

    #[test]
    fn broken_step_is_malformed() {
        let err = parse_workflow(
            Path::new("bad.yaml"),
            "steps:\n  - action: wait\n    seconds: soon\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::WorkflowSource { .. }));
    }

    #[test]
    fn loads_in_file_name_order_and_ignores_other_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.yml"), "steps: []\n").unwrap();
        fs::write(dir.path().join("a.yaml"), "steps: []\n").unwrap();
        fs::write(dir.path().join("exclusions.txt"), "a\n").unwrap();

        let workflows = load_workflows(dir.path(), false).unwrap();
        let ids: Vec<_> = workflows.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn malformed_file_aborts_unless_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.yaml"), "steps: []\n").unwrap();
        fs::write(dir.path().join("broken.yaml"), "steps: {{\n").unwrap();

        let err = load_workflows(dir.path(), false).unwrap_err();
        assert!(matches!(err, ConfigurationError::WorkflowSource { .. }));

        let workflows = load_workflows(dir.path(), true).unwrap();
        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0].id.as_str(), "good");
    }

    #[test]
    fn duplicate_ids_abort() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "steps: []\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "id: a\nsteps: []\n").unwrap();
        let err = load_workflows(dir.path(), true).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateWorkflow { .. }));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_workflows(&dir.path().join("nope"), false).unwrap_err();
        assert!(matches!(err, ConfigurationError::WorkflowIo { .. }));
    }

    #[test]
    fn select_targets_filters_and_validates() {
        let workflows = vec![
            WorkflowDefinition::new("a", Vec::new()),
            WorkflowDefinition::new("b", Vec::new()),
        ];
        let picked = select_targets(workflows.clone(), &["b".to_string()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id.as_str(), "b");

        let err = select_targets(workflows, &["zzz".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownTarget(_)));
    }

    #[test]
    fn exclusions_ignore_comments_and_blanks() {
        let excluded = parse_exclusions("# header\nacme\n\n  beta  # flaky\n");
        let ids: Vec<_> = excluded.iter().map(TargetId::as_str).collect();
        assert_eq!(ids, vec!["acme", "beta"]);
    }

    #[test]
    fn missing_exclusion_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(load_exclusions(&dir.path().join("none.txt"))
            .unwrap()
            .is_empty());
    }
}
