//! Scripts: ordered operations run against one connection.

use serde::{Deserialize, Serialize};
use vmfs_proto::Operation;

use crate::error::SequenceError;

/// Contents written by the canonical workload.
pub const TODO_CONTENT: &str = "1. take out trash\n2. laundry\n3. call grandma\n";

/// One script step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Send the operation as given.
    Run(Operation),
    /// Write the bytes returned by the `read` at index `read_step`.
    WriteFromRead { path: String, read_step: usize },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Run(op) => op.name(),
            Self::WriteFromRead { .. } => "write",
        }
    }
}

impl From<Operation> for Step {
    fn from(op: Operation) -> Self {
        Self::Run(op)
    }
}

/// A validated, ordered list of steps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Step>", into = "Vec<Step>")]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// Every `WriteFromRead` must point at an earlier `read` step.
    pub fn new(steps: Vec<Step>) -> Result<Self, SequenceError> {
        for (index, step) in steps.iter().enumerate() {
            if let Step::WriteFromRead { read_step, .. } = step {
                if *read_step >= index {
                    return Err(SequenceError::InvalidScript(format!(
                        "step {index} uses the result of step {read_step}, which has not run yet"
                    )));
                }
                if !matches!(steps[*read_step], Step::Run(Operation::Read { .. })) {
                    return Err(SequenceError::InvalidScript(format!(
                        "step {index} uses step {read_step}, which is not a read"
                    )));
                }
            }
        }
        Ok(Self { steps })
    }

    #[cfg(test)]
    pub(crate) fn unchecked(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn from_json(json: &str) -> Result<Self, SequenceError> {
        serde_json::from_str(json).map_err(|e| SequenceError::InvalidScript(e.to_string()))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The canonical workload: create, write, read, copy, remove.
    pub fn canonical(params: &CanonicalScript) -> Self {
        let file = format!("{}/{}", params.dir, params.file);
        let mut steps = vec![
            Step::Run(Operation::create_dir(&params.dir)),
            Step::Run(Operation::write(&file, params.content.as_bytes())),
            Step::Run(Operation::read(&file)),
        ];
        let read_step = steps.len() - 1;
        if let Some(other) = &params.write_back {
            steps.push(Step::WriteFromRead {
                path: format!("{}/{}", params.dir, other),
                read_step,
            });
        }
        steps.push(Step::Run(Operation::copy(
            &file,
            format!("{}/{}", params.dir, params.copy_name),
        )));
        if let Some(second) = &params.second_dir {
            steps.push(Step::Run(Operation::create_dir(second)));
        }
        steps.push(Step::Run(Operation::remove_dir_all(&params.dir)));
        if let Some(second) = &params.second_dir {
            steps.push(Step::Run(Operation::remove_dir(second)));
        }
        Self { steps }
    }
}

impl TryFrom<Vec<Step>> for Script {
    type Error = SequenceError;

    fn try_from(steps: Vec<Step>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<Script> for Vec<Step> {
    fn from(script: Script) -> Self {
        script.steps
    }
}

/// Parameters of the canonical workload.
#[derive(Clone, Debug)]
pub struct CanonicalScript {
    pub dir: String,
    pub file: String,
    pub content: String,
    pub copy_name: String,
    /// Write the bytes read back into this file as well.
    pub write_back: Option<String>,
    /// Create and later remove a second, empty directory.
    pub second_dir: Option<String>,
}

impl Default for CanonicalScript {
    fn default() -> Self {
        Self {
            dir: "pidir".to_string(),
            file: "todo.txt".to_string(),
            content: TODO_CONTENT.to_string(),
            copy_name: "todo-copy.txt".to_string(),
            write_back: None,
            second_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_canonical_script() {
        let script = Script::canonical(&CanonicalScript::default());
        let names: Vec<_> = script.steps().iter().map(Step::name).collect();
        assert_eq!(names, ["create_dir", "write", "read", "copy", "remove_dir_all"]);
        assert_eq!(
            script.steps()[3],
            Step::Run(Operation::copy("pidir/todo.txt", "pidir/todo-copy.txt"))
        );
    }

    #[test]
    fn test_full_canonical_script() {
        let script = Script::canonical(&CanonicalScript {
            write_back: Some("done.txt".to_string()),
            second_dir: Some("pidir2".to_string()),
            ..CanonicalScript::default()
        });
        let names: Vec<_> = script.steps().iter().map(Step::name).collect();
        assert_eq!(
            names,
            [
                "create_dir",
                "write",
                "read",
                "write",
                "copy",
                "create_dir",
                "remove_dir_all",
                "remove_dir"
            ]
        );
        assert_eq!(
            script.steps()[3],
            Step::WriteFromRead {
                path: "pidir/done.txt".to_string(),
                read_step: 2
            }
        );
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let err = Script::new(vec![
            Step::WriteFromRead {
                path: "a".to_string(),
                read_step: 1,
            },
            Step::Run(Operation::read("b")),
        ])
        .unwrap_err();
        assert!(matches!(err, SequenceError::InvalidScript(_)));
    }

    #[test]
    fn test_reference_to_non_read_is_rejected() {
        let err = Script::new(vec![
            Step::Run(Operation::create_dir("d")),
            Step::WriteFromRead {
                path: "d/f".to_string(),
                read_step: 0,
            },
        ])
        .unwrap_err();
        assert!(err.to_string().contains("not a read"));
    }

    #[test]
    fn test_json_script() {
        let json = r#"[
            {"run": {"op": "create_dir", "path": "d"}},
            {"run": {"op": "write", "path": "d/f", "content": "hello"}},
            {"run": {"op": "read", "path": "d/f"}},
            {"write_from_read": {"path": "d/g", "read_step": 2}},
            {"run": {"op": "remove_dir_all", "path": "d"}}
        ]"#;
        let script = Script::from_json(json).unwrap();
        assert_eq!(script.len(), 5);
        assert_eq!(script.steps()[1], Step::Run(Operation::write("d/f", "hello")));

        let bad = r#"[{"write_from_read": {"path": "x", "read_step": 0}}]"#;
        assert!(Script::from_json(bad).is_err());
    }
}
