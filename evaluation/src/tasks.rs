use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{EvalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    ClinicalTrial,
    CodeRetrieval,
    LegalQa,
    PaperRetrieval,
    SetOperationEntityRetrieval,
    StackExchange,
    TheoremRetrieval,
    TipOfTheTongue,
}

impl Task {
    /// Declaration order, which is also the order used for prefix inference.
    pub const ALL: [Task; 8] = [
        Task::ClinicalTrial,
        Task::CodeRetrieval,
        Task::LegalQa,
        Task::PaperRetrieval,
        Task::SetOperationEntityRetrieval,
        Task::StackExchange,
        Task::TheoremRetrieval,
        Task::TipOfTheTongue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::ClinicalTrial => "clinical_trial",
            Task::CodeRetrieval => "code_retrieval",
            Task::LegalQa => "legal_qa",
            Task::PaperRetrieval => "paper_retrieval",
            Task::SetOperationEntityRetrieval => "set_operation_entity_retrieval",
            Task::StackExchange => "stack_exchange",
            Task::TheoremRetrieval => "theorem_retrieval",
            Task::TipOfTheTongue => "tip_of_the_tongue",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        Task::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| EvalError::UnknownTask(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskCapabilities {
    /// A full-document collection exists alongside the passage collection.
    pub full_documents: bool,
    pub binary_qrels: bool,
    /// Passage runs are scored with MaxP against full-document qrels by default.
    pub max_p: bool,
}

/// Read-only table of the known tasks and what each of them supports.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: Vec<(Task, TaskCapabilities)>,
}

impl TaskRegistry {
    pub fn new(tasks: Vec<(Task, TaskCapabilities)>) -> Self {
        Self { tasks }
    }

    /// The CRUMB benchmark tasks.
    pub fn crumb() -> Self {
        let capabilities = |full_documents, binary_qrels, max_p| TaskCapabilities {
            full_documents,
            binary_qrels,
            max_p,
        };

        Self::new(vec![
            (Task::ClinicalTrial, capabilities(true, false, true)),
            (Task::CodeRetrieval, capabilities(false, false, false)),
            (Task::LegalQa, capabilities(true, false, false)),
            (Task::PaperRetrieval, capabilities(false, true, false)),
            (
                Task::SetOperationEntityRetrieval,
                capabilities(true, false, true),
            ),
            (Task::StackExchange, capabilities(true, false, false)),
            (Task::TheoremRetrieval, capabilities(false, false, false)),
            (Task::TipOfTheTongue, capabilities(true, false, true)),
        ])
    }

    pub fn tasks(&self) -> impl Iterator<Item = Task> + '_ {
        self.tasks.iter().map(|(task, _)| *task)
    }

    pub fn capabilities(&self, task: Task) -> TaskCapabilities {
        self.tasks
            .iter()
            .find(|(known, _)| *known == task)
            .map(|(_, capabilities)| *capabilities)
            .unwrap_or_default()
    }

    pub fn supports_full_documents(&self, task: Task) -> bool {
        self.capabilities(task).full_documents
    }

    pub fn has_binary_qrels(&self, task: Task) -> bool {
        self.capabilities(task).binary_qrels
    }

    pub fn uses_max_p(&self, task: Task) -> bool {
        self.capabilities(task).max_p
    }

    pub fn max_p_tasks(&self) -> Vec<Task> {
        self.tasks()
            .filter(|task| self.uses_max_p(*task))
            .collect()
    }

    pub fn parse_task(&self, name: &str) -> Result<Task> {
        let task: Task = name.parse()?;
        if !self.tasks().any(|known| known == task) {
            return Err(EvalError::UnknownTask(name.to_string()));
        }
        Ok(task)
    }

    /// Returns the explicit task if given, otherwise the first task whose name
    /// prefixes the run file's base name.
    pub fn determine_task(&self, run_path: &Path, task_name: Option<&str>) -> Result<Task> {
        if let Some(name) = task_name {
            return self.parse_task(name);
        }

        let file_name = run_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        self.tasks()
            .find(|task| file_name.starts_with(task.as_str()))
            .ok_or_else(|| EvalError::TaskNotInferred(run_path.display().to_string()))
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::crumb()
    }
}
