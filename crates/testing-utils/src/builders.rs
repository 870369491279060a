//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::Utc;
use scantask_domain::entities::{TaskMain, TaskRun, TaskRunState};

/// Builder for creating test TaskMain entities
pub struct TaskMainBuilder {
    task_main: TaskMain,
}

impl TaskMainBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            task_main: TaskMain {
                id: 1,
                task_id: "main-1".to_string(),
                task_name: "portscan".to_string(),
                kw_args: "{}".to_string(),
                state: "CREATED".to_string(),
                workspace_id: 1,
                is_delete: false,
                create_datetime: now,
                update_datetime: now,
            },
        }
    }

    pub fn with_task_id(mut self, task_id: &str) -> Self {
        self.task_main.task_id = task_id.to_string();
        self
    }

    pub fn with_task_name(mut self, task_name: &str) -> Self {
        self.task_main.task_name = task_name.to_string();
        self
    }

    pub fn with_workspace_id(mut self, workspace_id: i64) -> Self {
        self.task_main.workspace_id = workspace_id;
        self
    }

    pub fn build(self) -> TaskMain {
        self.task_main
    }
}

impl Default for TaskMainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test TaskRun entities
pub struct TaskRunBuilder {
    task_run: TaskRun,
}

impl TaskRunBuilder {
    pub fn new() -> Self {
        Self {
            task_run: TaskRun::new(
                "run-1".to_string(),
                "portscan".to_string(),
                "{}".to_string(),
                "main-1".to_string(),
                None,
                1,
            ),
        }
    }

    pub fn with_task_id(mut self, task_id: &str) -> Self {
        self.task_run.task_id = task_id.to_string();
        self
    }

    pub fn with_task_name(mut self, task_name: &str) -> Self {
        self.task_run.task_name = task_name.to_string();
        self
    }

    pub fn with_kw_args(mut self, kw_args: &str) -> Self {
        self.task_run.kw_args = kw_args.to_string();
        self
    }

    pub fn with_state(mut self, state: TaskRunState) -> Self {
        self.task_run.state = state;
        self
    }

    pub fn with_main_task_id(mut self, main_task_id: &str) -> Self {
        self.task_run.main_task_id = main_task_id.to_string();
        self
    }

    pub fn with_workspace_id(mut self, workspace_id: i64) -> Self {
        self.task_run.workspace_id = workspace_id;
        self
    }

    pub fn build(self) -> TaskRun {
        self.task_run
    }
}

impl Default for TaskRunBuilder {
    fn default() -> Self {
        Self::new()
    }
}
