pub mod task_revocation_service;
pub mod task_status_service;
pub mod task_submission_service;

pub use task_revocation_service::TaskRevocationService;
pub use task_status_service::TaskStatusService;
pub use task_submission_service::{
    TaskSubmissionService, EXECUTION_DEFER_SECONDS, KW_ARGS_MAX_LEN,
};
