pub mod use_cases;

pub use use_cases::{
    TaskRevocationService, TaskStatusService, TaskSubmissionService, EXECUTION_DEFER_SECONDS,
    KW_ARGS_MAX_LEN,
};
