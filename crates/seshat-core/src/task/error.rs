//! Error types for task operations.
//!
//! These cover refused operations only. A submitted grid that fails its
//! checks is not an error: the findings come back as an
//! [`ErrorSummary`](crate::error_log::ErrorSummary).

use seshat_state::TaskId;

use crate::user::{Role, UserId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("task {task_id} is locked")]
    Locked { task_id: TaskId },

    #[error("user {user} is not assigned to task {task_id}")]
    NotAssigned { task_id: TaskId, user: UserId },

    #[error("the {role} annotator cannot upload a file at step \"{step}\"")]
    UploadNotAllowed { role: Role, step: &'static str },

    #[error("task {task_id} is already done")]
    Finished { task_id: TaskId },

    #[error("gamma cannot be computed at step \"{step}\"")]
    GammaNotReady { step: &'static str },

    #[error("gamma could not be computed for any tier of {data_file}")]
    GammaUnavailable { data_file: String },

    #[error("cannot submit an empty comment")]
    EmptyComment,
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;
