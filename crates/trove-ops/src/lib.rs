//! Resolution and mutation engine for trove.
//!
//! This crate turns locations into live entries and implements copy, move and
//! folder creation on top of the repository contract, with progress reported
//! proportionally over nested folders.

mod conflict;
mod copy;
mod create;
mod executor;
mod move_op;
mod operation;
mod progress;
mod resolver;

pub use conflict::{COLLISION_SEPARATOR, Placement, collision_free_name};
pub use copy::{CopyOptions, copy_entry, copy_to};
pub use create::{create_folders, create_folders_recursively};
pub use executor::OperationExecutor;
pub use move_op::{MoveOptions, move_entry, move_to};
pub use operation::{OperationError, RepositoryOperation};
pub use progress::{
    ChannelProgress, NullProgress, OperationComplete, OperationProgress, OperationType,
    PROGRESS_TOTAL, ProgressInterval, ProgressListener,
};
pub use resolver::{
    Resolution, locate, locate_data, locate_folder, require_data, require_entry, require_folder,
    resolve,
};
