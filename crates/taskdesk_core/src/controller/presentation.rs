//! Presentation surface contract.
//!
//! The controller talks to the UI only through this trait; no UI object is
//! globally reachable from core.

use crate::controller::TaskFilterKind;
use crate::model::task::Task;
use crate::repo::task_repo::TaskStatistics;

/// Display calls the controller makes on the active UI.
///
/// Implementations must not call back into the controller synchronously.
pub trait PresentationSurface {
    /// Replaces the visible task list.
    fn display_tasks(&self, tasks: &[Task], filter: &TaskFilterKind);
    fn display_stats(&self, stats: &TaskStatistics);
    /// Incremental hint that precedes the full list refresh.
    fn add_task(&self, task: &Task);
    fn update_task(&self, task: &Task);
    fn remove_task(&self, task_id: &str);
    fn show_error(&self, message: &str);
    fn show_success(&self, message: &str);
    fn show_info(&self, message: &str);
}
