//! Role-scoped execution
//!
//! A Snowflake session has exactly one active role. Managers that need a
//! different role borrow it for the duration of an operation and hand the
//! session back in the role they found it in.
//!
//! Restoration is explicit: [`run_as`] always issues `use role <previous>`
//! after the operation, whether it succeeded or not, and a failing restore is
//! reported instead of being hidden behind the operation's own error. If the
//! operation panics, the guard's `Drop` makes a best-effort restore.

use super::executor::SqlExecutor;
use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, warn};

/// Query the session's active role
pub fn current_role(executor: &dyn SqlExecutor) -> Result<String> {
    let result = executor.execute("select current_role()")?;
    result
        .first_value()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("select current_role() returned no role"))
}

/// Switch the active warehouse of the session
pub fn use_warehouse(executor: &dyn SqlExecutor, warehouse: &str) -> Result<()> {
    executor.execute(&format!("use warehouse {}", warehouse))?;
    Ok(())
}

/// Handle for a borrowed role
///
/// Created by [`RoleGuard::acquire`], released by [`RoleGuard::restore`].
/// Dropping an unreleased guard (only possible while unwinding) restores the
/// previous role on a best-effort basis.
pub struct RoleGuard<'a> {
    executor: &'a dyn SqlExecutor,
    previous: String,
    released: bool,
}

impl<'a> RoleGuard<'a> {
    /// Record the active role, then switch to `role`
    pub fn acquire(executor: &'a dyn SqlExecutor, role: &str) -> Result<Self> {
        let previous = current_role(executor)?;
        debug!("switching role {} -> {}", previous, role);
        executor
            .execute(&format!("use role {}", role))
            .with_context(|| format!("Failed to switch to role {}", role))?;
        Ok(Self {
            executor,
            previous,
            released: false,
        })
    }

    /// Role that was active before the guard was acquired
    pub fn previous_role(&self) -> &str {
        &self.previous
    }

    /// Switch back to the previous role. Runs at most once per guard.
    pub fn restore(mut self) -> Result<()> {
        self.released = true;
        self.switch_back()
    }

    fn switch_back(&self) -> Result<()> {
        debug!("restoring role {}", self.previous);
        self.executor
            .execute(&format!("use role {}", self.previous))
            .with_context(|| format!("Failed to restore role {}", self.previous))?;
        Ok(())
    }
}

impl Drop for RoleGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.switch_back() {
            error!("{:#}", e);
        }
    }
}

/// Run `operation` with `role` as the active role.
///
/// The previous role is restored exactly once on every exit path. When the
/// restore itself fails, that failure is returned, even if `operation` failed
/// too (its error is logged and attached as context).
pub fn run_as<T, F>(executor: &dyn SqlExecutor, role: &str, operation: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let guard = RoleGuard::acquire(executor, role)?;
    let outcome = operation();
    match guard.restore() {
        Ok(()) => outcome,
        Err(restore_err) => match outcome {
            Ok(_) => Err(restore_err),
            Err(op_err) => {
                warn!("operation under role {} failed: {:#}", role, op_err);
                Err(restore_err.context(format!(
                    "role was not restored after a failed operation: {:#}",
                    op_err
                )))
            }
        },
    }
}
