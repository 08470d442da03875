//! Reload/restart hook execution

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use pkg_controllers::Action;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("'{cmd}' timed out after {secs}s")]
    Timeout { cmd: String, secs: u64 },

    #[error("'{cmd}' exited with code {code}: {stderr}")]
    Failed {
        code: i32,
        cmd: String,
        stderr: String,
    },

    #[error("could not run hook: {0}")]
    Io(#[from] std::io::Error),
}

pub struct HookExecutor {
    on_reload: Vec<String>,
    on_restart: Vec<String>,
    timeout_secs: u64,
}

impl HookExecutor {
    pub fn new(on_reload: Vec<String>, on_restart: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            on_reload,
            on_restart,
            timeout_secs,
        }
    }

    /// Run the hooks for `action`. Returns how many of them failed.
    pub async fn run(&self, action: Action, change_count: usize) -> usize {
        let hooks = match action {
            Action::None => return 0,
            Action::Reload => &self.on_reload,
            Action::Restart => &self.on_restart,
        };
        if hooks.is_empty() {
            warn!("Load balancer needs a {} but no hooks are configured for it", action);
            return 0;
        }
        let mut failed = 0;
        for cmd in hooks {
            if let Err(e) = self.run_hook(cmd, action, change_count).await {
                warn!("{} hook failed, continuing: {}", action, e);
                failed += 1;
            }
        }
        failed
    }

    async fn run_hook(
        &self,
        cmd: &str,
        action: Action,
        change_count: usize,
    ) -> Result<(), HookError> {
        debug!("{} hook: {}", action, cmd);
        let mut child = Command::new("sh")
            .args(["-c", cmd])
            .env("LBSYNC_ACTION", action.to_string())
            .env("LBSYNC_CHANGE_COUNT", change_count.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let limit = Duration::from_secs(self.timeout_secs);
        let Ok(waited) = timeout(limit, child.wait()).await else {
            if let Err(e) = child.kill().await {
                warn!("Could not kill timed-out hook '{}': {}", cmd, e);
            }
            return Err(HookError::Timeout {
                cmd: cmd.to_string(),
                secs: self.timeout_secs,
            });
        };
        let status = waited?;
        if status.success() {
            info!("{} hook done: {}", action, cmd);
            return Ok(());
        }

        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            pipe.read_to_string(&mut stderr).await?;
        }
        Err(HookError::Failed {
            code: status.code().unwrap_or(-1),
            cmd: cmd.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

impl Default for HookExecutor {
    fn default() -> Self {
        Self::new(vec![], vec![], 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reload_hook_runs() {
        let executor = HookExecutor::new(vec!["true".to_string()], vec!["false".to_string()], 5);
        assert_eq!(executor.run(Action::Reload, 3).await, 0);
    }

    #[tokio::test]
    async fn test_restart_uses_restart_hooks() {
        let executor = HookExecutor::new(vec!["true".to_string()], vec!["false".to_string()], 5);
        assert_eq!(executor.run(Action::Restart, 1).await, 1);
    }

    #[tokio::test]
    async fn test_hook_env_vars() {
        let executor = HookExecutor::new(
            vec![
                "test \"$LBSYNC_ACTION\" = reload && test \"$LBSYNC_CHANGE_COUNT\" = 2".to_string(),
            ],
            vec![],
            5,
        );
        assert_eq!(executor.run(Action::Reload, 2).await, 0);
    }

    #[tokio::test]
    async fn test_failed_hook_reports_stderr() {
        let executor = HookExecutor::new(vec![], vec![], 5);
        let err = executor
            .run_hook("echo boom >&2; exit 3", Action::Reload, 1)
            .await
            .unwrap_err();
        match err {
            HookError::Failed { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_hook_timeout() {
        let executor = HookExecutor::new(vec!["sleep 10".to_string()], vec![], 1);
        assert_eq!(executor.run(Action::Reload, 1).await, 1);
    }

    #[tokio::test]
    async fn test_no_action_runs_nothing() {
        let executor = HookExecutor::new(vec!["false".to_string()], vec!["false".to_string()], 5);
        assert_eq!(executor.run(Action::None, 0).await, 0);
        assert_eq!(HookExecutor::default().run(Action::Restart, 1).await, 0);
    }
}
