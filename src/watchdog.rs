/// Deadline enforcement for worker processes.
///
/// Runs alongside the worker as its own tokio task, polling liveness at a fixed
/// interval. If the worker is still running at the deadline, the watchdog sends
/// SIGTERM to its process group, waits out a grace period, then sends SIGKILL.
/// It never reaps the process or touches its pipes; the caller does both.
use crate::config::WatchdogConfig;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How a watchdog retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// The process exited before the deadline. No signal was sent.
    Disarmed,
    /// SIGTERM was sent `after` arming and the process exited within the grace period.
    Terminated { after: Duration },
    /// SIGTERM was ignored; SIGKILL followed.
    Killed {
        terminated_after: Duration,
        killed_after: Duration,
    },
}

impl WatchdogOutcome {
    /// True if the watchdog sent any signal.
    pub fn escalated(&self) -> bool {
        !matches!(self, WatchdogOutcome::Disarmed)
    }
}

/// Held by whoever reaps the process. Dropping it tells the watchdog the
/// process is gone, so it never signals a recycled pid.
pub type ExitNotice = oneshot::Sender<()>;

pub struct Watchdog {
    pid: Pid,
    timeout: Duration,
    poll_interval: Duration,
    grace_period: Duration,
}

impl Watchdog {
    pub fn new(pid: u32, timeout: Duration, config: &WatchdogConfig) -> Self {
        Self {
            pid: Pid::from_raw(pid as i32),
            timeout,
            poll_interval: config.poll_interval(),
            grace_period: config.grace_period(),
        }
    }

    /// Start monitoring on the current runtime.
    ///
    /// Drop the returned [`ExitNotice`] once the process has been reaped; the
    /// task then retires within one poll interval.
    pub fn arm(self) -> (ExitNotice, JoinHandle<WatchdogOutcome>) {
        let (notice, exited) = oneshot::channel();
        let handle = tokio::spawn(self.monitor(exited));
        (notice, handle)
    }

    pub async fn monitor(self, mut exited: oneshot::Receiver<()>) -> WatchdogOutcome {
        let armed_at = Instant::now();
        tracing::debug!(
            pid = self.pid.as_raw(),
            timeout_ms = self.timeout.as_millis() as u64,
            "watchdog armed"
        );

        // A deadline past the end of representable time never expires.
        if self
            .exits_before(&mut exited, armed_at.checked_add(self.timeout))
            .await
        {
            tracing::debug!(pid = self.pid.as_raw(), "process exited, watchdog disarmed");
            return WatchdogOutcome::Disarmed;
        }

        let terminated_after = armed_at.elapsed();
        tracing::warn!(
            pid = self.pid.as_raw(),
            elapsed_ms = terminated_after.as_millis() as u64,
            "deadline exceeded, sending SIGTERM"
        );
        self.signal(Signal::SIGTERM);

        if self
            .exits_before(&mut exited, Instant::now().checked_add(self.grace_period))
            .await
        {
            return WatchdogOutcome::Terminated {
                after: terminated_after,
            };
        }

        let killed_after = armed_at.elapsed();
        tracing::warn!(
            pid = self.pid.as_raw(),
            grace_ms = self.grace_period.as_millis() as u64,
            "process survived SIGTERM, sending SIGKILL"
        );
        self.signal(Signal::SIGKILL);

        WatchdogOutcome::Killed {
            terminated_after,
            killed_after,
        }
    }

    /// Poll until the process is gone (true) or `until` passes (false).
    /// `None` polls until the process is gone.
    async fn exits_before(
        &self,
        exited: &mut oneshot::Receiver<()>,
        until: Option<Instant>,
    ) -> bool {
        loop {
            if !self.is_running(exited) {
                return true;
            }
            let pause = match until {
                Some(until) => {
                    let now = Instant::now();
                    if now >= until {
                        return false;
                    }
                    self.poll_interval.min(until - now)
                }
                None => self.poll_interval,
            };
            tokio::time::sleep(pause).await;
        }
    }

    fn is_running(&self, exited: &mut oneshot::Receiver<()>) -> bool {
        match exited.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Closed) => return false,
        }
        // Any live group member counts: a reaped leader can leave children
        // holding the worker's pipes open.
        let liveness = match killpg(self.pid, None) {
            Err(Errno::ESRCH) => kill(self.pid, None),
            other => other,
        };
        matches!(liveness, Ok(()) | Err(Errno::EPERM))
    }

    /// Signal the process group, falling back to the process alone when it
    /// does not lead a group. Failures are logged, never raised.
    fn signal(&self, signal: Signal) {
        let result = match killpg(self.pid, signal) {
            Err(Errno::ESRCH) => kill(self.pid, signal),
            other => other,
        };
        if let Err(e) = result {
            tracing::warn!(
                pid = self.pid.as_raw(),
                signal = %signal,
                error = %e,
                "failed to signal worker process"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Stdio;
    use tokio::process::Command;

    fn fast_config() -> WatchdogConfig {
        WatchdogConfig {
            poll_interval_ms: 50,
            grace_period_ms: 300,
        }
    }

    fn spawn_sh(script: &str) -> tokio::process::Child {
        Command::new("sh")
            .args(["-c", script])
            .stdout(Stdio::null())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[test]
    fn test_outcome_escalated() {
        assert!(!WatchdogOutcome::Disarmed.escalated());
        assert!(WatchdogOutcome::Terminated {
            after: Duration::from_secs(1)
        }
        .escalated());
        assert!(WatchdogOutcome::Killed {
            terminated_after: Duration::from_secs(1),
            killed_after: Duration::from_secs(2),
        }
        .escalated());
    }

    #[tokio::test]
    async fn test_disarmed_when_process_exits_before_deadline() {
        let mut child = spawn_sh("sleep 0.3");
        let pid = child.id().unwrap();
        let (notice, handle) = Watchdog::new(pid, Duration::from_millis(600), &fast_config()).arm();

        let status = child.wait().await.unwrap();
        let reaped_at = std::time::Instant::now();
        drop(notice);
        let outcome = handle.await.unwrap();

        assert!(status.success());
        assert_eq!(outcome, WatchdogOutcome::Disarmed);
        // Retires within about one poll interval of the exit.
        assert!(reaped_at.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_sigterm_at_deadline() {
        let mut child = spawn_sh("sleep 30");
        let pid = child.id().unwrap();
        let timeout = Duration::from_millis(300);
        let (notice, handle) = Watchdog::new(pid, timeout, &fast_config()).arm();

        let status = child.wait().await.unwrap();
        drop(notice);
        let outcome = handle.await.unwrap();

        match outcome {
            WatchdogOutcome::Terminated { after } => {
                assert!(after >= timeout, "signalled early: {after:?}");
                assert!(after < Duration::from_secs(5));
            }
            other => panic!("expected Terminated, got {other:?}"),
        }
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_sigkill_when_sigterm_ignored() {
        let mut child = spawn_sh("trap '' TERM; sleep 30");
        let pid = child.id().unwrap();
        let timeout = Duration::from_millis(300);
        let config = fast_config();
        let (notice, handle) = Watchdog::new(pid, timeout, &config).arm();

        let status = child.wait().await.unwrap();
        drop(notice);
        let outcome = handle.await.unwrap();

        match outcome {
            WatchdogOutcome::Killed {
                terminated_after,
                killed_after,
            } => {
                assert!(terminated_after >= timeout);
                assert!(killed_after >= terminated_after + config.grace_period());
                assert!(killed_after < Duration::from_secs(5));
            }
            other => panic!("expected Killed, got {other:?}"),
        }
        assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
        assert_eq!(kill(Pid::from_raw(pid as i32), None), Err(Errno::ESRCH));
    }

    #[tokio::test]
    async fn test_guards_group_after_leader_is_reaped() {
        // The leader exits at once; its backgrounded child stays in the group.
        let mut child = spawn_sh("sleep 30 &\nexit 0");
        let pid = child.id().unwrap();
        let timeout = Duration::from_millis(300);
        let (notice, handle) = Watchdog::new(pid, timeout, &fast_config()).arm();

        assert!(child.wait().await.unwrap().success());
        let outcome = handle.await.unwrap();
        drop(notice);

        assert!(outcome.escalated(), "group member left running: {outcome:?}");
    }

    #[tokio::test]
    async fn test_huge_timeout_does_not_overflow() {
        let mut child = spawn_sh("sleep 0.2");
        let pid = child.id().unwrap();
        let (notice, handle) = Watchdog::new(pid, Duration::MAX, &fast_config()).arm();

        assert!(child.wait().await.unwrap().success());
        drop(notice);
        assert_eq!(handle.await.unwrap(), WatchdogOutcome::Disarmed);
    }

    #[tokio::test]
    async fn test_exit_notice_alone_disarms() {
        // A live pid whose exit notice is already dropped is treated as gone.
        let mut child = spawn_sh("sleep 30");
        let pid = child.id().unwrap();
        let (notice, handle) = Watchdog::new(pid, Duration::from_millis(200), &fast_config()).arm();
        drop(notice);

        assert_eq!(handle.await.unwrap(), WatchdogOutcome::Disarmed);
        assert!(child.try_wait().unwrap().is_none(), "watchdog must not signal");
        child.kill().await.unwrap();
    }
}
