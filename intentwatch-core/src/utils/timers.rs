//! Helpers for optional branches inside `tokio::select!` loops.

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};

/// Sleep until `deadline`, or forever when no deadline is armed.
pub async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Tick `interval`, or wait forever when it is stopped.
pub async fn tick_opt(interval: &mut Option<Interval>) -> Instant {
    match interval {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

/// Receive from `rx`, or wait forever when there is no receiver.
pub async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_branches_never_fire() {
        let mut interval = None;
        let mut rx: Option<mpsc::Receiver<()>> = None;
        let deadline = Instant::now() + Duration::from_secs(5);

        tokio::select! {
            _ = sleep_until_opt(None) => panic!("disarmed sleep fired"),
            _ = tick_opt(&mut interval) => panic!("stopped interval ticked"),
            _ = recv_opt(&mut rx) => panic!("missing receiver yielded"),
            _ = sleep_until_opt(Some(deadline)) => {}
        }
        assert!(Instant::now() >= deadline);
    }
}
