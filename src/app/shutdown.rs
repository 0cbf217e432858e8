//! Interrupt handling.

use tokio::task::JoinHandle;

use crate::scope::CancelScope;

/// Cancels `scope` on the first Ctrl-C.
///
/// The returned task also exits once the scope ends for another reason; abort
/// it when the run finishes first.
pub fn cancel_on_interrupt(scope: &CancelScope) -> JoinHandle<()> {
    let scope = scope.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = scope.done() => {}
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    log::warn!("Interrupt received, cancelling in-flight fetches");
                    scope.cancel();
                }
                Err(e) => log::warn!("Failed to listen for Ctrl-C: {e}"),
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_exits_when_scope_ends() {
        let scope = CancelScope::new();
        let handle = cancel_on_interrupt(&scope);
        scope.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener exits")
            .expect("listener does not panic");
    }
}
