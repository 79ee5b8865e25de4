/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Periodic evaluation loop and shutdown signals

use log::{info, warn};
use std::future::{pending, Future};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Call `cycle` every `period` until `shutdown` completes
///
/// `shutdown` is created once and kept across cycles, so a signal delivered
/// while a cycle is running stops the loop as soon as that cycle returns.
/// Returns the number of cycles run.
pub async fn run_periodic<S, F, Fut>(period: Duration, shutdown: S, mut cycle: F) -> u64
where
    S: Future<Output = ()>,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycles = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutting down after {cycles} cycles");
                return cycles;
            }
            _ = ticker.tick() => {
                cycle().await;
                cycles += 1;
            }
        }
    }
}

/// Completes on SIGINT (Ctrl-C) or SIGTERM
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {e}");
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
                pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_shutdown_during_cycle_stops_loop() {
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let started = Arc::new(AtomicU64::new(0));

        let shutdown = async {
            let _ = rx.await;
        };
        let cycles = {
            let started = started.clone();
            run_periodic(Duration::from_millis(10), shutdown, move || {
                let tx = tx.clone();
                let started = started.clone();
                async move {
                    if started.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                        if let Some(tx) = tx.lock().unwrap().take() {
                            let _ = tx.send(());
                        }
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                }
            })
            .await
        };

        assert_eq!(cycles, 2);
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_immediate_shutdown_runs_no_cycle() {
        let cycles = run_periodic(Duration::from_millis(10), async {}, || async {
            panic!("cycle must not run");
        })
        .await;
        assert_eq!(cycles, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_during_cycle_stops_loop() {
        let pid = std::process::id().to_string();
        let started = Arc::new(AtomicU64::new(0));

        let cycles = {
            let started = started.clone();
            run_periodic(Duration::from_millis(10), shutdown_signal(), move || {
                let pid = pid.clone();
                let started = started.clone();
                async move {
                    if started.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                        let status = tokio::process::Command::new("kill")
                            .args(["-TERM", &pid])
                            .status()
                            .await
                            .unwrap();
                        assert!(status.success());
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                }
            })
        };
        let cycles = tokio::time::timeout(Duration::from_secs(5), cycles)
            .await
            .expect("SIGTERM delivered mid-cycle was not observed");

        assert_eq!(cycles, 2);
    }
}
