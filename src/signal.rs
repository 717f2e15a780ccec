/*
 * Copyright 2023 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/// Receiver for a shutdown event.
pub type ShutdownRx = tokio::sync::watch::Receiver<()>;
pub type ShutdownTx = tokio::sync::watch::Sender<()>;

/// Creates a new handler for shutdown signals (SIGTERM, SIGINT), returning a
/// receiver that changes once a shutdown has been requested.
pub fn spawn_handler() -> crate::Result<(ShutdownTx, ShutdownRx)> {
    let (tx, rx) = channel();
    spawn_signal_handler(tx.clone())?;
    Ok((tx, rx))
}

pub fn channel() -> (ShutdownTx, ShutdownRx) {
    tokio::sync::watch::channel(())
}

fn spawn_signal_handler(shutdown_tx: ShutdownTx) -> crate::Result<()> {
    crate::metrics::shutdown_initiated().set(false as _);

    #[cfg(unix)]
    let mut sig_term_fut = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let sig_term = sig_term_fut.recv();
        #[cfg(not(unix))]
        let sig_term = std::future::pending::<Option<()>>();

        let signal = tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = sig_term => "SIGTERM",
        };

        crate::metrics::shutdown_initiated().set(true as _);
        tracing::info!(%signal, "shutting down from signal");
        // Any remaining receivers still need to observe the shutdown.
        shutdown_tx.send(()).ok();
    });

    Ok(())
}
