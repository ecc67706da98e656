
use std::time::Duration;

use futures::future::select_all;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Waits up to `delay` for any of `socks` to become readable and returns an
/// equal-length readiness bitmap.
///
/// A zero `delay` performs a pure poll. Otherwise the first socket to become
/// ready ends the wait, and every other socket that is ready by then is
/// reported in the same bitmap, so a single wake drains all pending input.
/// A socket whose readiness check fails is marked ready; the subsequent read
/// surfaces the error to the caller.
pub async fn wait_readable(socks: &[&TcpStream], delay: Duration) -> Vec<bool> {
    let mut ready = vec![false; socks.len()];

    if socks.is_empty() {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        return ready;
    }

    if !delay.is_zero() {
        let waits = socks
            .iter()
            .map(|s| {
                Box::pin(async move {
                    let _ = s.readable().await;
                })
            })
            .collect::<Vec<_>>();

        match timeout(delay, select_all(waits)).await {
            Ok((_, first, _)) => ready[first] = true,
            Err(_) => return ready,
        }
    }

    // Zero-duration poll of everything not already known to be ready.
    for (i, sock) in socks.iter().enumerate() {
        if !ready[i] && timeout(Duration::ZERO, sock.readable()).await.is_ok() {
            ready[i] = true;
        }
    }

    ready
}
