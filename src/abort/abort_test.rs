use std::io::ErrorKind;
use std::time::Duration;

use tokio::time::timeout;
use tokio_test::assert_ok;

use super::*;

fn assert_not_readable(ch: &AbortChannel) {
    let mut buf = [0u8; 1];
    match ch.reader().try_read(&mut buf) {
        Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
        other => panic!("expected drained channel, got {other:?}"),
    }
}

#[tokio::test]
async fn test_signal_makes_reader_ready() {
    let ch = assert_ok!(AbortChannel::new().await);

    ch.signal();

    let result = timeout(Duration::from_millis(500), ch.reader().readable()).await;
    assert!(result.is_ok(), "reader did not become ready after signal");
}

#[tokio::test]
async fn test_drain_empties_channel() {
    let ch = assert_ok!(AbortChannel::new().await);

    ch.signal();
    assert_ok!(timeout(Duration::from_millis(500), ch.reader().readable()).await.unwrap());

    ch.drain();
    assert_not_readable(&ch);
}

#[tokio::test]
async fn test_repeated_signals_single_drain() {
    let ch = assert_ok!(AbortChannel::new().await);

    for _ in 0..16 {
        ch.signal();
    }
    assert_ok!(timeout(Duration::from_millis(500), ch.reader().readable()).await.unwrap());

    ch.drain();
    assert_not_readable(&ch);
}

#[tokio::test]
async fn test_drain_on_empty_channel_is_noop() {
    let ch = assert_ok!(AbortChannel::new().await);

    ch.drain();
    ch.drain();
    assert_not_readable(&ch);
}

#[tokio::test]
async fn test_signal_without_reader_progress_never_blocks() {
    let ch = assert_ok!(AbortChannel::new().await);

    // Far more bytes than the kernel buffers for a loopback pair would
    // block a plain write; signal must shrug the overflow off.
    for _ in 0..100_000 {
        ch.signal();
    }
    ch.drain();
    assert_not_readable(&ch);
}
