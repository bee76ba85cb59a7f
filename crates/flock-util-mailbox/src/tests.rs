use std::time::Duration;

use super::*;

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn can_put_and_recv() {
    let (tx, mut rx) = mailbox();

    tx.try_put(8).unwrap();

    assert_eq!(rx.recv().await, Ok(8));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn rejects_new_item_when_full() {
    let (tx, mut rx) = mailbox();

    tx.try_put(1).unwrap();
    let err = tx.try_put(2).unwrap_err();
    assert!(err.is_full());
    assert_eq!(err.into_inner(), 2);
    assert_eq!(tx.rejected_count(), 1);

    // The pending item was not replaced
    assert_eq!(rx.recv().await, Ok(1));

    // And the slot is usable again
    tx.try_put(3).unwrap();
    assert_eq!(rx.recv().await, Ok(3));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn primed_mailbox_delivers_initial_first() {
    let (tx, mut rx) = mailbox_with("snapshot");

    assert!(tx.try_put("live").unwrap_err().is_full());
    assert_eq!(rx.recv().await, Ok("snapshot"));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn can_detect_tx_drop() {
    let (tx, mut rx) = mailbox();

    tx.try_put(8).unwrap();
    drop(tx);

    // Pending item survives the sender
    assert_eq!(rx.recv().await, Ok(8));
    assert_eq!(rx.recv().await, Err(RecvError::Closed));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn can_detect_rx_drop() {
    let (tx, rx) = mailbox();

    assert!(!tx.is_closed());
    drop(rx);

    assert!(tx.is_closed());
    assert!(matches!(tx.try_put(1), Err(PutError::Closed(1))));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn recv_wakes_up_on_put() {
    let (tx, mut rx) = mailbox();

    let handle = tokio::spawn(async move { rx.recv().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.try_put(42).unwrap();

    assert_eq!(handle.await.unwrap(), Ok(42));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn recv_is_cancel_safe() {
    let (tx, mut rx) = mailbox();

    // Abandon a pending `recv` a few times
    for _ in 0..3 {
        tokio::select! {
            _ = rx.recv() => panic!("Nothing was put yet"),
            _ = tokio::time::sleep(Duration::from_millis(5)) => {}
        }
    }

    tx.try_put(7).unwrap();
    assert_eq!(rx.recv().await, Ok(7));
}
