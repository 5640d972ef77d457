use eventring::{Outcome, Ring, RingReader};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_followers_receive_every_event_in_order() {
    const EVENTS: u64 = 10_000;
    const FOLLOWERS: usize = 8;
    // large enough that no follower can be lapped
    let ring = Arc::new(Ring::new(EVENTS as usize + 2));

    let followers: Vec<_> = (0..FOLLOWERS)
        .map(|_| {
            let mut reader = RingReader::from_newest(ring.clone());
            tokio::spawn(async move {
                let mut received = Vec::with_capacity(EVENTS as usize);
                while (received.len() as u64) < EVENTS {
                    match reader.next_follow_timeout(TIMEOUT).await {
                        Some(ts) => received.push(ts),
                        None => panic!("timed out at position {}", reader.position()),
                    }
                }
                received
            })
        })
        .collect();

    let writer = {
        let ring = ring.clone();
        std::thread::spawn(move || {
            for ts in 0..EVENTS {
                ring.write(ts);
            }
            // push the last event out of the staged slot
            ring.write(EVENTS);
        })
    };

    for follower in followers {
        let received = follower.await.unwrap();
        assert!(received.iter().copied().eq(0..EVENTS));
    }
    writer.join().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_write_wakes_all_followers() {
    const FOLLOWERS: usize = 16;
    let ring = Arc::new(Ring::new(8));
    ring.write(0u64);

    let followers: Vec<_> = (0..FOLLOWERS)
        .map(|_| {
            let mut reader = RingReader::new(ring.clone(), 0);
            tokio::spawn(async move { reader.next_follow_timeout(TIMEOUT).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    ring.write(1);

    for follower in followers {
        assert_eq!(Some(0), follower.await.unwrap());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_follow_from_another_task() {
    let ring = Arc::new(Ring::<u64>::new(8));
    let mut reader = RingReader::new(ring.clone(), 0);
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel_tx.send(()).unwrap();
    });

    assert_eq!(Outcome::Cancelled, reader.next_follow_outcome(cancel_rx).await);
    assert_eq!(0, reader.position());
    canceller.await.unwrap();

    // nothing was skipped, the same position is delivered once it turns readable
    ring.write(0);
    ring.write(1);
    assert_eq!(Some(0), reader.next_follow_timeout(TIMEOUT).await);
    assert_eq!(1, reader.position());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_follow_terminates_without_writer() {
    let ring = Arc::new(Ring::<u64>::new(4));
    let mut reader = RingReader::from_newest(ring);

    let started = tokio::time::Instant::now();
    assert_eq!(None, reader.next_follow_timeout(Duration::from_millis(20)).await);
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert_eq!(0, reader.position());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lagging_reader_loses_overwritten_events() {
    let ring = Arc::new(Ring::new(4));
    let mut reader = RingReader::new(ring.clone(), 0);

    for ts in 0..100u64 {
        ring.write(ts);
    }

    // written = 100, window = 96..=98
    let got: Vec<_> = (0..100).filter_map(|_| reader.next()).collect();
    assert_eq!(vec![96, 97, 98], got);
}

#[test]
fn test_readers_are_independent_across_threads() {
    const WRITES: u64 = 50_000;
    const READERS: usize = 4;
    let ring = Arc::new(Ring::new(32));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let mut reader = RingReader::from_oldest(ring.clone());
            std::thread::spawn(move || {
                let mut last = None;
                while reader.ring().written() < WRITES {
                    match reader.next() {
                        Some(ts) => {
                            // positions only move forward, events follow their positions
                            assert_eq!(reader.position() - 1, ts);
                            assert!(last.is_none_or(|last| last < ts));
                            last = Some(ts);
                        }
                        None => {
                            let missed = reader.position() - 1;
                            match reader.ring().lookup(missed) {
                                // lapped, rejoin at the oldest readable position
                                Outcome::Evicted => {
                                    let oldest = reader.ring().oldest_visible().unwrap_or(missed + 1);
                                    reader.seek(oldest.max(missed + 1));
                                }
                                // caught up with the producer, retry the same position
                                _ => reader.seek(missed),
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for ts in 0..WRITES {
        ring.write(ts);
    }
    for reader in readers {
        reader.join().unwrap();
    }
}
