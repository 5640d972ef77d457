use eventring::{Ring, RingReader};
use rand::{Rng, thread_rng};
use std::sync::Arc;
use std::time::Duration;

/// This demo will publish random events from a dedicated thread while several followers tail the
/// ring concurrently. A late reader then replays the retained history backward.

const RING_CAPACITY: usize = 64;
const NUM_EVENTS: u64 = 100;
const NUM_FOLLOWERS: usize = 3;

#[derive(Debug, Clone)]
struct Event {
    seq: u64,
    symbol: char,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ring = Arc::new(Ring::new(RING_CAPACITY));

    let followers: Vec<_> = (0..NUM_FOLLOWERS)
        .map(|id| {
            let mut reader = RingReader::from_newest(ring.clone());
            tokio::spawn(async move {
                let mut count = 0;
                // stop once the producer has been quiet for a while
                while let Some(event) = reader.next_follow_timeout(Duration::from_millis(250)).await {
                    let event: Arc<Event> = event;
                    count += 1;
                    if event.seq % 25 == 0 {
                        println!("follower {id} received {:?}", event);
                    }
                }
                println!("follower {id} idle at position {} after {count} events", reader.position());
                count
            })
        })
        .collect();

    let writer = {
        let ring = ring.clone();
        std::thread::spawn(move || {
            for seq in 0..NUM_EVENTS {
                let symbol = thread_rng().gen_range(b'A'..=b'Z') as char;
                ring.write(Arc::new(Event { seq, symbol }));
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    };

    for follower in followers {
        follower.await?;
    }
    writer.join().map_err(|_| anyhow::anyhow!("writer panicked"))?;

    // replay the last few events, newest first
    let mut history = RingReader::from_newest(ring.clone());
    let replay: Vec<_> = (0..5).filter_map(|_| history.previous()).map(|e| (e.seq, e.symbol)).collect();
    println!("latest events: {:?}", replay);
    println!("retained {} of {} events", ring.len(), ring.written());

    Ok(())
}
