use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep, timeout};
use tracing::info;
use tracing_subscriber::EnvFilter;

use leaseq_core::{
    EnqueueOptions, Handler, InMemoryStore, Message, Outcome, Queue, QueueConfig, QueueError,
    QueueItem,
};

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    name: String,
}

impl Message for Hello {
    const TYPE: &'static str = "hello";
}

/// Releases every item twice before completing it.
struct HelloHandler {
    failures_per_item: u32,
    completed: Arc<AtomicU32>,
}

#[async_trait]
impl Handler<Hello> for HelloHandler {
    async fn handle(&self, message: Hello, item: &mut QueueItem) -> Result<Outcome, QueueError> {
        let attempt = item.retry_count();
        if attempt < self.failures_per_item {
            item.released_reason = Some(format!("intentional failure (attempt={attempt})"));
            return Ok(Outcome::Retry);
        }

        println!("Hello, {}! (after {} releases)", message.name, attempt);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(Outcome::Completed)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) config from LEASEQ_* env vars, in-memory store
    let config = QueueConfig::from_env()?;
    info!(?config, "starting demo queue");

    let completed = Arc::new(AtomicU32::new(0));
    let queue = Queue::builder()
        .config(config)
        .store(InMemoryStore::new())
        .register::<Hello, _>(HelloHandler {
            failures_per_item: 2,
            completed: Arc::clone(&completed),
        })
        .expect_types(&[Hello::TYPE])
        .build()?;

    // (B) enqueue
    for name in ["leaseq", "tokio", "serde"] {
        let item = queue
            .enqueue_message(&Hello { name: name.to_string() }, EnqueueOptions::default())
            .await?;
        println!("enqueued: {}", item.id);
    }

    // (C) wait until every item has been completed (and deleted)
    timeout(Duration::from_secs(60), async {
        loop {
            match queue.count(Hello::TYPE).await {
                Ok(0) => return Ok(()),
                Ok(_) => sleep(Duration::from_millis(50)).await,
                Err(err) => return Err(err),
            }
        }
    })
    .await??;

    // (D) stop claiming; nothing is left in flight
    queue.stop_polling();
    println!(
        "counts: completed={} remaining={} active={}",
        completed.load(Ordering::SeqCst),
        queue.count(Hello::TYPE).await?,
        queue.active_workers()
    );
    Ok(())
}
