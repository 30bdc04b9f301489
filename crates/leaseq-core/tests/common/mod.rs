#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use leaseq_core::{QueueError, QueueItem};

/// Poll `condition` every 5ms for up to 3s.
pub async fn wait_until(mut condition: impl AsyncFnMut() -> bool) {
    for _ in 0..600 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 3s");
}

/// Error handler that records what it was given.
#[derive(Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<(String, Option<QueueItem>)>>>,
}

impl ErrorLog {
    pub fn handler(&self) -> impl Fn(&QueueError, Option<&QueueItem>) + Send + Sync + 'static {
        let entries = Arc::clone(&self.entries);
        move |err: &QueueError, item: Option<&QueueItem>| {
            entries.lock().unwrap().push((err.to_string(), item.cloned()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn items(&self) -> Vec<Option<QueueItem>> {
        self.entries.lock().unwrap().iter().map(|(_, i)| i.clone()).collect()
    }
}
