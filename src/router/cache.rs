use std::sync::mpsc;
use std::thread;

use super::local::{Query, Subscriber};

/// Process-wide subscription store.
///
/// A tiny single-actor store that outlives any router: starting a new
/// router with the same cache handle reinstalls the previously registered
/// subscriptions (warm restart). If the cache itself is dropped,
/// subscriptions are lost and subscribers must re-subscribe.
///
/// `set` fully replaces the stored list; entries whose subscriber died
/// while no router was running are pruned lazily on the next router start.
pub struct SubscriptionCache<M> {
    requests: mpsc::Sender<Request<M>>,
}

enum Request<M> {
    Get(mpsc::Sender<Vec<(Query, Subscriber<M>)>>),
    Set(Vec<(Query, Subscriber<M>)>),
}

impl<M: Send + 'static> SubscriptionCache<M> {
    /// Starts the cache actor.
    ///
    /// The actor thread runs until the last cache handle is dropped.
    pub fn spawn() -> Self {
        let (requests, requests_rx) = mpsc::channel();

        thread::spawn(move || {
            let mut entries: Vec<(Query, Subscriber<M>)> = Vec::new();
            while let Ok(request) = requests_rx.recv() {
                match request {
                    Request::Get(reply) => {
                        _ = reply.send(entries.clone());
                    }
                    Request::Set(list) => entries = list,
                }
            }
        });

        Self { requests }
    }

    /// Returns the stored subscription list.
    pub fn get(&self) -> Vec<(Query, Subscriber<M>)> {
        let (reply, reply_rx) = mpsc::channel();
        if self.requests.send(Request::Get(reply)).is_err() {
            return Vec::new();
        }
        reply_rx.recv().unwrap_or_default()
    }

    /// Replaces the stored subscription list.
    pub fn set(&self, entries: Vec<(Query, Subscriber<M>)>) {
        _ = self.requests.send(Request::Set(entries));
    }
}

impl<M> Clone for SubscriptionCache<M> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}
