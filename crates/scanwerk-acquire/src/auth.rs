// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Credential relay between a backend running on the scan worker and the
// controlling thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use scanwerk_core::types::Credentials;
use tracing::{info, warn};

use crate::backend::Authenticator;
use crate::dispatch::MainLoop;
use crate::observer::ScannerObserver;
use crate::queue::BlockingQueue;

enum AuthReply {
    Credentials(Credentials),
    /// The scanner is shutting down; give the backend empty credentials so
    /// it can fail out of its call.
    Abort,
}

/// Authenticator handed to the backend.
///
/// A request is posted to the observer on the controlling thread and the
/// worker blocks until [`AuthRelay::authorize`] supplies an answer.  Replies
/// are consumed in order, one per request.
#[derive(Clone)]
pub struct AuthRelay {
    main_loop: MainLoop,
    observer: Arc<dyn ScannerObserver>,
    replies: Arc<BlockingQueue<AuthReply>>,
    waiting: Arc<AtomicBool>,
}

impl AuthRelay {
    pub fn new(main_loop: MainLoop, observer: Arc<dyn ScannerObserver>) -> Self {
        Self {
            main_loop,
            observer,
            replies: Arc::new(BlockingQueue::new()),
            waiting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Answer the pending (or next) credential request.
    pub fn authorize(&self, credentials: Credentials) {
        self.replies.push(AuthReply::Credentials(credentials));
    }

    /// Whether the backend is blocked waiting for credentials.
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Release a blocked backend with empty credentials.  Does nothing if no
    /// request is outstanding or a reply is already queued.
    pub fn abort_pending(&self) {
        if self.is_waiting() && self.replies.is_empty() {
            warn!("abandoning outstanding credential request");
            self.replies.push(AuthReply::Abort);
        }
    }
}

impl Authenticator for AuthRelay {
    fn authenticate(&self, resource: &str) -> Credentials {
        info!(resource, "backend requested credentials");
        self.waiting.store(true, Ordering::SeqCst);

        let observer = Arc::clone(&self.observer);
        let resource = resource.to_string();
        self.main_loop
            .post(move || observer.request_authorization(&resource));

        let reply = self.replies.pop();
        self.waiting.store(false, Ordering::SeqCst);
        match reply {
            AuthReply::Credentials(credentials) => credentials,
            AuthReply::Abort => Credentials::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use crate::observer::{EventQueue, ScanEvent};

    fn relay() -> (AuthRelay, MainLoop, EventQueue) {
        let main_loop = MainLoop::new();
        let events = EventQueue::new();
        let relay = AuthRelay::new(main_loop.clone(), Arc::new(events.clone()));
        (relay, main_loop, events)
    }

    fn wait_until_waiting(relay: &AuthRelay) {
        while !relay.is_waiting() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn request_reaches_observer_and_reply_unblocks_backend() {
        let (relay, main_loop, events) = relay();
        let backend_side = relay.clone();
        let backend = thread::spawn(move || backend_side.authenticate("net:office"));

        while !main_loop.run_once_timeout(Duration::from_millis(20)) {}
        assert_eq!(
            events.drain(),
            vec![ScanEvent::AuthorizationRequested("net:office".into())]
        );

        relay.authorize(Credentials::new("alice", "s3cret"));
        let credentials = backend.join().expect("backend thread");
        assert_eq!(credentials, Credentials::new("alice", "s3cret"));
        assert!(!relay.is_waiting());
    }

    #[test]
    fn abort_releases_backend_with_empty_credentials() {
        let (relay, _main_loop, _events) = relay();
        let backend_side = relay.clone();
        let backend = thread::spawn(move || backend_side.authenticate("net:office"));

        wait_until_waiting(&relay);
        relay.abort_pending();
        let credentials = backend.join().expect("backend thread");
        assert!(credentials.username.is_empty());
        assert!(credentials.password.is_empty());
    }

    #[test]
    fn abort_without_request_queues_nothing() {
        let (relay, _main_loop, _events) = relay();
        relay.abort_pending();
        relay.authorize(Credentials::new("bob", "pw"));

        // The earlier abort must not be mistaken for the answer.
        assert_eq!(relay.authenticate("r"), Credentials::new("bob", "pw"));
    }
}
