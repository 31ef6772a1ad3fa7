//! The notification feed and its de-duplication ledger.
//!
//! Both live behind one mutex so that the ledger check, the ledger insert and
//! the feed prepend happen as a single critical section. Subscribers receive
//! the whole feed, most recent first, through a `watch` channel.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures_util::Stream;
use tokio::sync::watch;

use super::{Notification, NotificationId, NotificationKind};
use crate::gateway::JobId;

/// A feed snapshot, most recent first.
pub type FeedSnapshot = Arc<Vec<Notification>>;

#[derive(Default)]
struct Inner {
    feed: VecDeque<Notification>,
    notified: HashSet<JobId>,
    next_id: u64,
}

impl Inner {
    fn push(
        &mut self,
        job_id: Option<JobId>,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Notification {
        self.next_id += 1;
        let notification = Notification {
            id: NotificationId::from(self.next_id),
            job_id,
            title: title.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            read: false,
            kind,
        };
        self.feed.push_front(notification.clone());
        notification
    }

    fn snapshot(&self) -> FeedSnapshot {
        Arc::new(self.feed.iter().cloned().collect())
    }
}

pub struct NotificationStore {
    inner: Mutex<Inner>,
    updates: watch::Sender<FeedSnapshot>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Mutex::new(Inner::default()),
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Notification store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Called with the lock held so subscribers see changes in order.
    fn publish(&self, inner: &Inner) {
        self.updates.send_replace(inner.snapshot());
    }

    /// Records the completion of `job_id`.
    ///
    /// Returns `None` without touching the store when the job was already
    /// notified in this session.
    pub fn notify_job_complete(
        &self,
        job_id: &JobId,
        title: &str,
        message: &str,
    ) -> Option<Notification> {
        let mut inner = self.lock();
        if !inner.notified.insert(job_id.clone()) {
            log::debug!("Job {} already notified, skipping", job_id);
            return None;
        }

        let notification = inner.push(
            Some(job_id.clone()),
            title,
            message,
            NotificationKind::JobComplete,
        );
        self.publish(&inner);

        log::info!(
            "Notification {} created for completed job {}",
            notification.id,
            job_id
        );
        Some(notification)
    }

    /// Adds a status-change notification. The ledger is not consulted.
    pub fn notify_status_change(
        &self,
        job_id: &JobId,
        title: &str,
        message: &str,
    ) -> Notification {
        let mut inner = self.lock();
        let notification = inner.push(
            Some(job_id.clone()),
            title,
            message,
            NotificationKind::StatusChange,
        );
        self.publish(&inner);
        notification
    }

    pub fn notify_system(&self, title: &str, message: &str) -> Notification {
        let mut inner = self.lock();
        let notification = inner.push(None, title, message, NotificationKind::System);
        self.publish(&inner);
        notification
    }

    /// Returns `false` when no notification has that id.
    pub fn mark_as_read(&self, id: NotificationId) -> bool {
        let mut inner = self.lock();
        let Some(notification) = inner.feed.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if !notification.read {
            notification.read = true;
            self.publish(&inner);
        }
        true
    }

    /// Marks every notification read and returns how many changed.
    pub fn mark_all_as_read(&self) -> usize {
        let mut inner = self.lock();
        let mut changed = 0;
        for notification in inner.feed.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        if changed > 0 {
            self.publish(&inner);
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.lock().feed.iter().filter(|n| !n.read).count()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.lock().feed.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().feed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_notified(&self, job_id: &JobId) -> bool {
        self.lock().notified.contains(job_id)
    }

    /// Dismisses the feed. Already-notified jobs stay in the ledger, so a
    /// job reported complete again will not reappear.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.feed.clear();
        self.publish(&inner);
    }

    /// Forgets everything, ledger included.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.feed.clear();
        inner.notified.clear();
        self.publish(&inner);
    }

    pub fn subscribe(&self) -> NotificationSubscription {
        NotificationSubscription {
            rx: self.updates.subscribe(),
        }
    }
}

/// A view of the feed that follows every change.
///
/// Subscribing again starts over from the current snapshot.
pub struct NotificationSubscription {
    rx: watch::Receiver<FeedSnapshot>,
}

impl NotificationSubscription {
    pub fn current(&self) -> FeedSnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next change. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<FeedSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Yields the current snapshot, then one snapshot per change.
    pub fn into_stream(self) -> impl Stream<Item = FeedSnapshot> {
        futures_util::stream::unfold((self.rx, true), |(mut rx, first)| async move {
            if !first {
                rx.changed().await.ok()?;
            }
            let snapshot = rx.borrow_and_update().clone();
            Some((snapshot, (rx, false)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use proptest::prelude::*;

    fn job(id: &str) -> JobId {
        JobId::new(id)
    }

    #[test]
    fn test_second_completion_is_ignored() {
        let store = NotificationStore::new();
        let first = store.notify_job_complete(&job("42"), "Done", "Job 42 done");
        let second = store.notify_job_complete(&job("42"), "Done", "Job 42 done");

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.unread_count(), 1);
        assert!(store.is_notified(&job("42")));
    }

    #[test]
    fn test_feed_is_most_recent_first() {
        let store = NotificationStore::new();
        store.notify_job_complete(&job("1"), "a", "a");
        store.notify_system("b", "b");
        store.notify_job_complete(&job("2"), "c", "c");

        let titles: Vec<_> = store.snapshot().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["c", "b", "a"]);

        let ids: Vec<_> = store.snapshot().into_iter().map(|n| n.id.value()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_mark_read_never_touches_ledger() {
        let store = NotificationStore::new();
        let n = store.notify_job_complete(&job("7"), "t", "m").unwrap();

        assert!(store.mark_as_read(n.id));
        assert!(store.mark_as_read(n.id));
        assert!(!store.mark_as_read(NotificationId::from(999)));
        assert_eq!(store.unread_count(), 0);
        assert!(store.is_notified(&job("7")));
        assert!(store.notify_job_complete(&job("7"), "t", "m").is_none());
    }

    #[test]
    fn test_mark_all_as_read() {
        let store = NotificationStore::new();
        store.notify_job_complete(&job("1"), "t", "m");
        store.notify_job_complete(&job("2"), "t", "m");
        store.notify_status_change(&job("3"), "t", "m");

        assert_eq!(store.mark_all_as_read(), 3);
        assert_eq!(store.mark_all_as_read(), 0);
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_status_change_does_not_enter_ledger() {
        let store = NotificationStore::new();
        store.notify_status_change(&job("5"), "Failed", "Job 5 failed");
        assert!(!store.is_notified(&job("5")));
        assert!(store.notify_job_complete(&job("5"), "Done", "Job 5 done").is_some());
    }

    #[test]
    fn test_clear_keeps_ledger_reset_drops_it() {
        let store = NotificationStore::new();
        store.notify_job_complete(&job("1"), "t", "m");

        store.clear();
        assert!(store.is_empty());
        assert!(store.notify_job_complete(&job("1"), "t", "m").is_none());

        store.reset();
        assert!(!store.is_notified(&job("1")));
        assert!(store.notify_job_complete(&job("1"), "t", "m").is_some());
    }

    #[tokio::test]
    async fn test_subscription_sees_snapshots() {
        let store = NotificationStore::new();
        store.notify_system("welcome", "hi");

        let mut sub = store.subscribe();
        assert_eq!(sub.current().len(), 1);

        store.notify_job_complete(&job("9"), "Done", "ready");
        let snapshot = sub.changed().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].job_id, Some(job("9")));
    }

    #[tokio::test]
    async fn test_stream_starts_with_current_and_restarts() {
        let store = NotificationStore::new();
        store.notify_job_complete(&job("1"), "t", "m");

        let mut stream = Box::pin(store.subscribe().into_stream());
        assert_eq!(stream.next().await.unwrap().len(), 1);

        store.notify_job_complete(&job("2"), "t", "m");
        assert_eq!(stream.next().await.unwrap().len(), 2);

        let mut again = Box::pin(store.subscribe().into_stream());
        assert_eq!(again.next().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_ends_when_store_dropped() {
        let store = NotificationStore::new();
        let mut stream = Box::pin(store.subscribe().into_stream());
        assert!(stream.next().await.unwrap().is_empty());
        drop(store);
        assert!(stream.next().await.is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Complete(u8),
        Status(u8),
        Read(usize),
        ReadAll,
        Clear,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Complete),
            (0u8..8).prop_map(Op::Status),
            (0usize..16).prop_map(Op::Read),
            Just(Op::ReadAll),
            Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn test_unread_count_matches_feed(
            ops in proptest::collection::vec(op(), 0..40)
        ) {
            let store = NotificationStore::new();
            let mut created = std::collections::HashMap::<u8, usize>::new();

            for op in ops {
                match op {
                    Op::Complete(j) => {
                        let job = JobId::new(j.to_string());
                        if store.notify_job_complete(&job, "t", "m").is_some() {
                            *created.entry(j).or_default() += 1;
                        }
                    }
                    Op::Status(j) => {
                        store.notify_status_change(&JobId::new(j.to_string()), "t", "m");
                    }
                    Op::Read(i) => {
                        if let Some(n) = store.snapshot().get(i) {
                            store.mark_as_read(n.id);
                        }
                    }
                    Op::ReadAll => {
                        store.mark_all_as_read();
                    }
                    Op::Clear => store.clear(),
                }

                let feed = store.snapshot();
                prop_assert_eq!(store.unread_count(), feed.iter().filter(|n| !n.read).count());
            }

            // At most one completion notification per job, ever.
            prop_assert!(created.values().all(|&count| count == 1));
        }
    }
}
