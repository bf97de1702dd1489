//! The connection table (§4.E): tracks which sockets belong to which
//! user, and fans out events to all of a user's live sockets.
//!
//! Grounded on `host/src/server/auth.rs`'s `Arc<RwLock<DashMap<..>>>`
//! API-key table: same shape (a concurrent map guarding per-connection
//! state), generalized from "one entry per key" to "a set of sockets per
//! user" since one user may have several tabs/devices open at once.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use imagegen_core::UserId;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::event::PushEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub Uuid);

impl SocketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

/// Live per-user WebSocket connections plus fan-out delivery.
///
/// `sockets_by_user` answers "is this user online, and on which sockets"
/// (presence); `senders` is the actual delivery path. Both are plain
/// `DashMap`s rather than a single `Mutex<HashMap<..>>` so that a send to
/// one user's socket never blocks a concurrent (dis)connect from another.
pub struct PushHub {
    sockets_by_user: DashMap<UserId, HashSet<SocketId>>,
    senders: DashMap<SocketId, UnboundedSender<PushEvent>>,
}

impl PushHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sockets_by_user: DashMap::new(),
            senders: DashMap::new(),
        })
    }

    /// Registers a newly-authenticated socket for `user_id` and returns its
    /// id plus the receiving half of its delivery channel. Broadcasts
    /// `user_online` system-wide if this is the user's first socket (§4.E).
    pub fn register(self: &Arc<Self>, user_id: UserId) -> (SocketId, bool, UnboundedReceiver<PushEvent>) {
        let socket_id = SocketId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(socket_id, tx);

        let was_offline = {
            let mut entry = self.sockets_by_user.entry(user_id).or_default();
            let was_offline = entry.is_empty();
            entry.insert(socket_id);
            was_offline
        };

        if was_offline {
            self.broadcast(PushEvent::UserOnline { user_id });
        }

        (socket_id, was_offline, rx)
    }

    /// Removes a socket. Broadcasts `user_offline` system-wide if the user
    /// has no remaining live sockets (§4.E). Returns whether that happened.
    pub fn unregister(&self, user_id: UserId, socket_id: SocketId) -> bool {
        self.senders.remove(&socket_id);

        let now_offline = match self.sockets_by_user.get_mut(&user_id) {
            Some(mut entry) => {
                entry.remove(&socket_id);
                entry.is_empty()
            }
            None => true,
        };

        if now_offline {
            self.broadcast(PushEvent::UserOffline { user_id });
        }

        now_offline
    }

    /// Fire-and-forget delivery to every live socket of every user (§4.E
    /// presence events, which are system-wide rather than per-user).
    fn broadcast(&self, event: PushEvent) {
        for sender in self.senders.iter() {
            let _ = sender.value().send(event.clone());
        }
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.sockets_by_user
            .get(&user_id)
            .map(|sockets| !sockets.is_empty())
            .unwrap_or(false)
    }

    /// Fire-and-forget delivery to every live socket of `user_id`. A user
    /// with no open socket simply drops the event (§4.E: best-effort,
    /// no durable replay).
    pub fn emit_to_user(&self, user_id: UserId, event: PushEvent) {
        let Some(sockets) = self.sockets_by_user.get(&user_id) else {
            return;
        };

        for socket_id in sockets.iter() {
            if let Some(sender) = self.senders.get(socket_id) {
                if sender.send(event.clone()).is_err() {
                    tracing::debug!(%user_id, socket_id = %socket_id.0, "dropped event, receiver gone");
                }
            }
        }
    }

    pub fn online_user_count(&self) -> usize {
        self.sockets_by_user
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn progress_event(generation_id: imagegen_core::GenerationId, progress: u8) -> PushEvent {
        PushEvent::GenerationProgress {
            generation_id,
            progress,
            message: "rendering".into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_registration_reports_was_offline() {
        let hub = PushHub::new();
        let user = UserId::new();
        let (_socket, was_offline, _rx) = hub.register(user);
        assert!(was_offline);
        assert!(hub.is_online(user));
    }

    #[tokio::test]
    async fn second_socket_for_same_user_does_not_report_offline() {
        let hub = PushHub::new();
        let user = UserId::new();
        let (_s1, _o1, _rx1) = hub.register(user);
        let (_s2, was_offline, _rx2) = hub.register(user);
        assert!(!was_offline);
    }

    #[tokio::test]
    async fn unregister_last_socket_reports_offline() {
        let hub = PushHub::new();
        let user = UserId::new();
        let (socket, _, _rx) = hub.register(user);
        assert!(hub.unregister(user, socket));
        assert!(!hub.is_online(user));
    }

    #[tokio::test]
    async fn events_for_one_user_never_reach_another_users_socket() {
        let hub = PushHub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (_a, _, mut alice_rx) = hub.register(alice);
        let (_b, _, mut bob_rx) = hub.register(bob);

        let gen_id = imagegen_core::GenerationId::new();
        hub.emit_to_user(alice, progress_event(gen_id, 10));

        let received = alice_rx.try_recv();
        assert!(received.is_ok());
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn progress_events_for_a_generation_arrive_in_order() {
        let hub = PushHub::new();
        let user = UserId::new();
        let (_s, _, mut rx) = hub.register(user);
        let gen_id = imagegen_core::GenerationId::new();

        for pct in [10, 40, 75, 100] {
            hub.emit_to_user(user, progress_event(gen_id, pct));
        }

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PushEvent::GenerationProgress { progress, .. } = event {
                seen.push(progress);
            }
        }
        assert_eq!(seen, vec![10, 40, 75, 100]);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn emit_to_offline_user_is_a_silent_no_op() {
        let hub = PushHub::new();
        let user = UserId::new();
        hub.emit_to_user(user, progress_event(imagegen_core::GenerationId::new(), 10));
    }
}
