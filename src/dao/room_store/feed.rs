use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::models::RoomEntity;

const ROOM_FEED_CAPACITY: usize = 64;

/// Change pushed to room subscribers after a commit.
#[derive(Debug, Clone)]
pub enum RoomChange {
    /// The room as it is now stored.
    Updated(Box<RoomEntity>),
    /// The room was removed.
    Deleted(Uuid),
}

/// Per-room broadcast channels, created lazily on first subscription.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    channels: DashMap<Uuid, broadcast::Sender<RoomChange>>,
}

impl ChangeFeed {
    /// Subscribe to changes of room `id`.
    pub fn subscribe(&self, id: Uuid) -> broadcast::Receiver<RoomChange> {
        self.channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(ROOM_FEED_CAPACITY).0)
            .subscribe()
    }

    /// Push the committed state of a room to its subscribers.
    pub fn publish_updated(&self, room: RoomEntity) {
        self.send(room.id, RoomChange::Updated(Box::new(room)));
    }

    /// Tell subscribers the room is gone and drop its channel.
    pub fn publish_deleted(&self, id: Uuid) {
        self.send(id, RoomChange::Deleted(id));
        self.channels.remove(&id);
    }

    fn send(&self, id: Uuid, change: RoomChange) {
        let stale = match self.channels.get(&id) {
            // An error only means nobody listens right now.
            Some(sender) => sender.send(change).is_err(),
            None => false,
        };
        if stale {
            self.channels
                .remove_if(&id, |_, sender| sender.receiver_count() == 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deleted_is_delivered_then_channel_dropped() {
        let feed = ChangeFeed::default();
        let id = Uuid::new_v4();
        let mut rx = feed.subscribe(id);
        feed.publish_deleted(id);
        match rx.recv().await.unwrap() {
            RoomChange::Deleted(deleted) => assert_eq!(deleted, id),
            other => panic!("unexpected change {other:?}"),
        }
        assert!(rx.recv().await.is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let feed = ChangeFeed::default();
        feed.publish_deleted(Uuid::new_v4());
        assert!(feed.channels.is_empty());
    }
}
