use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoRoomDocument, MongoRoundDocument, history_filter, room_filter, round_filter,
        room_version_filter,
    },
};
use crate::dao::{
    models::{RoomEntity, RoomListItemEntity, RoundSummaryEntity},
    room_store::{ChangeFeed, RoomChange, RoomStore},
    storage::{StorageError, StorageResult},
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const HISTORY_COLLECTION_NAME: &str = "round_history";

/// Room store backed by MongoDB.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    feed: ChangeFeed,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
            feed: ChangeFeed::default(),
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let history = self.history_collection().await;
        let index = IndexModel::builder()
            .keys(doc! {"room_id": 1, "round": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_round_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        history
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: HISTORY_COLLECTION_NAME,
                index: "room_id,round",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn history_collection(&self) -> Collection<MongoRoundDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoundDocument>(HISTORY_COLLECTION_NAME)
    }

    async fn create_room(&self, room: RoomEntity) -> MongoResult<()> {
        let id = room.id;
        let document: MongoRoomDocument = room.into();
        self.collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;
        Ok(())
    }

    async fn find_room(&self, id: Uuid) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .collection()
            .await
            .find_one(room_filter(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;

        let Some(document) = document else {
            return Ok(None);
        };

        let history: Vec<MongoRoundDocument> = self
            .history_collection()
            .await
            .find(history_filter(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;

        document.try_into_entity(history).map(Some)
    }

    async fn save_room(&self, room: RoomEntity, expected_version: u64) -> StorageResult<()> {
        let id = room.id;
        let document: MongoRoomDocument = room.into();
        let collection = self.collection().await;

        let result = collection
            .replace_one(room_version_filter(id, expected_version), &document)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;

        if result.matched_count == 0 {
            let exists = collection
                .find_one(room_filter(id))
                .await
                .map_err(|source| MongoDaoError::LoadRoom { id, source })?
                .is_some();
            return Err(if exists {
                StorageError::Conflict {
                    id,
                    expected: expected_version,
                }
            } else {
                StorageError::Missing { id }
            });
        }

        self.publish(id).await;
        Ok(())
    }

    async fn append_round_history(&self, id: Uuid, summary: RoundSummaryEntity) -> StorageResult<()> {
        let exists = self
            .collection()
            .await
            .find_one(room_filter(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?
            .is_some();
        if !exists {
            return Err(StorageError::Missing { id });
        }

        let round = summary.round;
        let document = MongoRoundDocument {
            room_id: id.to_string(),
            round,
            summary,
        };
        self.history_collection()
            .await
            .replace_one(round_filter(id, round), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::AppendHistory { id, round, source })?;

        self.publish(id).await;
        Ok(())
    }

    async fn list_rooms(&self) -> MongoResult<Vec<RoomListItemEntity>> {
        let documents: Vec<MongoRoomDocument> = self
            .collection()
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?;

        let mut rooms = documents
            .into_iter()
            .map(|document| {
                document
                    .try_into_entity(Vec::new())
                    .map(|entity| RoomListItemEntity::from(&entity))
            })
            .collect::<MongoResult<Vec<_>>>()?;
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rooms)
    }

    async fn delete_room(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(room_filter(id))
            .await
            .map_err(|source| MongoDaoError::DeleteRoom { id, source })?;

        self.history_collection()
            .await
            .delete_many(history_filter(id))
            .await
            .map_err(|source| MongoDaoError::DeleteRoom { id, source })?;

        let existed = result.deleted_count > 0;
        if existed {
            self.inner.feed.publish_deleted(id);
        }
        Ok(existed)
    }

    // Subscribers get the room as stored, history included.
    async fn publish(&self, id: Uuid) {
        match self.find_room(id).await {
            Ok(Some(room)) => self.inner.feed.publish_updated(room),
            Ok(None) => {}
            Err(err) => debug!(room_id = %id, error = %err, "skipping change notification"),
        }
    }
}

impl RoomStore for MongoRoomStore {
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = room.id;
            store.create_room(room).await?;
            store.publish(id).await;
            Ok(())
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await.map_err(Into::into) })
    }

    fn save_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_room(room, expected_version).await })
    }

    fn append_round_history(
        &self,
        id: Uuid,
        summary: RoundSummaryEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_round_history(id, summary).await })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_rooms().await.map_err(Into::into) })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_room(id).await.map_err(Into::into) })
    }

    fn subscribe(&self, id: Uuid) -> broadcast::Receiver<RoomChange> {
        self.inner.feed.subscribe(id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
