use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{RoomEntity, RoomListItemEntity, RoundSummaryEntity},
    room_store::{ChangeFeed, RoomChange, RoomStore},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchRevision, CouchRoomDocument, CouchRoundDocument, END_SUFFIX,
        ROOM_PREFIX, room_doc_id, round_doc_id, round_prefix,
    },
};

/// Room store backed by a CouchDB database.
#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    feed: Arc<ChangeFeed>,
}

impl CouchRoomStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .credentials
            .map(|(user, pass)| (Arc::<str>::from(user), Arc::<str>::from(pass)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            feed: Arc::new(ChangeFeed::default()),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.with_auth(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .with_auth(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<()> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn load_room(&self, id: Uuid) -> CouchResult<Option<RoomEntity>> {
        let Some(doc) = self
            .get_document::<CouchRoomDocument>(&room_doc_id(id))
            .await?
        else {
            return Ok(None);
        };
        let history = self
            .list_documents::<CouchRoundDocument>(&round_prefix(id))
            .await?;
        doc.try_into_entity(history).map(Some)
    }

    async fn publish(&self, id: Uuid) {
        match self.load_room(id).await {
            Ok(Some(room)) => self.feed.publish_updated(room),
            Ok(None) => {}
            Err(err) => debug!(room_id = %id, error = %err, "skipping change notification"),
        }
    }
}

impl RoomStore for CouchRoomStore {
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = room.id;
            let doc = CouchRoomDocument::from((room, None));
            store.put_document(&doc.id, &doc).await?;
            store.publish(id).await;
            Ok(())
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_room(id).await.map_err(Into::into) })
    }

    fn save_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = room.id;
            let doc_id = room_doc_id(id);
            let existing = store
                .get_document::<CouchRoomDocument>(&doc_id)
                .await?
                .ok_or(StorageError::Missing { id })?;
            let conflict = StorageError::Conflict {
                id,
                expected: expected_version,
            };
            if existing.room.version != expected_version {
                return Err(conflict);
            }

            let doc = CouchRoomDocument::from((room, existing.rev));
            match store.put_document(&doc_id, &doc).await {
                Ok(()) => {}
                // Another writer bumped `_rev` between our read and write.
                Err(err) if err.is_revision_conflict() => return Err(conflict),
                Err(err) => return Err(err.into()),
            }
            store.publish(id).await;
            Ok(())
        })
    }

    fn append_round_history(
        &self,
        id: Uuid,
        summary: RoundSummaryEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if store
                .get_document::<CouchRevision>(&room_doc_id(id))
                .await?
                .is_none()
            {
                return Err(StorageError::Missing { id });
            }
            let doc_id = round_doc_id(id, summary.round);
            // Overwrite an already recorded round instead of failing on its `_rev`.
            let rev = store
                .get_document::<CouchRevision>(&doc_id)
                .await?
                .map(|existing| existing.rev);
            let doc = CouchRoundDocument {
                id: doc_id,
                rev,
                room_id: id,
                summary,
            };
            store.put_document(&doc.id, &doc).await?;
            store.publish(id).await;
            Ok(())
        })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchRoomDocument>(ROOM_PREFIX)
                .await?;
            let mut rooms = docs
                .into_iter()
                .map(|doc| {
                    doc.try_into_entity(Vec::new())
                        .map(|entity| RoomListItemEntity::from(&entity))
                })
                .collect::<CouchResult<Vec<_>>>()?;
            rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rooms)
        })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = room_doc_id(id);
            let Some(existing) = store.get_document::<CouchRevision>(&doc_id).await? else {
                return Ok(false);
            };

            let history = store
                .list_documents::<CouchRevision>(&round_prefix(id))
                .await?;
            for entry in history {
                store.delete_document(&entry.id, &entry.rev).await?;
            }
            store.delete_document(&existing.id, &existing.rev).await?;
            store.feed.publish_deleted(id);
            Ok(true)
        })
    }

    fn subscribe(&self, id: Uuid) -> broadcast::Receiver<RoomChange> {
        self.feed.subscribe(id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let response = store
                .with_auth(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
