use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{GameStateEntity, PlayerEntity, RoomEntity, RoundSummaryEntity},
    scoring::GameType,
    state::round::RoundStatus,
};

use super::error::MongoDaoError;

/// Room document; the round history lives in its own collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub password: String,
    pub creator_id: Option<String>,
    pub players: Vec<PlayerEntity>,
    pub game_type: Option<GameType>,
    pub round: u32,
    pub status: RoundStatus,
    pub start_time: Option<DateTime>,
    pub deadline: Option<DateTime>,
    pub all_submitted: bool,
    pub version: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// One entry of a room's round history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoundDocument {
    pub room_id: String,
    pub round: u32,
    pub summary: RoundSummaryEntity,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        let state = value.game_state;
        Self {
            id: value.id.to_string(),
            name: value.name,
            password: value.password,
            creator_id: value.creator_id,
            players: value.players,
            game_type: state.game_type,
            round: state.round,
            status: state.status,
            start_time: state.start_time.map(DateTime::from_system_time),
            deadline: state.deadline.map(DateTime::from_system_time),
            all_submitted: value.all_submitted,
            version: version_to_bson(value.version),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl MongoRoomDocument {
    /// Rebuild the entity, attaching the separately stored history.
    pub fn try_into_entity(
        self,
        history: Vec<MongoRoundDocument>,
    ) -> Result<RoomEntity, MongoDaoError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|_| MongoDaoError::MalformedDocument { id: self.id.clone() })?;
        let mut history = history;
        history.sort_by_key(|entry| entry.round);

        Ok(RoomEntity {
            id,
            name: self.name,
            password: self.password,
            creator_id: self.creator_id,
            players: self.players,
            game_state: GameStateEntity {
                game_type: self.game_type,
                round: self.round,
                status: self.status,
                start_time: self.start_time.map(|dt| dt.to_system_time()),
                deadline: self.deadline.map(|dt| dt.to_system_time()),
                round_history: history.into_iter().map(|entry| entry.summary).collect(),
            },
            all_submitted: self.all_submitted,
            version: u64::try_from(self.version).unwrap_or_default(),
            created_at: self.created_at.to_system_time(),
            updated_at: self.updated_at.to_system_time(),
        })
    }
}

pub fn version_to_bson(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

pub fn room_filter(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

pub fn room_version_filter(id: Uuid, version: u64) -> Document {
    doc! { "_id": id.to_string(), "version": version_to_bson(version) }
}

pub fn history_filter(id: Uuid) -> Document {
    doc! { "room_id": id.to_string() }
}

pub fn round_filter(id: Uuid, round: u32) -> Document {
    doc! { "room_id": id.to_string(), "round": i64::from(round) }
}
