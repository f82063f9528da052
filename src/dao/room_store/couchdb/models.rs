use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    dao::models::{GameStateEntity, PlayerEntity, RoomEntity, RoundSummaryEntity},
    scoring::GameType,
    state::round::RoundStatus,
};

use super::error::CouchDaoError;

pub const ROOM_PREFIX: &str = "room::";
pub const ROUND_PREFIX: &str = "round::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub room: RoomBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomBody {
    pub name: String,
    pub password: String,
    pub creator_id: Option<String>,
    pub players: Vec<PlayerEntity>,
    pub game_type: Option<GameType>,
    pub round: u32,
    pub status: RoundStatus,
    pub start_time: Option<SystemTime>,
    pub deadline: Option<SystemTime>,
    pub all_submitted: bool,
    pub version: u64,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoundDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub room_id: Uuid,
    pub summary: RoundSummaryEntity,
}

/// Minimal view used when only the revision matters (deletion).
#[derive(Debug, Clone, Deserialize)]
pub struct CouchRevision {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
}

impl From<(RoomEntity, Option<String>)> for CouchRoomDocument {
    fn from((room, rev): (RoomEntity, Option<String>)) -> Self {
        let state = room.game_state;
        Self {
            id: room_doc_id(room.id),
            rev,
            room: RoomBody {
                name: room.name,
                password: room.password,
                creator_id: room.creator_id,
                players: room.players,
                game_type: state.game_type,
                round: state.round,
                status: state.status,
                start_time: state.start_time,
                deadline: state.deadline,
                all_submitted: room.all_submitted,
                version: room.version,
                created_at: room.created_at,
                updated_at: room.updated_at,
            },
        }
    }
}

impl CouchRoomDocument {
    pub fn try_into_entity(
        self,
        history: Vec<CouchRoundDocument>,
    ) -> Result<RoomEntity, CouchDaoError> {
        let id = parse_room_doc_id(&self.id)?;
        let mut history = history;
        history.sort_by(|a, b| a.id.cmp(&b.id));
        let body = self.room;

        Ok(RoomEntity {
            id,
            name: body.name,
            password: body.password,
            creator_id: body.creator_id,
            players: body.players,
            game_state: GameStateEntity {
                game_type: body.game_type,
                round: body.round,
                status: body.status,
                start_time: body.start_time,
                deadline: body.deadline,
                round_history: history.into_iter().map(|doc| doc.summary).collect(),
            },
            all_submitted: body.all_submitted,
            version: body.version,
            created_at: body.created_at,
            updated_at: body.updated_at,
        })
    }
}

pub fn room_doc_id(id: Uuid) -> String {
    format!("{ROOM_PREFIX}{id}")
}

pub fn round_prefix(room_id: Uuid) -> String {
    format!("{ROUND_PREFIX}{room_id}::")
}

// Zero padded so `_all_docs` returns history in round order.
pub fn round_doc_id(room_id: Uuid, round: u32) -> String {
    format!("{}{round:010}", round_prefix(room_id))
}

fn parse_room_doc_id(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    doc_id
        .strip_prefix(ROOM_PREFIX)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_owned(),
        })
}
