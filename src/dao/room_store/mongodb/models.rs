use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{AttemptEntity, MemberEntity, RoomEntity, UserEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    private: bool,
    access_code: String,
    password_hash: Option<String>,
    event: String,
    admin_id: Option<Uuid>,
    members: Vec<MongoMemberRecord>,
    attempts: Vec<AttemptEntity>,
    created_at: DateTime,
    updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMemberRecord {
    user: UserEntity,
    joined_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            private: value.private,
            access_code: value.access_code,
            password_hash: value.password_hash,
            event: value.event,
            admin_id: value.admin_id,
            members: value
                .members
                .into_iter()
                .map(|member| MongoMemberRecord {
                    user: member.user,
                    joined_at: DateTime::from_system_time(member.joined_at),
                })
                .collect(),
            attempts: value.attempts,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            private: value.private,
            access_code: value.access_code,
            password_hash: value.password_hash,
            event: value.event,
            admin_id: value.admin_id,
            members: value
                .members
                .into_iter()
                .map(|member| MemberEntity {
                    user: member.user,
                    joined_at: member.joined_at.to_system_time(),
                })
                .collect(),
            attempts: value.attempts,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar_url: value.avatar_url,
        }
    }
}

fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
