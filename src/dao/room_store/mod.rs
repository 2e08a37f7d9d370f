pub mod mongodb;

use crate::dao::models::{RoomEntity, UserEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for room documents and user lookups.
pub trait RoomStore: Send + Sync {
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
