use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::{
    errors::RoomError,
    models::{MembershipModel, RoomModel},
};
use crate::db::is_unique_violation;
use crate::invite::{
    models::InviteModel,
    repository::{store_invite_use, InviteRepository},
};
use crate::shared::AppError;
use crate::speaking::{
    models::SpeakingRequestModel,
    repository::{store_request_status, SpeakingRequestRepository},
};

/// Storage for rooms and the memberships they own.
///
/// Writes that change occupancy go through `create_room`, `admit_member` and
/// `release_member`, each of which stores everything it is given or nothing.
#[async_trait]
pub trait RoomRepository {
    /// Stores the room together with its owner's membership
    async fn create_room(&self, room: &RoomModel, owner: &MembershipModel)
        -> Result<(), AppError>;
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError>;

    /// Active public rooms, newest first
    async fn list_public_active_rooms(&self) -> Result<Vec<RoomModel>, AppError>;

    /// Stores a new membership, the room with its updated occupancy and the
    /// invite the join consumed. Fails with `AppError::Conflict` if the account
    /// already has a membership in the room.
    async fn admit_member(
        &self,
        room: &RoomModel,
        membership: &MembershipModel,
        consumed_invite: Option<&InviteModel>,
    ) -> Result<(), AppError>;

    async fn get_membership(
        &self,
        room_id: &str,
        account_id: &str,
    ) -> Result<Option<MembershipModel>, AppError>;
    async fn update_membership(&self, membership: &MembershipModel) -> Result<(), AppError>;

    /// Deletes the membership and stores the room's new state along with the
    /// member's closed speaking request. Returns false, writing nothing, when
    /// there was no membership.
    async fn release_member(
        &self,
        room: &RoomModel,
        account_id: &str,
        closed_request: Option<&SpeakingRequestModel>,
    ) -> Result<bool, AppError>;

    /// Memberships of a room in join order
    async fn list_memberships(&self, room_id: &str) -> Result<Vec<MembershipModel>, AppError>;
}

/// Loads a room or fails with `RoomNotFound`
pub async fn find_room(
    rooms: &(dyn RoomRepository + Send + Sync),
    room_id: &str,
) -> Result<RoomModel, AppError> {
    rooms
        .get_room(room_id)
        .await?
        .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()).into())
}

/// Loads a membership or fails with `NotMember`
pub async fn find_membership(
    rooms: &(dyn RoomRepository + Send + Sync),
    room_id: &str,
    account_id: &str,
) -> Result<MembershipModel, AppError> {
    rooms
        .get_membership(room_id, account_id)
        .await?
        .ok_or_else(|| RoomError::NotMember.into())
}

/// In-memory implementation of RoomRepository for development and testing.
///
/// Invite and request updates that belong to a join or leave are written to
/// the stores it was built with.
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<String, RoomModel>>,
    // (room_id, account_id) -> membership
    memberships: RwLock<HashMap<(String, String), MembershipModel>>,
    invites: Arc<dyn InviteRepository + Send + Sync>,
    requests: Arc<dyn SpeakingRequestRepository + Send + Sync>,
}

impl InMemoryRoomRepository {
    pub fn new(
        invites: Arc<dyn InviteRepository + Send + Sync>,
        requests: Arc<dyn SpeakingRequestRepository + Send + Sync>,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            memberships: RwLock::new(HashMap::new()),
            invites,
            requests,
        }
    }
}

fn membership_key(room_id: &str, account_id: &str) -> (String, String) {
    (room_id.to_string(), account_id.to_string())
}

fn room_missing(room_id: &str) -> AppError {
    warn!(room_id = %room_id, "Room not found for update in memory");
    AppError::NotFound("Room not found".to_string())
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room, owner))]
    async fn create_room(
        &self,
        room: &RoomModel,
        owner: &MembershipModel,
    ) -> Result<(), AppError> {
        debug!(room_id = %room.id, owner_id = %room.owner_id, "Creating room in memory");

        let mut rooms = self.rooms.write().await;
        let mut memberships = self.memberships.write().await;
        if rooms.contains_key(&room.id) {
            warn!(room_id = %room.id, "Room already exists in memory");
            return Err(AppError::DatabaseError("Room already exists".to_string()));
        }
        rooms.insert(room.id.clone(), room.clone());
        memberships.insert(membership_key(&owner.room_id, &owner.account_id), owner.clone());

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(room_id).cloned();

        if room.is_none() {
            debug!(room_id = %room_id, "Room not found in memory");
        }

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn list_public_active_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let rooms = self.rooms.read().await;
        let mut listed: Vec<RoomModel> = rooms
            .values()
            .filter(|room| room.is_public && room.is_active)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        debug!(room_count = listed.len(), "Listed public rooms from memory");
        Ok(listed)
    }

    #[instrument(skip(self, room, membership, consumed_invite))]
    async fn admit_member(
        &self,
        room: &RoomModel,
        membership: &MembershipModel,
        consumed_invite: Option<&InviteModel>,
    ) -> Result<(), AppError> {
        debug!(
            room_id = %membership.room_id,
            account_id = %membership.account_id,
            "Admitting member in memory"
        );

        let mut rooms = self.rooms.write().await;
        let mut memberships = self.memberships.write().await;

        let key = membership_key(&membership.room_id, &membership.account_id);
        if memberships.contains_key(&key) {
            return Err(AppError::Conflict("Membership already exists".to_string()));
        }
        let stored_room = rooms.get_mut(&room.id).ok_or_else(|| room_missing(&room.id))?;

        // The only write that can still fail goes first
        if let Some(invite) = consumed_invite {
            self.invites.update_invite(invite).await?;
        }
        *stored_room = room.clone();
        memberships.insert(key, membership.clone());

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_membership(
        &self,
        room_id: &str,
        account_id: &str,
    ) -> Result<Option<MembershipModel>, AppError> {
        let memberships = self.memberships.read().await;
        Ok(memberships
            .get(&membership_key(room_id, account_id))
            .cloned())
    }

    #[instrument(skip(self, membership))]
    async fn update_membership(&self, membership: &MembershipModel) -> Result<(), AppError> {
        let mut memberships = self.memberships.write().await;
        match memberships.get_mut(&membership_key(&membership.room_id, &membership.account_id)) {
            Some(stored) => {
                *stored = membership.clone();
                Ok(())
            }
            None => {
                warn!(
                    room_id = %membership.room_id,
                    account_id = %membership.account_id,
                    "Membership not found for update in memory"
                );
                Err(AppError::NotFound("Membership not found".to_string()))
            }
        }
    }

    #[instrument(skip(self, room, closed_request))]
    async fn release_member(
        &self,
        room: &RoomModel,
        account_id: &str,
        closed_request: Option<&SpeakingRequestModel>,
    ) -> Result<bool, AppError> {
        let mut rooms = self.rooms.write().await;
        let mut memberships = self.memberships.write().await;

        let key = membership_key(&room.id, account_id);
        if !memberships.contains_key(&key) {
            return Ok(false);
        }
        let stored_room = rooms.get_mut(&room.id).ok_or_else(|| room_missing(&room.id))?;

        if let Some(request) = closed_request {
            self.requests.update_request(request).await?;
        }
        *stored_room = room.clone();
        memberships.remove(&key);

        Ok(true)
    }

    #[instrument(skip(self))]
    async fn list_memberships(&self, room_id: &str) -> Result<Vec<MembershipModel>, AppError> {
        let memberships = self.memberships.read().await;
        let mut listed: Vec<MembershipModel> = memberships
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(listed)
    }
}

/// PostgreSQL implementation of room repository
pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ROOM_COLUMNS: &str = "id, name, description, is_public, max_participants, \
     current_participants, is_active, owner_id, conference_id, created_at";

const MEMBERSHIP_COLUMNS: &str =
    "id, account_id, room_id, can_speak, is_speaking, is_muted, is_moderator, joined_at";

async fn insert_membership(
    conn: &mut PgConnection,
    membership: &MembershipModel,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO room_members (id, account_id, room_id, can_speak, is_speaking, \
         is_muted, is_moderator, joined_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&membership.id)
    .bind(&membership.account_id)
    .bind(&membership.room_id)
    .bind(membership.can_speak)
    .bind(membership.is_speaking)
    .bind(membership.is_muted)
    .bind(membership.is_moderator)
    .bind(membership.joined_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Membership already exists".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    Ok(())
}

async fn store_room_state(conn: &mut PgConnection, room: &RoomModel) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE rooms SET name = $2, description = $3, is_public = $4, \
         max_participants = $5, current_participants = $6, is_active = $7 WHERE id = $1",
    )
    .bind(&room.id)
    .bind(&room.name)
    .bind(&room.description)
    .bind(room.is_public)
    .bind(room.max_participants)
    .bind(room.current_participants)
    .bind(room.is_active)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        warn!(room_id = %room.id, "Room not found for update");
        return Err(AppError::NotFound("Room not found".to_string()));
    }
    Ok(())
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self, room, owner))]
    async fn create_room(
        &self,
        room: &RoomModel,
        owner: &MembershipModel,
    ) -> Result<(), AppError> {
        debug!(room_id = %room.id, owner_id = %room.owner_id, "Creating room in database");

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO rooms (id, name, description, is_public, max_participants, \
             current_participants, is_active, owner_id, conference_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&room.id)
        .bind(&room.name)
        .bind(&room.description)
        .bind(room.is_public)
        .bind(room.max_participants)
        .bind(room.current_participants)
        .bind(room.is_active)
        .bind(&room.owner_id)
        .bind(&room.conference_id)
        .bind(room.created_at)
        .execute(&mut *tx)
        .await?;
        insert_membership(&mut tx, owner).await?;
        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        let room = sqlx::query_as::<_, RoomModel>(&format!(
            "SELECT {} FROM rooms WHERE id = $1",
            ROOM_COLUMNS
        ))
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn list_public_active_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let rooms = sqlx::query_as::<_, RoomModel>(&format!(
            "SELECT {} FROM rooms WHERE is_public AND is_active ORDER BY created_at DESC",
            ROOM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(room_count = rooms.len(), "Listed public rooms from database");
        Ok(rooms)
    }

    #[instrument(skip(self, room, membership, consumed_invite))]
    async fn admit_member(
        &self,
        room: &RoomModel,
        membership: &MembershipModel,
        consumed_invite: Option<&InviteModel>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        insert_membership(&mut tx, membership).await?;
        store_room_state(&mut tx, room).await?;
        if let Some(invite) = consumed_invite {
            store_invite_use(&mut tx, invite).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_membership(
        &self,
        room_id: &str,
        account_id: &str,
    ) -> Result<Option<MembershipModel>, AppError> {
        let membership = sqlx::query_as::<_, MembershipModel>(&format!(
            "SELECT {} FROM room_members WHERE room_id = $1 AND account_id = $2",
            MEMBERSHIP_COLUMNS
        ))
        .bind(room_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    #[instrument(skip(self, membership))]
    async fn update_membership(&self, membership: &MembershipModel) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE room_members SET can_speak = $3, is_speaking = $4, is_muted = $5, \
             is_moderator = $6 WHERE room_id = $1 AND account_id = $2",
        )
        .bind(&membership.room_id)
        .bind(&membership.account_id)
        .bind(membership.can_speak)
        .bind(membership.is_speaking)
        .bind(membership.is_muted)
        .bind(membership.is_moderator)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Membership not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, room, closed_request))]
    async fn release_member(
        &self,
        room: &RoomModel,
        account_id: &str,
        closed_request: Option<&SpeakingRequestModel>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let deleted =
            sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND account_id = $2")
                .bind(&room.id)
                .bind(account_id)
                .execute(&mut *tx)
                .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        store_room_state(&mut tx, room).await?;
        if let Some(request) = closed_request {
            store_request_status(&mut tx, request).await?;
        }
        tx.commit().await?;

        Ok(true)
    }

    #[instrument(skip(self))]
    async fn list_memberships(&self, room_id: &str) -> Result<Vec<MembershipModel>, AppError> {
        let memberships = sqlx::query_as::<_, MembershipModel>(&format!(
            "SELECT {} FROM room_members WHERE room_id = $1 ORDER BY joined_at",
            MEMBERSHIP_COLUMNS
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }
}
