use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    generator::InviteCodeGenerator,
    models::InviteModel,
    repository::{InviteInsert, InviteRepository},
    types::InviteResponse,
};
use crate::room::{
    errors::RoomError,
    locks::RoomLocks,
    permissions,
    repository::{find_room, RoomRepository},
};
use crate::shared::AppError;

/// Attempts at drawing an unused code before giving up
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// Issues single-use invite codes for rooms
pub struct InviteService {
    rooms: Arc<dyn RoomRepository + Send + Sync>,
    invites: Arc<dyn InviteRepository + Send + Sync>,
    locks: RoomLocks,
    generator: Arc<dyn InviteCodeGenerator>,
}

impl InviteService {
    pub fn new(
        rooms: Arc<dyn RoomRepository + Send + Sync>,
        invites: Arc<dyn InviteRepository + Send + Sync>,
        locks: RoomLocks,
        generator: Arc<dyn InviteCodeGenerator>,
    ) -> Self {
        Self {
            rooms,
            invites,
            locks,
            generator,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_invite(
        &self,
        actor_id: &str,
        room_id: &str,
    ) -> Result<InviteResponse, AppError> {
        let _guard = self.locks.acquire(room_id).await;

        let room = find_room(self.rooms.as_ref(), room_id).await?;
        permissions::ensure_owner(&room, actor_id, "create invites")?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let invite = InviteModel::new(
                room_id.to_string(),
                self.generator.generate(),
                actor_id.to_string(),
            );

            match self.invites.create_invite(&invite).await? {
                InviteInsert::Created => {
                    info!(invite_id = %invite.id, attempt, "Invite created");
                    return Ok(invite.into());
                }
                InviteInsert::CodeTaken => {
                    warn!(attempt, "Invite code already taken, drawing another");
                }
            }
        }

        Err(RoomError::InviteCodeExhausted.into())
    }

    /// Invites of the room, newest first. Owner only.
    #[instrument(skip(self))]
    pub async fn list_invites(
        &self,
        actor_id: &str,
        room_id: &str,
    ) -> Result<Vec<InviteResponse>, AppError> {
        let room = find_room(self.rooms.as_ref(), room_id).await?;
        permissions::ensure_owner(&room, actor_id, "view invites")?;

        let invites = self.invites.list_invites(room_id).await?;
        Ok(invites.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invite::{
        generator::{is_well_formed, RandomInviteCodeGenerator},
        repository::InMemoryInviteRepository,
    };
    use crate::room::{
        models::{MembershipModel, RoomModel},
        repository::InMemoryRoomRepository,
    };
    use crate::speaking::repository::InMemorySpeakingRequestRepository;
    use std::sync::Mutex;

    /// Hands out a fixed sequence of codes, repeating the last one
    struct ScriptedGenerator {
        codes: Mutex<Vec<&'static str>>,
    }

    impl ScriptedGenerator {
        fn new(mut codes: Vec<&'static str>) -> Self {
            codes.reverse();
            Self {
                codes: Mutex::new(codes),
            }
        }
    }

    impl InviteCodeGenerator for ScriptedGenerator {
        fn generate(&self) -> String {
            let mut codes = self.codes.lock().unwrap();
            if codes.len() > 1 {
                codes.pop().unwrap().to_string()
            } else {
                codes[0].to_string()
            }
        }
    }

    async fn setup(generator: Arc<dyn InviteCodeGenerator>) -> (InviteService, RoomModel) {
        let invites = Arc::new(InMemoryInviteRepository::new());
        let rooms = Arc::new(InMemoryRoomRepository::new(
            invites.clone(),
            Arc::new(InMemorySpeakingRequestRepository::new()),
        ));
        let room = RoomModel::new("owner".to_string(), "Board".to_string(), None, false, 10);
        rooms
            .create_room(&room, &MembershipModel::owner("owner".to_string(), room.id.clone()))
            .await
            .unwrap();

        let service = InviteService::new(
            rooms,
            invites,
            RoomLocks::new(),
            generator,
        );
        (service, room)
    }

    #[tokio::test]
    async fn test_owner_creates_unused_invite() {
        let (service, room) = setup(Arc::new(RandomInviteCodeGenerator)).await;

        let invite = service.create_invite("owner", &room.id).await.unwrap();
        assert!(is_well_formed(&invite.code));
        assert!(!invite.is_used);
        assert_eq!(invite.created_by, "owner");

        let listed = service.list_invites("owner", &room.id).await.unwrap();
        assert_eq!(listed, vec![invite]);
    }

    #[tokio::test]
    async fn test_non_owner_cannot_issue_or_list() {
        let (service, room) = setup(Arc::new(RandomInviteCodeGenerator)).await;

        let err = service.create_invite("guest", &room.id).await.unwrap_err();
        assert!(matches!(err, AppError::Room(RoomError::Forbidden(_))));
        let err = service.list_invites("guest", &room.id).await.unwrap_err();
        assert!(matches!(err, AppError::Room(RoomError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_collision_draws_a_new_code() {
        let generator = ScriptedGenerator::new(vec!["AAAAAAAA", "AAAAAAAA", "BBBBBBBB"]);
        let (service, room) = setup(Arc::new(generator)).await;

        let first = service.create_invite("owner", &room.id).await.unwrap();
        let second = service.create_invite("owner", &room.id).await.unwrap();
        assert_eq!(first.code, "AAAAAAAA");
        assert_eq!(second.code, "BBBBBBBB");
    }

    #[tokio::test]
    async fn test_gives_up_after_repeated_collisions() {
        let generator = ScriptedGenerator::new(vec!["AAAAAAAA"]);
        let (service, room) = setup(Arc::new(generator)).await;

        service.create_invite("owner", &room.id).await.unwrap();
        let err = service.create_invite("owner", &room.id).await.unwrap_err();
        assert!(matches!(err, AppError::Room(RoomError::InviteCodeExhausted)));
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let (service, _) = setup(Arc::new(RandomInviteCodeGenerator)).await;
        let err = service.create_invite("owner", "missing").await.unwrap_err();
        assert!(matches!(err, AppError::Room(RoomError::RoomNotFound(_))));
    }
}
