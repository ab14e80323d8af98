use std::collections::HashMap;
use std::sync::Arc;

use audiorooms::{
    account::types::RegisterRequest,
    room::types::RoomCreateRequest,
    shared::{AppState, Stores},
    telephony::DisabledTelephony,
    websockets::{HandlerOutcome, MessageHandler, WebsocketReceiveHandler},
    AppConfig, AppError,
};
use serde_json::{json, Value};

use super::mocks::MockConnectionManager;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub state: AppState,
    pub mock_conn_manager: Arc<MockConnectionManager>,
    pub input_handler: WebsocketReceiveHandler,
    pub room_id: String,
    /// username -> account id
    pub accounts: HashMap<String, String>,
    /// Owner first, then the other members in join order
    pub members: Vec<String>,
}

pub struct TestSetupBuilder {
    members: Vec<String>,
    capacity: i32,
    is_public: bool,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            members: vec![],
            capacity: 10,
            is_public: true,
        }
    }

    /// The first name owns the room, the others join it
    pub fn with_members(mut self, members: Vec<&str>) -> Self {
        self.members = members.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_capacity(mut self, capacity: i32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    pub async fn build(self) -> TestSetup {
        let mock_conn_manager = Arc::new(MockConnectionManager::new());
        let state = AppState::new(
            &AppConfig::default(),
            Stores::in_memory(),
            Arc::new(DisabledTelephony),
            mock_conn_manager.clone(),
        );
        let input_handler = WebsocketReceiveHandler::new(
            Arc::clone(&state.room_service),
            Arc::clone(&state.speaking_service),
        );

        let mut setup = TestSetup {
            state,
            mock_conn_manager,
            input_handler,
            room_id: String::new(),
            accounts: HashMap::new(),
            members: self.members.clone(),
        };

        for username in &self.members {
            setup.register(username).await;
        }

        let owner = self.members.first().expect("a room needs an owner");
        let room = setup
            .state
            .room_service
            .create_room(
                &setup.id(owner),
                RoomCreateRequest {
                    name: "Test room".to_string(),
                    description: None,
                    is_public: self.is_public,
                    max_participants: self.capacity,
                },
            )
            .await
            .unwrap();
        setup.room_id = room.id;

        if self.is_public {
            for username in self.members.iter().skip(1) {
                setup.join(username).await.unwrap();
            }
        }

        setup
            .state
            .subscriptions
            .ensure_started(&setup.room_id)
            .await;
        for username in &self.members {
            setup.connect(username).await;
        }

        setup
    }
}

impl TestSetup {
    pub fn id(&self, username: &str) -> String {
        self.accounts
            .get(username)
            .cloned()
            .unwrap_or_else(|| panic!("unknown account {}", username))
    }

    pub async fn register(&mut self, username: &str) -> String {
        let auth = self
            .state
            .account_service
            .register(RegisterRequest {
                username: username.to_string(),
                display_name: None,
                email: None,
                bio: None,
            })
            .await
            .unwrap();
        self.accounts
            .insert(username.to_string(), auth.account.id.clone());
        auth.account.id
    }

    pub async fn join(&self, username: &str) -> Result<(), AppError> {
        self.join_with_code(username, None).await
    }

    pub async fn join_with_code(&self, username: &str, code: Option<&str>) -> Result<(), AppError> {
        self.state
            .room_service
            .join_room(&self.id(username), &self.room_id, code)
            .await
            .map(|_| ())
    }

    /// Registers the account's socket for room pushes
    pub async fn connect(&self, username: &str) {
        self.mock_conn_manager
            .connect(&self.room_id, &self.id(username))
            .await;
    }

    /// Feeds a client message through the socket message handler
    pub async fn send(
        &self,
        username: &str,
        message_type: &str,
    ) -> Result<HandlerOutcome, AppError> {
        self.send_with(username, message_type, json!({})).await
    }

    pub async fn send_with(
        &self,
        username: &str,
        message_type: &str,
        payload: Value,
    ) -> Result<HandlerOutcome, AppError> {
        let message = json!({ "type": message_type, "payload": payload }).to_string();
        self.input_handler
            .handle_message(&self.id(username), &self.room_id, message)
            .await
    }
}
