//! Test infrastructure: an in-memory gateway with scripted channels,
//! messages and failures, recording everything the bot sends.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::gateway::{
    Account, Author, ChannelRef, Gateway, GatewayError, IncomingMessage, MessageEcho,
};

#[derive(Default)]
struct FakeState {
    channels: Vec<ChannelRef>,
    channel_failure: Option<GatewayError>,
    messages: HashMap<String, Vec<IncomingMessage>>,
    message_failures: HashMap<String, GatewayError>,
    send_failure: Option<GatewayError>,
    sent: Vec<(String, String)>,
    edited: Vec<(String, String, String)>,
    deleted: Vec<(String, String)>,
    channel_fetches: usize,
    next_id: u64,
}

pub struct FakeGateway {
    account: Account,
    state: Mutex<FakeState>,
}

impl FakeGateway {
    /// Gateway whose authenticated account has id `self_id`
    pub fn new(self_id: &str) -> Self {
        Self {
            account: Account {
                id: self_id.to_string(),
                username: "selfbot".to_string(),
                discriminator: "0".to_string(),
                verified: true,
            },
            state: Mutex::new(FakeState {
                next_id: 10_000,
                ..FakeState::default()
            }),
        }
    }

    pub fn account(&self) -> Account {
        self.account.clone()
    }

    /// Set the channel list and the newest-first messages of each channel
    pub fn set_inbox(&self, inbox: &[(&str, Vec<IncomingMessage>)]) {
        let mut state = self.state.lock().unwrap();
        state.channels = inbox
            .iter()
            .map(|(id, _)| ChannelRef { id: id.to_string() })
            .collect();
        state.messages = inbox
            .iter()
            .map(|(id, msgs)| (id.to_string(), msgs.clone()))
            .collect();
    }

    pub fn fail_channels(&self, error: Option<GatewayError>) {
        self.state.lock().unwrap().channel_failure = error;
    }

    pub fn fail_messages(&self, channel_id: &str, error: GatewayError) {
        self.state
            .lock()
            .unwrap()
            .message_failures
            .insert(channel_id.to_string(), error);
    }

    pub fn fail_sends(&self, error: Option<GatewayError>) {
        self.state.lock().unwrap().send_failure = error;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn edited(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().edited.clone()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn channel_fetches(&self) -> usize {
        self.state.lock().unwrap().channel_fetches
    }
}

/// Build a message as the gateway would return it
pub fn incoming(id: &str, channel_id: &str, author_id: &str, content: &str) -> IncomingMessage {
    IncomingMessage {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        author: Author {
            id: author_id.to_string(),
            username: format!("user{}", author_id),
            discriminator: "0".to_string(),
        },
        content: content.to_string(),
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn current_account(&self) -> Result<Account, GatewayError> {
        Ok(self.account.clone())
    }

    async fn list_direct_channels(&self) -> Result<Vec<ChannelRef>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.channel_fetches += 1;
        if let Some(err) = &state.channel_failure {
            return Err(err.clone());
        }
        Ok(state.channels.clone())
    }

    async fn list_recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<IncomingMessage>, GatewayError> {
        let state = self.state.lock().unwrap();
        if let Some(err) = state.message_failures.get(channel_id) {
            return Err(err.clone());
        }
        Ok(state
            .messages
            .get(channel_id)
            .map(|msgs| msgs.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<MessageEcho, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = &state.send_failure {
            return Err(err.clone());
        }
        state.next_id += 1;
        let id = state.next_id.to_string();
        state
            .sent
            .push((channel_id.to_string(), content.to_string()));
        Ok(MessageEcho {
            id,
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        })
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<MessageEcho, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.edited.push((
            channel_id.to_string(),
            message_id.to_string(),
            content.to_string(),
        ));
        Ok(MessageEcho {
            id: message_id.to_string(),
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        })
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), GatewayError> {
        self.state
            .lock()
            .unwrap()
            .deleted
            .push((channel_id.to_string(), message_id.to_string()));
        Ok(())
    }
}
