// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    modules::{
        error::{code::ErrorCode, BridgeResult},
        identity::VirtualIdentity,
        matrix::{
            appservice::{self, AppserviceState},
            client::{JoinResult, MatrixClient},
            MatrixConfig,
        },
        transport::{ChatTransport, Provisioning, RoomSink},
    },
    raise_error,
};
use async_trait::async_trait;
use lru::LruCache;
use std::{num::NonZeroUsize, sync::Arc};
use tokio::sync::Mutex;
use tracing::{info, warn};

const PROVISIONED_USERS: usize = 4096;

/// Matrix appservice transport.
///
/// Virtual mail users are registered and joined to the room the first time
/// something is posted as them; successful provisioning is remembered for
/// the life of the process.
pub struct MatrixTransport {
    client: Arc<MatrixClient>,
    appservice: Arc<AppserviceState>,
    bot: VirtualIdentity,
    bind_ip: String,
    port: u16,
    provisioned: Mutex<LruCache<String, ()>>,
}

impl MatrixTransport {
    pub fn new(
        config: &MatrixConfig,
        client: Arc<MatrixClient>,
        appservice: Arc<AppserviceState>,
        bot: VirtualIdentity,
    ) -> Self {
        let capacity = NonZeroUsize::new(PROVISIONED_USERS).unwrap_or(NonZeroUsize::MIN);
        Self {
            client,
            appservice,
            bot,
            bind_ip: config.bind_ip.clone(),
            port: config.port,
            provisioned: Mutex::new(LruCache::new(capacity)),
        }
    }

    async fn provision(&self, user: &VirtualIdentity, room_id: &str) -> BridgeResult<()> {
        let user_id = user.user_id();
        if self.provisioned.lock().await.contains(&user_id) {
            return Ok(());
        }
        let outcome = self.ensure_registered(user).await?;
        if outcome == Provisioning::Created {
            info!("Registered virtual user {}", user_id);
        }
        self.join_room(user, room_id).await?;
        self.provisioned.lock().await.put(user_id, ());
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for MatrixTransport {
    async fn register(&self) -> BridgeResult<()> {
        let user_id = self.client.whoami().await?;
        if user_id != self.bot.user_id() {
            warn!(
                "Appservice token belongs to {}, expected {}. Check sender_localpart in the registration file",
                user_id, self.bot
            );
        }
        info!("Appservice credentials accepted for {}", user_id);
        Ok(())
    }

    async fn listen(&self) -> BridgeResult<()> {
        appservice::serve(self.appservice.clone(), &self.bind_ip, self.port).await
    }

    async fn ensure_registered(&self, user: &VirtualIdentity) -> BridgeResult<Provisioning> {
        self.client.register(user.localpart()).await
    }

    async fn join_room(&self, user: &VirtualIdentity, room_id: &str) -> BridgeResult<()> {
        let user_id = user.user_id();
        if self.client.join_room(&user_id, room_id).await? == JoinResult::Joined {
            return Ok(());
        }
        if *user == self.bot {
            return Err(raise_error!(
                format!(
                    "{} is not allowed to join {}. Invite the bot into the room first",
                    user_id, room_id
                ),
                ErrorCode::MatrixJoinFailed
            ));
        }

        // Private rooms need an invite from the bot, which is already a member.
        self.client
            .invite(&self.bot.user_id(), room_id, &user_id)
            .await?;
        match self.client.join_room(&user_id, room_id).await? {
            JoinResult::Joined => Ok(()),
            JoinResult::Forbidden => Err(raise_error!(
                format!("{} could not join {} after invite", user_id, room_id),
                ErrorCode::MatrixJoinFailed
            )),
        }
    }

    async fn send_text(
        &self,
        user: &VirtualIdentity,
        room_id: &str,
        text: &str,
    ) -> BridgeResult<()> {
        self.client
            .send_text(&user.user_id(), room_id, text)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl RoomSink for MatrixTransport {
    async fn send_text(
        &self,
        sender: &VirtualIdentity,
        room_id: &str,
        text: &str,
    ) -> BridgeResult<()> {
        if *sender != self.bot {
            self.provision(sender, room_id).await?;
        }
        ChatTransport::send_text(self, sender, room_id, text).await
    }
}
