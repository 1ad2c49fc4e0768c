//! Gateway — the main event loop connecting channels, the store, and the
//! conversation state machine.
//!
//! Also owns the reminder scheduler loop: a background task polling the
//! store for due reminders and composing the elapsed-time message at fire
//! time, so it never delivers a stale snapshot.

use crate::conversation::{self, DialogueContext, Session};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use teledate_core::{
    config::{SchedulerConfig, StoreConfig},
    message::{IncomingMessage, OutgoingMessage},
    timefmt,
    traits::Channel,
};
use teledate_store::Store;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The central gateway routing messages between channels and the dialogue.
pub struct Gateway {
    channels: HashMap<String, Arc<dyn Channel>>,
    store: Store,
    store_config: StoreConfig,
    scheduler_config: SchedulerConfig,
    /// Per-sender dialogue sessions, keyed by channel sender id.
    sessions: HashMap<String, Session>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        channels: HashMap<String, Arc<dyn Channel>>,
        store: Store,
        store_config: StoreConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        Self {
            channels,
            store,
            store_config,
            scheduler_config,
            sessions: HashMap::new(),
        }
    }

    /// Run the main event loop until ctrl-c.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!(
            "Teledate gateway running | channels: {} | scheduler: {}",
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
            if self.scheduler_config.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );

        let (tx, mut rx) = mpsc::channel::<IncomingMessage>(256);

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(msg) = channel_rx.recv().await {
                    if tx.send(msg).await.is_err() {
                        info!("gateway receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            });

            info!("Channel started: {name}");
        }

        drop(tx);

        // Spawn the reminder scheduler loop.
        let sched_handle = if self.scheduler_config.enabled {
            let sched_store = self.store.clone();
            let sched_channels = self.channels.clone();
            let poll_secs = self.scheduler_config.poll_interval_secs;
            Some(tokio::spawn(async move {
                Self::scheduler_loop(sched_store, sched_channels, poll_secs).await;
            }))
        } else {
            None
        };

        // Main event loop with graceful shutdown.
        loop {
            tokio::select! {
                Some(incoming) = rx.recv() => {
                    self.handle_message(incoming).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        if let Some(handle) = sched_handle {
            handle.abort();
        }
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("failed to stop channel {name}: {e}");
            }
        }
        Ok(())
    }

    /// Handle one inbound message to completion.
    async fn handle_message(&mut self, incoming: IncomingMessage) {
        let reply_target = incoming
            .reply_target
            .clone()
            .unwrap_or_else(|| incoming.sender_id.clone());
        // Fall back to the numeric sender id when no username is set.
        let username = incoming
            .sender_name
            .clone()
            .unwrap_or_else(|| incoming.sender_id.clone());

        debug!(
            "message from {username} via {}: {:?}",
            incoming.channel, incoming.text
        );

        let session = self.sessions.entry(incoming.sender_id.clone()).or_default();
        let ctx = DialogueContext {
            store: &self.store,
            username: &username,
            channel: &incoming.channel,
            reply_target: &reply_target,
            user_limit: self.store_config.user_limit,
            records_limit: self.store_config.records_limit,
        };

        let reply = conversation::handle(session, &incoming.text, &ctx).await;
        let ended = reply.end;

        let Some(channel) = self.channels.get(&incoming.channel) else {
            warn!("no channel '{}' to reply through", incoming.channel);
            return;
        };

        if let Some((png, caption)) = reply.photo {
            if let Err(e) = channel.send_photo(&reply_target, &png, &caption).await {
                error!("failed to send photo: {e}");
            }
        }

        if !reply.text.is_empty() {
            let outgoing = OutgoingMessage {
                text: reply.text,
                reply_target: Some(reply_target),
                keyboard: reply.keyboard,
            };
            if let Err(e) = channel.send(outgoing).await {
                error!("failed to send reply: {e}");
            }
        }

        if ended {
            self.sessions.remove(&incoming.sender_id);
        }
    }

    /// Background task: deliver due reminders.
    ///
    /// The message is computed from the current last record at fire time;
    /// a due reminder whose user has no records is advanced silently.
    async fn scheduler_loop(
        store: Store,
        channels: HashMap<String, Arc<dyn Channel>>,
        poll_secs: u64,
    ) {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(poll_secs)).await;

            let due = match store.get_due_reminders().await {
                Ok(due) => due,
                Err(e) => {
                    error!("scheduler: failed to get due reminders: {e}");
                    continue;
                }
            };

            for reminder in due {
                let now = Utc::now().naive_utc();

                match store.get_last_user_record(reminder.user_id).await {
                    Ok(Some(last)) => {
                        let msg = OutgoingMessage {
                            text: format!(
                                "*{}*\n\n`{}`\nSince the last record",
                                reminder.activity,
                                timefmt::format_elapsed(last, now)
                            ),
                            reply_target: Some(reminder.reply_target.clone()),
                            keyboard: None,
                        };

                        if let Some(ch) = channels.get(&reminder.channel) {
                            if let Err(e) = ch.send(msg).await {
                                error!(
                                    "failed to deliver reminder for user {}: {e}",
                                    reminder.user_id
                                );
                                continue;
                            }
                            info!("delivered reminder for user {}", reminder.user_id);
                        } else {
                            warn!(
                                "scheduler: no channel '{}' for user {}",
                                reminder.channel, reminder.user_id
                            );
                            continue;
                        }
                    }
                    Ok(None) => {
                        debug!(
                            "scheduler: user {} has no records, skipping delivery",
                            reminder.user_id
                        );
                    }
                    Err(e) => {
                        error!("scheduler: last record lookup failed: {e}");
                        continue;
                    }
                }

                if let Err(e) = store.advance_reminder(reminder.user_id, now).await {
                    error!(
                        "failed to advance reminder for user {}: {e}",
                        reminder.user_id
                    );
                }
            }
        }
    }
}
