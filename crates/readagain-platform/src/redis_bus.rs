use anyhow::{Context, Result};
use redis::{AsyncCommands, Client, aio::PubSub};
use serde::Serialize;
use tracing::debug;

use crate::contracts::PayoutRequestedEvent;
use crate::{ORDERS_COMPLETED_CHANNEL, PAYOUTS_REQUESTED_CHANNEL};

/// Pub/sub link between the ledger services and the rest of the platform.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
}

impl RedisBus {
    pub fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("invalid REDIS_URL")?;
        Ok(Self { client })
    }

    pub async fn publish_json<T: Serialize>(&self, channel: &str, payload: &T) -> Result<()> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(payload)?;
        let receivers: i64 = connection.publish(channel, serialized).await?;
        debug!("published to {channel} ({receivers} receivers)");
        Ok(())
    }

    pub async fn publish_payout_requested(&self, event: &PayoutRequestedEvent) -> Result<()> {
        self.publish_json(PAYOUTS_REQUESTED_CHANNEL, event).await
    }

    /// Opens a dedicated connection subscribed to completed-order events.
    pub async fn subscribe_orders_completed(&self) -> Result<PubSub> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(ORDERS_COMPLETED_CHANNEL).await?;
        Ok(pubsub)
    }
}
