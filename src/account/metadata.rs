//! Instance metadata and custom emojis

use serde_json::Value;

use super::Account;
use crate::error::Result;
use crate::events::{Event, MetadataSource};
use crate::lock::write;
use crate::models::CustomEmoji;

impl Account {
    /// Refresh the instance capabilities and custom emojis.
    ///
    /// The instance document (v2, falling back to v1), nodeinfo and the
    /// emoji table are fetched concurrently. Each one emits its own event as
    /// soon as it is applied, in whatever order they complete. Failures are
    /// logged and leave the previous values in place.
    pub async fn fetch_instance_metadata(&self) {
        write(&self.inner.capabilities).begin_fetch();

        let (instance, node_info, emojis) = tokio::join!(
            self.fetch_instance_document(),
            self.fetch_node_info(),
            self.fetch_custom_emojis(),
        );

        if let Err(e) = instance {
            tracing::warn!("Failed to fetch instance information: {e}");
        }
        if let Err(e) = node_info {
            tracing::debug!("No usable nodeinfo: {e}");
        }
        if let Err(e) = emojis {
            tracing::warn!("Failed to fetch custom emojis: {e}");
        }
    }

    async fn fetch_instance_document(&self) -> Result<()> {
        let json = match self.get(self.api_url("/api/v2/instance")?, false).await {
            Ok(response) => Some(response.json()),
            Err(e) => {
                tracing::debug!("v2 instance endpoint unavailable ({e}); trying v1");
                None
            }
        };

        let (json, source) = match json {
            Some(json) => (json, MetadataSource::InstanceV2),
            None => (
                self.get(self.api_url("/api/v1/instance")?, false).await?.json(),
                MetadataSource::InstanceV1,
            ),
        };

        if !json.is_object() {
            tracing::warn!("instance document from {source:?} is not an object");
            return Ok(());
        }

        write(&self.inner.capabilities).apply_instance(&json, source);
        self.inner.events.emit(Event::InstanceMetadataFetched(source));
        Ok(())
    }

    async fn fetch_node_info(&self) -> Result<()> {
        let json: Value = self.get(self.api_url("/nodeinfo/2.1.json")?, false).await?.json();
        write(&self.inner.capabilities).apply_node_info(&json);
        self.inner
            .events
            .emit(Event::InstanceMetadataFetched(MetadataSource::NodeInfo));
        Ok(())
    }

    /// Replace the custom emoji table
    pub async fn fetch_custom_emojis(&self) -> Result<()> {
        write(&self.inner.custom_emojis).clear();

        let json = self.get(self.api_url("/api/v1/custom_emojis")?, false).await?.json();
        let emojis = CustomEmoji::list_from_json(&json);
        tracing::debug!("{} custom emojis", emojis.len());

        *write(&self.inner.custom_emojis) = emojis;
        self.inner.events.emit(Event::CustomEmojisFetched);
        Ok(())
    }
}
