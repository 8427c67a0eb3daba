//! Reaction writes through a [`StoreRegistry`].

use causa_core::{EventMetadata, EventSource, StateValue, StoreRegistry, WriteOptions};
use tracing::debug;

use crate::error::{ReactionError, Result};
use crate::execute::{conversion_error, ReactionContext, ReactionMeta};

impl<T: StateValue> ReactionContext for StoreRegistry<T> {
    /// Converts `value` into the registry's value type and records it on the
    /// target store as a `law-reaction` write.
    fn set_state(&self, key: &str, value: serde_json::Value, meta: ReactionMeta) -> Result<String> {
        let handle = self.require(key).map_err(|e| ReactionError::Apply {
            target: key.to_string(),
            message: e.to_string(),
        })?;
        let value: T = serde_json::from_value(value).map_err(|e| conversion_error(key, e))?;

        let mut metadata = EventMetadata::from_source(EventSource::LawReaction)
            .with_tag("law", meta.law.as_str())
            .with_tag("sourceStore", meta.source_store.as_str());
        if let Some(event) = meta.source_event {
            metadata = metadata.with_tag("sourceEvent", event);
        }

        let event_id = handle.lock().set_with(
            value,
            WriteOptions {
                metadata,
                observer_id: None,
            },
        );
        debug!("Law '{}' wrote reaction event {} to '{}'", meta.law, event_id, key);
        Ok(event_id)
    }
}
