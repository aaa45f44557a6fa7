//! Default handler chains: store mutations, roll resolution, and history.
//!
//! Store calls are synchronous, so each one runs on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use holotable_core::dice::{self, DicePool};
use holotable_core::{CharacterTrait, Event, EventBody, MessageType, RollResult};
use holotable_store::SessionStore;
use tracing::{debug, info};

use crate::bus::{HandlerError, HistorySink, MessageBus, MessageHandler};

/// Largest count accepted for a single die kind in one roll.
pub const MAX_DICE_PER_KIND: u32 = 100;

type SharedStore = Arc<dyn SessionStore>;

async fn blocking<T, F>(store: &SharedStore, f: F) -> Result<T, HandlerError>
where
    T: Send + 'static,
    F: FnOnce(&dyn SessionStore) -> holotable_store::Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    Ok(tokio::task::spawn_blocking(move || f(store.as_ref())).await??)
}

/// Applies point and character events to the store.
///
/// `PointAdd` is rewritten with the allocated id, `CharacterUpdate` with the
/// stored trait name and value. Other events pass through unchanged.
pub struct StoreHandler {
    store: SharedStore,
}

impl StoreHandler {
    /// Create a handler backed by `store`.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MessageHandler for StoreHandler {
    async fn handle(&self, mut event: Event) -> Result<Event, HandlerError> {
        if event.group_name.is_empty() {
            return Err(HandlerError::InvalidRequest("event has no group".into()));
        }
        let group = event.group_name.clone();
        match &mut event.body {
            EventBody::PointAdd(p) => {
                let is_light = p.is_light;
                let point = blocking(&self.store, move |s| s.add_point(&group, is_light)).await?;
                info!(group = %point.group_name, point_id = point.point_id, is_light, "destiny point added");
                p.point_id = point.point_id;
            }
            EventBody::PointSwitch(p) => {
                let (point_id, is_light) = (p.point_id, p.is_light());
                let _ = blocking(&self.store, move |s| {
                    s.set_point_state(&group, point_id, is_light)
                })
                .await?;
                debug!(point_id, is_light, "destiny point switched");
            }
            EventBody::PointRemove(p) => {
                let point_id = p.point_id;
                blocking(&self.store, move |s| s.remove_point(&group, point_id)).await?;
                debug!(point_id, "destiny point removed");
            }
            EventBody::CharacterCreate(c) => {
                let (name, traits) = (c.char_name.clone(), c.traits.clone());
                let upsert = blocking(&self.store, move |s| {
                    s.upsert_character(&group, &name, &traits)
                })
                .await?;
                debug!(char_name = %c.char_name, ?upsert, "character saved");
            }
            EventBody::CharacterUpdate(c) => {
                let trait_name: CharacterTrait = c.trait_name.parse()?;
                let (name, value) = (c.char_name.clone(), c.trait_value.clone());
                let character = blocking(&self.store, move |s| {
                    s.update_character_trait(&group, &name, trait_name, &value)
                })
                .await?;
                c.trait_name = trait_name.as_str().to_owned();
                c.trait_value = character.traits.get(trait_name);
                debug!(char_name = %c.char_name, trait_name = %c.trait_name, "character updated");
            }
            EventBody::CharacterDelete(c) => {
                let name = c.char_name.clone();
                blocking(&self.store, move |s| s.delete_character(&group, &name)).await?;
                debug!(char_name = %c.char_name, "character deleted");
            }
            EventBody::RollRequest(_) | EventBody::RollResult(_) => {}
        }
        Ok(event)
    }
}

/// Resolves a `RollRequest` into a `RollResult`.
///
/// A request without a character name rolls for its author.
pub struct RollHandler;

impl RollHandler {
    fn validate(pool: &DicePool) -> Result<(), HandlerError> {
        if pool.is_empty() {
            return Err(HandlerError::InvalidRequest("empty dice pool".into()));
        }
        if let Some((kind, count)) = pool.iter().find(|(_, n)| **n > MAX_DICE_PER_KIND) {
            return Err(HandlerError::InvalidRequest(format!(
                "{count} {kind} dice exceeds the limit of {MAX_DICE_PER_KIND}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for RollHandler {
    async fn handle(&self, event: Event) -> Result<Event, HandlerError> {
        let EventBody::RollRequest(request) = event.body else {
            return Ok(event);
        };
        Self::validate(&request.dice_pool)?;
        let char_name = if request.char_name.is_empty() {
            event.author.clone()
        } else {
            request.char_name
        };
        let result = dice::resolve(&request.dice_pool);
        debug!(%char_name, dice = dice::pool_size(&request.dice_pool), "roll resolved");
        Ok(Event {
            body: EventBody::RollResult(RollResult {
                char_name,
                dice_pool: request.dice_pool,
                result,
                comment: request.comment,
            }),
            ..event
        })
    }
}

/// Writes every delivered event to the store's history log.
pub struct StoreHistorySink {
    store: SharedStore,
}

impl StoreHistorySink {
    /// Create a sink backed by `store`.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HistorySink for StoreHistorySink {
    async fn record(&self, event: &Event) -> Result<(), HandlerError> {
        let event = event.clone();
        let row = blocking(&self.store, move |s| s.append_history(&event)).await?;
        debug!(history_id = %row.id, "history recorded");
        Ok(())
    }
}

/// Register the store-backed chains and history sink on `bus`.
///
/// `RollResult` is left unregistered: results only come from
/// resolving a request.
pub fn register_defaults(bus: &mut MessageBus, store: &SharedStore) {
    for message_type in [
        MessageType::PointAdd,
        MessageType::PointSwitch,
        MessageType::PointRemove,
        MessageType::CharacterCreate,
        MessageType::CharacterUpdate,
        MessageType::CharacterDelete,
    ] {
        bus.register_handler(message_type, StoreHandler::new(Arc::clone(store)));
    }
    bus.register_handler(MessageType::RollRequest, RollHandler);
    bus.set_history_sink(StoreHistorySink::new(Arc::clone(store)));
}
