use crate::channel::events::IbcEvent;
use crate::channel::registry::ChannelRegistry;
use crate::store::KvStore;

/// Transaction-scoped execution context.
///
/// Every keeper operation receives one of these by mutable reference. The
/// store is usually a [`crate::store::CacheStore`] committed on success;
/// events accumulate here until the host drains them.
pub struct Context<'a> {
    store: &'a mut dyn KvStore,
    events: Vec<IbcEvent>,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a mut dyn KvStore) -> Self {
        Self {
            store,
            events: Vec::new(),
        }
    }

    pub fn store(&self) -> &dyn KvStore {
        &*self.store
    }

    /// Typed view over the channel keys of this context's store.
    pub fn registry(&mut self) -> ChannelRegistry<'_> {
        ChannelRegistry::new(&mut *self.store)
    }

    pub fn emit(&mut self, event: IbcEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[IbcEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<IbcEvent> {
        std::mem::take(&mut self.events)
    }
}
