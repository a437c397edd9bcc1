use crate::protocol::message::Inbound;
use crate::protocol::opcodes::MessageKind;
use std::collections::HashMap;
use std::time::Instant;

/// Handler invoked with the owning machine and a decoded message.
pub type HandlerFn<M> = fn(&mut M, Inbound, Instant);

/// Message dispatcher routing decoded messages to machine handlers.
///
/// Keyed by [`MessageKind`], so one table serves both wire variants; the
/// opcode tables stay per variant and are consulted before dispatch.
pub struct Dispatcher<M> {
    handlers: HashMap<MessageKind, HandlerFn<M>>,
}

impl<M> Default for Dispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Dispatcher<M> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: MessageKind, handler: HandlerFn<M>) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Handler for `kind`. Handlers are plain function pointers, so the
    /// caller can release its borrow of the table before invoking one.
    #[inline]
    pub fn handler(&self, kind: MessageKind) -> Option<HandlerFn<M>> {
        self.handlers.get(&kind).copied()
    }

    pub fn handles(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<M> std::fmt::Debug for Dispatcher<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("Dispatcher").field("kinds", &kinds).finish()
    }
}
