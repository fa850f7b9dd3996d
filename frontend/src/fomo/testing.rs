//! In-process doubles for the engine's browser capabilities.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::Result;
use crate::fomo::scheduler::{Clock, DeviceClass, PageEnvironment, TimerDriver, TimerToken};
use crate::fomo::sync::{BroadcastMedium, SyncHandler, SyncMessage};

pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn new(start: i64) -> Rc<Self> {
        Rc::new(Self { now: Cell::new(start) })
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

pub struct ScriptedEnvironment {
    device: Cell<DeviceClass>,
    visible: Cell<bool>,
}

impl ScriptedEnvironment {
    pub fn new(device: DeviceClass) -> Rc<Self> {
        Rc::new(Self {
            device: Cell::new(device),
            visible: Cell::new(true),
        })
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }
}

impl PageEnvironment for ScriptedEnvironment {
    fn device_class(&self) -> DeviceClass {
        self.device.get()
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }
}

/// Records armed timers; nothing fires until a test takes a token out and
/// hands it to the engine. Clones share state.
#[derive(Clone, Default)]
pub struct FakeTimers {
    armed: Rc<RefCell<Vec<(TimerToken, u32)>>>,
}

impl FakeTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.armed.borrow().len()
    }

    pub fn armed(&self) -> Vec<(TimerToken, u32)> {
        self.armed.borrow().clone()
    }

    /// Removes and returns the pending scheduler tick.
    pub fn tick(&self) -> Option<(TimerToken, u32)> {
        let mut armed = self.armed.borrow_mut();
        let index = armed
            .iter()
            .position(|(token, _)| matches!(token, TimerToken::Tick(_)))?;
        Some(armed.remove(index))
    }

    pub fn expiry(&self, id: &str) -> Option<u32> {
        self.armed.borrow().iter().find_map(|(token, delay)| match token {
            TimerToken::Expire(e) if e == id => Some(*delay),
            _ => None,
        })
    }
}

impl TimerDriver for FakeTimers {
    fn arm(&mut self, token: TimerToken, delay_ms: u32) {
        self.cancel(&token);
        self.armed.borrow_mut().push((token, delay_ms));
    }

    fn cancel(&mut self, token: &TimerToken) {
        self.armed.borrow_mut().retain(|(t, _)| t != token);
    }
}

#[derive(Default)]
struct HubState {
    subscribers: Vec<(usize, Option<SyncHandler>, bool)>,
    queue: VecDeque<(usize, SyncMessage)>,
}

/// A broadcast channel shared by every endpoint created from it. Like the
/// browser's, a sender does not hear its own posts.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    state: Rc<RefCell<HubState>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self) -> HubEndpoint {
        let mut state = self.state.borrow_mut();
        let id = state.subscribers.len();
        state.subscribers.push((id, None, true));
        HubEndpoint {
            hub: self.clone(),
            id,
        }
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    pub fn deliver_all(&self) {
        while let Some((from, message)) = self.pop(false) {
            self.deliver(from, message);
        }
    }

    /// Newest message first.
    pub fn deliver_reversed(&self) {
        while let Some((from, message)) = self.pop(true) {
            self.deliver(from, message);
        }
    }

    fn pop(&self, newest: bool) -> Option<(usize, SyncMessage)> {
        let mut state = self.state.borrow_mut();
        if newest {
            state.queue.pop_back()
        } else {
            state.queue.pop_front()
        }
    }

    fn deliver(&self, from: usize, message: SyncMessage) {
        let handlers: Vec<SyncHandler> = self
            .state
            .borrow()
            .subscribers
            .iter()
            .filter(|(id, _, open)| *id != from && *open)
            .filter_map(|(_, handler, _)| handler.clone())
            .collect();
        for handler in handlers {
            handler(message.clone());
        }
    }
}

pub struct HubEndpoint {
    hub: BroadcastHub,
    id: usize,
}

impl BroadcastMedium for HubEndpoint {
    fn post(&self, message: &SyncMessage) -> Result<()> {
        let mut state = self.hub.state.borrow_mut();
        if state.subscribers[self.id].2 {
            state.queue.push_back((self.id, message.clone()));
        }
        Ok(())
    }

    fn subscribe(&mut self, handler: SyncHandler) {
        self.hub.state.borrow_mut().subscribers[self.id].1 = Some(handler);
    }

    fn close(&mut self) {
        let mut state = self.hub.state.borrow_mut();
        state.subscribers[self.id].1 = None;
        state.subscribers[self.id].2 = false;
    }
}

/// Collects remote messages so a test can feed them to an engine.
#[derive(Clone, Default)]
pub struct Inbox {
    messages: Rc<RefCell<Vec<SyncMessage>>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self) -> SyncHandler {
        let messages = self.messages.clone();
        Rc::new(move |m: SyncMessage| messages.borrow_mut().push(m))
    }

    pub fn drain(&self) -> Vec<SyncMessage> {
        self.messages.borrow_mut().drain(..).collect()
    }
}
