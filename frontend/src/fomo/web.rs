//! Browser implementations of the engine's capabilities.

use std::collections::HashMap;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::js_sys::Array;
use web_sys::{
    BroadcastChannel, Element, EventTarget, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, MessageEvent, Storage,
};
use yew::Callback;

use crate::config::{self, FeedConfig, MOBILE_QUERY};
use crate::error::{FomoError, Result};
use crate::fomo::codec::ObfuscationCodec;
use crate::fomo::engine::Capabilities;
use crate::fomo::scheduler::{DeviceClass, PageEnvironment, SystemClock, TimerDriver, TimerToken};
use crate::fomo::store::{KeyValueMedium, MemoryMedium};
use crate::fomo::sync::{BroadcastMedium, NoopBroadcast, SyncHandler, SyncMessage};

fn js_error(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

pub fn site_origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "server".to_string())
}

thread_local! {
    // Both widgets share one codec so the key is derived once per page.
    static CODEC: Rc<ObfuscationCodec> =
        Rc::new(ObfuscationCodec::new(config::fomo_pepper(), &site_origin()));
}

pub fn site_codec() -> Rc<ObfuscationCodec> {
    CODEC.with(Rc::clone)
}

/// Everything a widget needs to run in the browser. Timer firings come
/// back through `on_timer`.
pub fn browser_capabilities(config: &FeedConfig, on_timer: Callback<TimerToken>) -> Capabilities {
    Capabilities {
        medium: site_medium(),
        codec: site_codec(),
        broadcast: site_broadcast(config.channel),
        clock: Rc::new(SystemClock),
        environment: Rc::new(WebEnvironment),
        timers: Box::new(WebTimers::new(on_timer)),
        rng_seed: None,
    }
}

pub struct LocalStorageMedium {
    storage: Storage,
}

impl LocalStorageMedium {
    pub fn open() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| FomoError::StorageUnavailable("no window".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(|e| FomoError::StorageUnavailable(js_error(e)))?
            .ok_or_else(|| FomoError::StorageUnavailable("localStorage is null".to_string()))?;
        Ok(Self { storage })
    }
}

impl KeyValueMedium for LocalStorageMedium {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| FomoError::StorageUnavailable(js_error(e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| FomoError::StorageWrite {
                key: key.to_string(),
                reason: js_error(e),
            })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| FomoError::StorageUnavailable(js_error(e)))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let len = self
            .storage
            .length()
            .map_err(|e| FomoError::StorageUnavailable(js_error(e)))?;
        let mut keys = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Ok(Some(key)) = self.storage.key(i) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// `localStorage`, or an in-memory map when the browser refuses it.
pub fn site_medium() -> Rc<dyn KeyValueMedium> {
    match LocalStorageMedium::open() {
        Ok(medium) => Rc::new(medium),
        Err(e) => {
            log::warn!("Falling back to in-memory storage: {}", e);
            Rc::new(MemoryMedium::new())
        }
    }
}

pub struct WebBroadcast {
    channel: BroadcastChannel,
    listener: Option<Closure<dyn FnMut(MessageEvent)>>,
}

impl WebBroadcast {
    pub fn open(name: &str) -> Result<Self> {
        let channel = BroadcastChannel::new(name).map_err(|e| FomoError::Broadcast(js_error(e)))?;
        Ok(Self {
            channel,
            listener: None,
        })
    }
}

impl BroadcastMedium for WebBroadcast {
    fn post(&self, message: &SyncMessage) -> Result<()> {
        let value = message
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| FomoError::Broadcast(e.to_string()))?;
        self.channel
            .post_message(&value)
            .map_err(|e| FomoError::Broadcast(js_error(e)))
    }

    fn subscribe(&mut self, handler: SyncHandler) {
        let listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            match serde_wasm_bindgen::from_value::<SyncMessage>(event.data()) {
                Ok(message) => handler(message),
                Err(e) => log::debug!("Ignoring foreign broadcast: {}", e),
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        self.channel
            .set_onmessage(Some(listener.as_ref().unchecked_ref()));
        self.listener = Some(listener);
    }

    fn close(&mut self) {
        self.channel.set_onmessage(None);
        self.channel.close();
        self.listener = None;
    }
}

/// A BroadcastChannel, or nothing when the browser lacks one.
pub fn site_broadcast(name: &str) -> Box<dyn BroadcastMedium> {
    match WebBroadcast::open(name) {
        Ok(channel) => Box::new(channel),
        Err(e) => {
            log::info!("Cross-tab sync disabled: {}", e);
            Box::new(NoopBroadcast)
        }
    }
}

/// `setTimeout`-backed timers keyed by token. Dropping a `Timeout` clears
/// it, so replacing or removing an entry cancels the old one.
pub struct WebTimers {
    pending: HashMap<TimerToken, Timeout>,
    on_fire: Callback<TimerToken>,
}

impl WebTimers {
    pub fn new(on_fire: Callback<TimerToken>) -> Self {
        Self {
            pending: HashMap::new(),
            on_fire,
        }
    }
}

impl TimerDriver for WebTimers {
    fn arm(&mut self, token: TimerToken, delay_ms: u32) {
        let on_fire = self.on_fire.clone();
        let fired = token.clone();
        let timeout = Timeout::new(delay_ms, move || {
            // The handler cancels this very timeout; let the callback return first.
            wasm_bindgen_futures::spawn_local(async move { on_fire.emit(fired) });
        });
        self.pending.insert(token, timeout);
    }

    fn cancel(&mut self, token: &TimerToken) {
        self.pending.remove(token);
    }
}

pub struct WebEnvironment;

impl PageEnvironment for WebEnvironment {
    fn device_class(&self) -> DeviceClass {
        let mobile = web_sys::window()
            .and_then(|w| w.match_media(MOBILE_QUERY).ok().flatten())
            .map(|mql| mql.matches())
            .unwrap_or(false);
        if mobile {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    fn is_visible(&self) -> bool {
        web_sys::window()
            .and_then(|w| w.document())
            .map(|d| !d.hidden())
            .unwrap_or(true)
    }
}

/// Forwards `visibilitychange` until dropped.
pub struct VisibilityListener {
    target: EventTarget,
    callback: Closure<dyn FnMut()>,
}

impl VisibilityListener {
    pub fn attach(on_change: Callback<()>) -> Option<Self> {
        let document = web_sys::window()?.document()?;
        let callback = Closure::wrap(Box::new(move || on_change.emit(())) as Box<dyn FnMut()>);
        document
            .add_event_listener_with_callback("visibilitychange", callback.as_ref().unchecked_ref())
            .ok()?;
        Some(Self {
            target: document.into(),
            callback,
        })
    }
}

impl Drop for VisibilityListener {
    fn drop(&mut self) {
        let _ = self.target.remove_event_listener_with_callback(
            "visibilitychange",
            self.callback.as_ref().unchecked_ref(),
        );
    }
}

/// Reports whether `element` intersects the viewport, until dropped.
pub struct ViewportObserver {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(Array)>,
}

impl ViewportObserver {
    pub fn watch(element: &Element, threshold: f64, on_change: Callback<bool>) -> Option<Self> {
        let callback = Closure::wrap(Box::new(move |entries: Array| {
            for entry in entries.iter() {
                if let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() {
                    on_change.emit(entry.is_intersecting());
                }
            }
        }) as Box<dyn FnMut(Array)>);
        let mut options = IntersectionObserverInit::new();
        options.threshold(&JsValue::from_f64(threshold));
        let observer =
            IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options).ok()?;
        observer.observe(element);
        Some(Self {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for ViewportObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}
