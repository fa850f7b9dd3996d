use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::fomo::codec::ObfuscationCodec;
use crate::fomo::seen::{stamp_keys, timestamp, SeenMap};

/// Wire format shared with every open tab of the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    #[serde(rename = "SYNC_SEEN_ENC")]
    Encrypted {
        #[serde(rename = "namesEnc", default, skip_serializing_if = "Option::is_none")]
        names_enc: Option<String>,
        #[serde(rename = "avatarsEnc", default, skip_serializing_if = "Option::is_none")]
        avatars_enc: Option<String>,
    },
    /// Older tabs post plaintext maps, or bare key arrays (`imgs` in the
    /// testimonial widget).
    #[serde(rename = "SYNC_SEEN")]
    Plain {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        names: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatars: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        imgs: Option<Value>,
    },
}

pub type SyncHandler = Rc<dyn Fn(SyncMessage)>;

/// A best-effort publish/subscribe channel scoped to the site.
pub trait BroadcastMedium {
    fn post(&self, message: &SyncMessage) -> Result<()>;
    fn subscribe(&mut self, handler: SyncHandler);
    fn close(&mut self);
}

/// Used where no broadcast medium exists; cross-tab sync is simply off.
pub struct NoopBroadcast;

impl BroadcastMedium for NoopBroadcast {
    fn post(&self, _message: &SyncMessage) -> Result<()> {
        Ok(())
    }

    fn subscribe(&mut self, _handler: SyncHandler) {}

    fn close(&mut self) {}
}

/// Seen-set state another tab announced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteUpdate {
    pub names: Option<SeenMap>,
    pub avatars: Option<SeenMap>,
}

impl RemoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.names.is_none() && self.avatars.is_none()
    }
}

pub struct CrossTabSync {
    medium: Box<dyn BroadcastMedium>,
    codec: Rc<ObfuscationCodec>,
    closed: bool,
}

impl CrossTabSync {
    pub fn new(medium: Box<dyn BroadcastMedium>, codec: Rc<ObfuscationCodec>) -> Self {
        Self {
            medium,
            codec,
            closed: false,
        }
    }

    /// Posts whichever maps are given as one obfuscated message.
    pub fn broadcast(&self, names: Option<&SeenMap>, avatars: Option<&SeenMap>) {
        if self.closed {
            return;
        }
        let encode = |map: Option<&SeenMap>| -> Result<Option<String>> {
            map.map(|m| self.codec.encode(m)).transpose()
        };
        let message = match (encode(names), encode(avatars)) {
            (Ok(names_enc), Ok(avatars_enc)) => SyncMessage::Encrypted {
                names_enc,
                avatars_enc,
            },
            (Err(e), _) | (_, Err(e)) => {
                log::debug!("Skipping broadcast, encode failed: {}", e);
                return;
            }
        };
        if let Err(e) = self.medium.post(&message) {
            log::debug!("Broadcast failed: {}", e);
        }
    }

    pub fn on_remote_update(&mut self, handler: SyncHandler) {
        self.medium.subscribe(handler);
    }

    /// Extracts the maps carried by `message`. Anything that fails to
    /// decode is left out.
    pub fn decode(&self, message: &SyncMessage, now: i64) -> RemoteUpdate {
        match message {
            SyncMessage::Encrypted {
                names_enc,
                avatars_enc,
            } => {
                let open = |blob: &Option<String>| {
                    blob.as_deref()
                        .and_then(|b| self.codec.decode_soft::<Value>(b))
                        .and_then(|v| seen_map_from(&v, now))
                };
                RemoteUpdate {
                    names: open(names_enc),
                    avatars: open(avatars_enc),
                }
            }
            SyncMessage::Plain {
                names,
                avatars,
                imgs,
            } => RemoteUpdate {
                names: names.as_ref().and_then(|v| seen_map_from(v, now)),
                avatars: avatars
                    .as_ref()
                    .or(imgs.as_ref())
                    .and_then(|v| seen_map_from(v, now)),
            },
        }
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.medium.close();
            self.closed = true;
        }
    }
}

/// Accepts `{key: ts}` maps and bare key arrays.
fn seen_map_from(value: &Value, now: i64) -> Option<SeenMap> {
    match value {
        Value::Object(entries) => Some(
            entries
                .iter()
                .filter_map(|(k, ts)| timestamp(ts).map(|ts| (k.clone(), ts)))
                .collect(),
        ),
        Value::Array(keys) => Some(stamp_keys(keys, now)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fomo::testing::BroadcastHub;
    use serde_json::json;
    use std::cell::RefCell;

    fn codec() -> Rc<ObfuscationCodec> {
        Rc::new(ObfuscationCodec::with_iterations("pepper", "origin", 2))
    }

    fn map(entries: &[(&str, i64)]) -> SeenMap {
        entries.iter().map(|(k, ts)| (k.to_string(), *ts)).collect()
    }

    #[test]
    fn encrypted_messages_use_the_site_wire_names() {
        let msg = SyncMessage::Encrypted {
            names_enc: Some("enc:v1:a:b".to_string()),
            avatars_enc: None,
        };
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire, json!({ "type": "SYNC_SEEN_ENC", "namesEnc": "enc:v1:a:b" }));
    }

    #[test]
    fn broadcast_posts_obfuscated_maps() {
        let hub = BroadcastHub::new();
        let codec = codec();
        let sender = CrossTabSync::new(Box::new(hub.endpoint()), codec.clone());
        let mut receiver = CrossTabSync::new(Box::new(hub.endpoint()), codec);

        let inbox = Rc::new(RefCell::new(Vec::<SyncMessage>::new()));
        let sink = inbox.clone();
        receiver.on_remote_update(Rc::new(move |m: SyncMessage| sink.borrow_mut().push(m)));

        sender.broadcast(None, Some(&map(&[("https://a/1.jpg", 10)])));
        hub.deliver_all();

        let received = inbox.borrow();
        assert_eq!(received.len(), 1);
        let wire = serde_json::to_string(&received[0]).unwrap();
        assert!(!wire.contains("https://a/1.jpg"));

        let update = receiver.decode(&received[0], 99);
        assert_eq!(update.names, None);
        assert_eq!(update.avatars, Some(map(&[("https://a/1.jpg", 10)])));
    }

    #[test]
    fn legacy_plaintext_maps_and_arrays_are_accepted() {
        let sync = CrossTabSync::new(Box::new(NoopBroadcast), codec());
        let raw = json!({
            "type": "SYNC_SEEN",
            "names": { "olivia smith": 5, "bad": "x" },
            "imgs": ["https://a/2.jpg"]
        });
        let msg: SyncMessage = serde_json::from_value(raw).unwrap();
        let update = sync.decode(&msg, 42);
        assert_eq!(update.names, Some(map(&[("olivia smith", 5)])));
        assert_eq!(update.avatars, Some(map(&[("https://a/2.jpg", 42)])));
    }

    #[test]
    fn undecodable_payloads_are_dropped() {
        let sync = CrossTabSync::new(Box::new(NoopBroadcast), codec());
        let other = ObfuscationCodec::with_iterations("pepper", "other-origin", 2);
        let msg = SyncMessage::Encrypted {
            names_enc: Some(other.encode(&map(&[("x", 1)])).unwrap()),
            avatars_enc: Some("garbage".to_string()),
        };
        assert!(sync.decode(&msg, 0).is_empty());
    }

    #[test]
    fn unknown_message_types_do_not_parse() {
        let raw = json!({ "type": "SOMETHING_ELSE", "names": {} });
        assert!(serde_json::from_value::<SyncMessage>(raw).is_err());
    }

    #[test]
    fn closed_sync_stops_posting() {
        let hub = BroadcastHub::new();
        let mut sender = CrossTabSync::new(Box::new(hub.endpoint()), codec());
        let _receiver = hub.endpoint();
        sender.close();
        sender.broadcast(Some(&map(&[("a", 1)])), None);
        assert_eq!(hub.pending(), 0);
    }
}
