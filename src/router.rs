//! Inbound frame routing.
//!
//! Replies are posted to the correlation store under the key their request
//! registered; push events are converted to readings and forwarded to the
//! host. Anything that cannot be routed is dropped and logged.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cache::AddressCache;
use crate::codec::PayloadFormat;
use crate::correlation::{CorrelationKey, CorrelationStore};
use crate::host::AsyncValues;
use crate::model::{Reading, Value};
use crate::protocol::{CommandCode, Frame, ReplyFrame};
use crate::transport::{BoxFuture, FrameSink};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Posted under this key.
    Posted(CorrelationKey),
    /// A reply already sat in the slot; this one was discarded.
    Duplicate(CorrelationKey),
    /// Forwarded to the host as a reading of this object.
    Pushed(String),
    /// Dropped for the given reason.
    Dropped(&'static str),
}

/// Routes decoded frames to waiters and the host.
#[derive(Clone)]
pub struct InboundRouter {
    cache: Arc<AddressCache>,
    store: CorrelationStore<ReplyFrame>,
    format: PayloadFormat,
    push_tx: mpsc::Sender<AsyncValues>,
}

impl InboundRouter {
    pub fn new(
        cache: Arc<AddressCache>,
        store: CorrelationStore<ReplyFrame>,
        format: PayloadFormat,
        push_tx: mpsc::Sender<AsyncValues>,
    ) -> Self {
        Self {
            cache,
            store,
            format,
            push_tx,
        }
    }

    /// Route one frame.
    pub async fn route(&self, frame: Frame) -> RouteOutcome {
        let reply: ReplyFrame = match self.format.decode(&frame.payload) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!("Undecodable body for command {}: {}", frame.command, e);
                return RouteOutcome::Dropped("undecodable body");
            }
        };

        match frame.command {
            CommandCode::Command => self.route_reply(reply),
            CommandCode::PushEvent => self.route_push(reply).await,
            CommandCode::AddObject => {
                let by_mac = CorrelationKey::ByMac(reply.eui64.mac);
                let key = if reply.eui64.mac != 0 && self.store.has_waiter(&by_mac) {
                    by_mac
                } else {
                    CorrelationKey::ByCommand(CommandCode::AddObject)
                };
                self.post(key, reply)
            }
            other => self.post(CorrelationKey::ByCommand(other), reply),
        }
    }

    fn route_reply(&self, reply: ReplyFrame) -> RouteOutcome {
        let Some(address) = reply.address else {
            tracing::debug!("Command reply without address dropped");
            return RouteOutcome::Dropped("no address");
        };
        match self.cache.resolve_address_to_id(&address) {
            Some(id) => self.post(CorrelationKey::ById(id), reply),
            None => {
                tracing::debug!("Reply from unknown address {} dropped", address);
                RouteOutcome::Dropped("unknown address")
            }
        }
    }

    fn post(&self, key: CorrelationKey, reply: ReplyFrame) -> RouteOutcome {
        if self.store.post(key.clone(), reply) {
            tracing::debug!("Reply posted under {}", key);
            RouteOutcome::Posted(key)
        } else {
            tracing::debug!("Duplicate reply under {} discarded", key);
            RouteOutcome::Duplicate(key)
        }
    }

    async fn route_push(&self, reply: ReplyFrame) -> RouteOutcome {
        let Some(address) = reply.address else {
            return RouteOutcome::Dropped("no address");
        };
        let Some(name) = self
            .cache
            .resolve_address_to_id(&address)
            .and_then(|id| self.cache.resolve_id_to_name(&id))
        else {
            tracing::debug!("Push event from unknown address {} dropped", address);
            return RouteOutcome::Dropped("unknown address");
        };
        let Some(attribute) = reply.attribute else {
            tracing::debug!("Push event from {} without attribute dropped", name);
            return RouteOutcome::Dropped("no attribute");
        };
        let Some(resource) = self.cache.resolve_attribute_to_resource(&attribute) else {
            tracing::debug!(
                "Push event from {} for unmapped attribute {:?} dropped",
                name,
                attribute.triple()
            );
            return RouteOutcome::Dropped("unknown attribute");
        };
        let Some(raw) = reply.value.as_ref() else {
            return RouteOutcome::Dropped("no value");
        };
        let value = match Value::from_json(resource.value_type, raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Push event value for {}: {}", resource.name, e);
                return RouteOutcome::Dropped("bad value");
            }
        };

        let values = AsyncValues {
            device_name: name.clone(),
            readings: vec![Reading::now(resource.name, value)],
        };
        match self.push_tx.send(values).await {
            Ok(()) => RouteOutcome::Pushed(name),
            Err(_) => {
                tracing::warn!("Push channel closed, event from {} dropped", name);
                RouteOutcome::Dropped("push channel closed")
            }
        }
    }
}

impl FrameSink for InboundRouter {
    fn deliver(&self, frame: Frame) -> BoxFuture<'static, ()> {
        let router = self.clone();
        Box::pin(async move {
            router.route(frame).await;
        })
    }
}
