//! Hook/event bus (spec §4.5): publish/subscribe over lifecycle events,
//! plus a bounded buffer bridging to a single external transport.
//! Grounded on the `ExecutionEvent`/mpsc pattern used for workflow
//! event streaming in the n8n-rs reference example, generalized here
//! to an in-process subscriber list plus one pluggable transport sender
//! instead of a hardwired channel.

use crate::error::Severity;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// The closed set of lifecycle event kinds (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    WorkflowBeforeStart,
    WorkflowAfterEnd,
    WorkflowError,
    WorkflowProgress,
    WorkflowPaused,
    WorkflowResumed,
    WorkflowCancelled,
    NodeBeforeExecute,
    NodeAfterExecute,
    NodeError,
    NodeSkipped,
    ErrorValidation,
    ErrorExecution,
    ErrorConnection,
    ErrorSystem,
    SystemInfo,
    SystemWarning,
    SystemSuccess,
}

impl EventKind {
    /// Wire string as it appears in the hook event envelope (spec §6.3),
    /// e.g. `workflow:before-start`, `node:error`, `error:validation`.
    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::WorkflowBeforeStart => "workflow:before-start",
            EventKind::WorkflowAfterEnd => "workflow:after-end",
            EventKind::WorkflowError => "workflow:error",
            EventKind::WorkflowProgress => "workflow:progress",
            EventKind::WorkflowPaused => "workflow:paused",
            EventKind::WorkflowResumed => "workflow:resumed",
            EventKind::WorkflowCancelled => "workflow:cancelled",
            EventKind::NodeBeforeExecute => "node:before-execute",
            EventKind::NodeAfterExecute => "node:after-execute",
            EventKind::NodeError => "node:error",
            EventKind::NodeSkipped => "node:skipped",
            EventKind::ErrorValidation => "error:validation",
            EventKind::ErrorExecution => "error:execution",
            EventKind::ErrorConnection => "error:connection",
            EventKind::ErrorSystem => "error:system",
            EventKind::SystemInfo => "system:info",
            EventKind::SystemWarning => "system:warning",
            EventKind::SystemSuccess => "system:success",
        }
    }
}

/// The hook event envelope (spec §6.3).
#[derive(Debug, Clone, Serialize)]
pub struct HookEvent {
    #[serde(rename = "type")]
    pub kind_name: &'static str,
    #[serde(skip)]
    pub kind: EventKind,
    pub workflow_id: String,
    pub execution_id: String,
    pub node_id: Option<String>,
    pub timestamp: i64,
    pub data: Value,
    pub severity: Option<Severity>,
}

impl HookEvent {
    pub fn new(
        kind: EventKind,
        workflow_id: impl Into<String>,
        execution_id: impl Into<String>,
        node_id: Option<String>,
        timestamp: i64,
        data: Value,
        severity: Option<Severity>,
    ) -> Self {
        Self {
            kind_name: kind.wire_name(),
            kind,
            workflow_id: workflow_id.into(),
            execution_id: execution_id.into(),
            node_id,
            timestamp,
            data,
            severity,
        }
    }
}

pub type SubscriptionId = u64;
pub type Handler = Box<dyn Fn(&HookEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    filter: Option<EventKind>,
    handler: Handler,
}

/// A sender adapter for an external transport (spec §4.5). Returns
/// `false` when the message was rejected (e.g. the socket is gone);
/// the bus rebuffers on rejection rather than treating it as delivered.
pub trait ExternalTransport: Send + Sync {
    fn send(&self, event: &HookEvent) -> bool;
}

pub struct HookBus {
    subscribers: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
    transport: Mutex<Option<Box<dyn ExternalTransport>>>,
    connected: Mutex<bool>,
    buffer: Mutex<VecDeque<HookEvent>>,
    capacity: usize,
}

impl HookBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            transport: Mutex::new(None),
            connected: Mutex::new(false),
            buffer: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Registers an in-process handler, optionally filtered to a single
    /// event kind (`None` receives every event). Returns an id usable
    /// with `unregister`.
    pub fn register(&self, filter: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().push(Subscription { id, filter, handler });
        id
    }

    pub fn unregister(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().retain(|s| s.id != id);
    }

    pub fn attach_transport(&self, transport: Box<dyn ExternalTransport>) {
        *self.transport.lock().unwrap() = Some(transport);
    }

    pub fn detach_transport(&self) {
        *self.transport.lock().unwrap() = None;
        *self.connected.lock().unwrap() = false;
    }

    /// Emits one event: synchronous in-process handlers run first, in
    /// registration order, each isolated by `catch_unwind` (spec §4.5
    /// "must not abort the emission to other handlers"); then the event
    /// is handed to the external transport, or buffered if disconnected
    /// or rejected.
    pub fn emit(&self, event: HookEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for sub in subscribers.iter() {
            if sub.filter.is_some_and(|k| k != event.kind) {
                continue;
            }
            let handler = &sub.handler;
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::warn!(kind = event.kind.wire_name(), "hook handler panicked");
            }
        }
        drop(subscribers);

        self.deliver_to_transport(event);
    }

    fn deliver_to_transport(&self, event: HookEvent) {
        let connected = *self.connected.lock().unwrap();
        let transport = self.transport.lock().unwrap();
        if connected {
            if let Some(t) = transport.as_ref() {
                if t.send(&event) {
                    return;
                }
            }
        }
        drop(transport);
        self.push_buffer(event);
    }

    fn push_buffer(&self, event: HookEvent) {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    /// Reports a connection status change (spec §4.5). On `true`, flushes
    /// the buffer in order; a rejected send during flush rebuffers that
    /// event and every event still queued behind it, then stops.
    pub fn set_connection_status(&self, connected: bool) {
        *self.connected.lock().unwrap() = connected;
        if !connected {
            return;
        }
        let transport = self.transport.lock().unwrap();
        let Some(t) = transport.as_ref() else {
            return;
        };
        let mut buffer = self.buffer.lock().unwrap();
        let mut pending: VecDeque<HookEvent> = buffer.drain(..).collect();
        while let Some(event) = pending.pop_front() {
            if !t.send(&event) {
                buffer.push_back(event);
                buffer.extend(pending);
                break;
            }
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn event(kind: EventKind) -> HookEvent {
        HookEvent::new(kind, "wf", "exec-1", None, 0, json!({}), None)
    }

    #[test]
    fn handlers_receive_matching_events_in_order() {
        let bus = HookBus::new(10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        bus.register(
            None,
            Box::new(move |e: &HookEvent| seen2.lock().unwrap().push(e.kind_name)),
        );
        bus.emit(event(EventKind::WorkflowBeforeStart));
        bus.emit(event(EventKind::WorkflowAfterEnd));
        assert_eq!(*seen.lock().unwrap(), vec!["workflow:before-start", "workflow:after-end"]);
    }

    #[test]
    fn filtered_subscriber_ignores_other_kinds() {
        let bus = HookBus::new(10);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        bus.register(
            Some(EventKind::NodeError),
            Box::new(move |_: &HookEvent| {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.emit(event(EventKind::WorkflowBeforeStart));
        bus.emit(event(EventKind::NodeError));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_block_others() {
        let bus = HookBus::new(10);
        bus.register(None, Box::new(|_: &HookEvent| panic!("boom")));
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        bus.register(
            None,
            Box::new(move |_: &HookEvent| {
                ran2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.emit(event(EventKind::SystemInfo));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    struct RejectingTransport;
    impl ExternalTransport for RejectingTransport {
        fn send(&self, _event: &HookEvent) -> bool {
            false
        }
    }

    #[test]
    fn disconnected_events_buffer_and_drop_head_on_overflow() {
        let bus = HookBus::new(2);
        bus.emit(event(EventKind::SystemInfo));
        bus.emit(event(EventKind::SystemWarning));
        bus.emit(event(EventKind::SystemSuccess));
        assert_eq!(bus.buffered_len(), 2);
    }

    struct AcceptingTransport(Arc<Mutex<Vec<&'static str>>>);
    impl ExternalTransport for AcceptingTransport {
        fn send(&self, event: &HookEvent) -> bool {
            self.0.lock().unwrap().push(event.kind_name);
            true
        }
    }

    #[test]
    fn connecting_flushes_buffer_in_order() {
        let bus = HookBus::new(10);
        bus.emit(event(EventKind::SystemInfo));
        bus.emit(event(EventKind::SystemWarning));
        let received = Arc::new(Mutex::new(Vec::new()));
        bus.attach_transport(Box::new(AcceptingTransport(received.clone())));
        bus.set_connection_status(true);
        assert_eq!(*received.lock().unwrap(), vec!["system:info", "system:warning"]);
        assert_eq!(bus.buffered_len(), 0);
    }

    #[test]
    fn rejected_send_during_flush_rebuffers_and_stops() {
        let bus = HookBus::new(10);
        bus.emit(event(EventKind::SystemInfo));
        bus.emit(event(EventKind::SystemWarning));
        bus.attach_transport(Box::new(RejectingTransport));
        bus.set_connection_status(true);
        assert_eq!(bus.buffered_len(), 2);
    }
}
