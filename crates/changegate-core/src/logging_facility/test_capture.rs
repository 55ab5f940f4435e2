//! In-memory capture of log events for test assertions
//!
//! The engine dispatchers stamp `correlation_id` on every boundary event, so
//! tests that share the global buffer pick out their own events with
//! [`TestCapture::for_correlation`] or a unique operation name.

use changegate_core_types::schema::{
    FIELD_BRANCH, FIELD_CORRELATION_ID, FIELD_ERR_CODE, FIELD_EVENT, FIELD_OP, FIELD_REQUEST_ID,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One log event, every field rendered as a string
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn op(&self) -> Option<&str> {
        self.field(FIELD_OP)
    }

    /// `start`, `end` or `end_error` for boundary events
    pub fn event(&self) -> Option<&str> {
        self.field(FIELD_EVENT)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.field(FIELD_CORRELATION_ID)
    }

    pub fn error_code(&self) -> Option<&str> {
        self.field(FIELD_ERR_CODE)
    }

    pub fn branch(&self) -> Option<&str> {
        self.field(FIELD_BRANCH)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.field(FIELD_REQUEST_ID)
    }
}

struct Fields(BTreeMap<String, String>);

impl Visit for Fields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

type Buffer = Arc<Mutex<Vec<CapturedEvent>>>;

struct CaptureLayer(Buffer);

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields(BTreeMap::new());
        event.record(&mut fields);
        if let Ok(mut events) = self.0.lock() {
            events.push(CapturedEvent {
                level: *event.metadata().level(),
                fields: fields.0,
            });
        }
    }
}

/// Handle for reading captured events
#[derive(Clone)]
pub struct TestCapture(Buffer);

impl TestCapture {
    fn matching(&self, keep: impl Fn(&CapturedEvent) -> bool) -> Vec<CapturedEvent> {
        self.0
            .lock()
            .map(|events| events.iter().filter(|e| keep(e)).cloned().collect())
            .unwrap_or_default()
    }

    /// Events recorded under one operation name
    pub fn events_for(&self, op: &str) -> Vec<CapturedEvent> {
        self.matching(|e| e.op() == Some(op))
    }

    /// Events stamped with one correlation id, in emission order
    pub fn for_correlation(&self, correlation_id: &str) -> Vec<CapturedEvent> {
        self.matching(|e| e.correlation_id() == Some(correlation_id))
    }

    /// Boundary event names of `op` within one correlation, e.g. `["start", "end"]`
    pub fn lifecycle(&self, op: &str, correlation_id: &str) -> Vec<String> {
        self.for_correlation(correlation_id)
            .iter()
            .filter(|e| e.op() == Some(op))
            .filter_map(|e| e.event().map(str::to_string))
            .collect()
    }
}

static GLOBAL_CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber (once per process)
/// and return a handle to it.
pub fn init_test_capture() -> TestCapture {
    GLOBAL_CAPTURE
        .get_or_init(|| {
            let buffer = Buffer::default();
            tracing_subscriber::registry()
                .with(CaptureLayer(buffer.clone()))
                .init();
            TestCapture(buffer)
        })
        .clone()
}
