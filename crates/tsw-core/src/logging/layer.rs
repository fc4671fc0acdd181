//! Custom tracing layer for JSONL output.
//!
//! This layer produces machine-parseable JSONL logs on stderr while
//! keeping stdout clean for command payloads.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Correlation fields promoted to the top level of each line.
#[derive(Debug, Clone, Default)]
struct Correlation {
    run_id: Option<String>,
    input: Option<String>,
    stage: Option<String>,
}

impl Correlation {
    fn take(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "run_id" => &mut self.run_id,
            "input" => &mut self.input,
            "stage" => &mut self.stage,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    fn fill_from(&mut self, outer: &Correlation) {
        if self.run_id.is_none() {
            self.run_id.clone_from(&outer.run_id);
        }
        if self.input.is_none() {
            self.input.clone_from(&outer.input);
        }
        if self.stage.is_none() {
            self.stage.clone_from(&outer.stage);
        }
    }
}

/// A visitor that extracts field values from tracing events and spans.
struct JsonFieldVisitor {
    correlation: Correlation,
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn new() -> Self {
        JsonFieldVisitor {
            correlation: Correlation::default(),
            fields: serde_json::Map::new(),
            message: None,
        }
    }

    fn record_text(&mut self, name: &str, value: String) {
        if name == "message" {
            self.message = Some(value);
        } else if !self.correlation.take(name, value.clone()) {
            self.fields
                .insert(name.to_string(), serde_json::Value::String(value));
        }
    }
}

impl tracing::field::Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_text(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_text(field.name(), format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(serde_json::Number::from(value)),
        );
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

/// JSONL tracing layer that outputs to stderr.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    /// Create a new JSONL layer writing to stderr.
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a new JSONL layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::new();
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.correlation);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();

        let mut visitor = JsonFieldVisitor::new();
        event.record(&mut visitor);

        // Event fields win over enclosing spans; inner spans over outer ones
        let mut correlation = visitor.correlation;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(outer) = span.extensions().get::<Correlation>() {
                    correlation.fill_from(outer);
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut obj = serde_json::Map::new();

        obj.insert("ts".to_string(), serde_json::json!(ts.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(level));
        obj.insert(
            "event".to_string(),
            serde_json::json!(event.metadata().target()),
        );

        if let Some(id) = correlation.run_id {
            obj.insert("run_id".to_string(), serde_json::json!(id));
        }
        if let Some(input) = correlation.input.filter(|s| !s.is_empty()) {
            obj.insert("input".to_string(), serde_json::json!(input));
        }
        if let Some(s) = correlation.stage {
            obj.insert("stage".to_string(), serde_json::json!(s));
        }
        if let Some(msg) = visitor.message {
            obj.insert("message".to_string(), serde_json::json!(msg));
        }

        if !visitor.fields.is_empty() {
            obj.insert(
                "fields".to_string(),
                serde_json::Value::Object(visitor.fields),
            );
        }

        let json = serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogContext, Stage};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn make_buffer_layer() -> (Arc<Mutex<Vec<u8>>>, impl Layer<tracing_subscriber::Registry>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        (buffer, layer)
    }

    fn captured(buffer: &Arc<Mutex<Vec<u8>>>) -> Vec<serde_json::Value> {
        let output = buffer.lock().unwrap();
        String::from_utf8_lossy(&output)
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid JSON line"))
            .collect()
    }

    #[test]
    fn test_jsonl_layer_output() {
        let (buffer, layer) = make_buffer_layer();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "test.event", message = "test message");
        });

        let lines = captured(&buffer);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[0]["event"], "test.event");
        assert_eq!(lines[0]["message"], "test message");
        assert!(lines[0]["ts"].is_string());
    }

    #[test]
    fn test_correlation_fields_promoted() {
        let (buffer, layer) = make_buffer_layer();
        let subscriber = tracing_subscriber::registry().with(layer);
        let ctx = LogContext::new("run-abc").with_input("ts_kv_1.csv");

        tracing::subscriber::with_default(subscriber, || {
            crate::log_event!(
                ctx,
                INFO,
                "device.written",
                Stage::Write,
                "wrote SensorA",
                rows = 3u64
            );
        });

        let lines = captured(&buffer);
        assert_eq!(lines[0]["run_id"], "run-abc");
        assert_eq!(lines[0]["input"], "ts_kv_1.csv");
        assert_eq!(lines[0]["stage"], "write");
        assert_eq!(lines[0]["message"], "wrote SensorA");
        assert_eq!(lines[0]["fields"]["rows"], 3);
        assert!(lines[0]["fields"].get("run_id").is_none());
    }

    #[test]
    fn test_empty_input_omitted() {
        let (buffer, layer) = make_buffer_layer();
        let subscriber = tracing_subscriber::registry().with(layer);
        let ctx = LogContext::new("run-abc");

        tracing::subscriber::with_default(subscriber, || {
            crate::log_event!(ctx, WARN, "run.finished", Stage::Write, "done");
        });

        let lines = captured(&buffer);
        assert_eq!(lines[0]["level"], "warn");
        assert!(lines[0].get("input").is_none());
        assert!(lines[0].get("fields").is_none());
    }

    #[test]
    fn test_span_context_inherited() {
        let (buffer, layer) = make_buffer_layer();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("file", run_id = "run-span", input = "a.csv");
            let _guard = span.enter();
            tracing::debug!(target: "decode.ambiguous", stage = "decode", message = "x");
        });

        let lines = captured(&buffer);
        assert_eq!(lines[0]["run_id"], "run-span");
        assert_eq!(lines[0]["input"], "a.csv");
        assert_eq!(lines[0]["stage"], "decode");
    }

    #[test]
    fn test_numeric_and_bool_fields() {
        let (buffer, layer) = make_buffer_layer();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "test.fields", count = 42, active = true, ratio = 0.5, message = "hi");
        });

        let lines = captured(&buffer);
        assert_eq!(lines[0]["fields"]["count"], 42);
        assert_eq!(lines[0]["fields"]["active"], true);
        assert_eq!(lines[0]["fields"]["ratio"], 0.5);
    }
}
