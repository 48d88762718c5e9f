//! Telemetry sink that writes each published message as a JSON line.

use std::io::Write;

use feeder_traits::{BoxError, Telemetry};
use serde_json::{Value, json};

pub struct JsonlTelemetry<W: Write> {
    out: W,
    sent: u64,
}

impl<W: Write> JsonlTelemetry<W> {
    pub fn new(out: W) -> Self {
        Self { out, sent: 0 }
    }
}

impl<W: Write> Telemetry for JsonlTelemetry<W> {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BoxError> {
        // Payloads are JSON already; embed them as objects when they parse.
        let payload = serde_json::from_str::<Value>(payload)
            .unwrap_or_else(|_| Value::String(payload.to_string()));
        self.sent += 1;
        let line = json!({ "seq": self.sent, "topic": topic, "payload": payload });
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_embed_json_payloads() {
        let mut t = JsonlTelemetry::new(Vec::new());
        t.publish("catfeeder/status", r#"{"bowl_g":12.5}"#).unwrap();
        t.publish("catfeeder/alerts", "plain text").unwrap();
        let text = String::from_utf8(t.out).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines[0]["payload"]["bowl_g"], 12.5);
        assert_eq!(lines[1]["payload"], "plain text");
        assert_eq!(lines[1]["seq"], 2);
    }
}
