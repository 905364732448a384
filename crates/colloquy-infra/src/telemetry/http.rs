//! Posts each telemetry record as JSON to a configured endpoint.

use std::time::Duration;

use colloquy_core::telemetry::TelemetrySink;
use colloquy_types::error::TelemetryError;
use colloquy_types::telemetry::TelemetryRecord;

pub struct HttpTelemetrySink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTelemetrySink {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl TelemetrySink for HttpTelemetrySink {
    fn name(&self) -> &str {
        "http"
    }

    async fn emit(&self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::persona::{Persona, SharedRegistry, seed_relationships};
    use colloquy_core::presets;
    use colloquy_core::telemetry::{RecordBuilder, simulation_context};
    use colloquy_types::config::{EngineConfig, TelemetryConfig};
    use colloquy_types::persona::PersonaId;
    use colloquy_types::phase::DialoguePhase;
    use colloquy_types::telemetry::TelemetryEventType;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn record() -> TelemetryRecord {
        let config = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        let registry = SharedRegistry::new();
        let mut personas: Vec<Persona> = presets::preset(presets::DEFAULT_PRESET)
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, profile)| {
                let id = PersonaId::numbered(i + 1);
                registry.write().register(id.clone(), &profile.name).unwrap();
                Persona::new(id, profile, config.memory.clone(), &mut rng)
            })
            .collect();
        seed_relationships(&mut personas, &config.relationships, &mut rng);

        let scenario = presets::scenario(presets::DEFAULT_SCENARIO).unwrap();
        let context = simulation_context(&scenario, None, None, DialoguePhase::Discuss);
        RecordBuilder::new(TelemetryEventType::MessageSent, "user-1", 4, "We need water.")
            .build(&personas[0], &personas, &registry.read(), context)
    }

    /// Answer one request with `status` and hand back what was received.
    async fn endpoint(status: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            // Read until the JSON body closes.
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if received.ends_with(b"}") {
                    break;
                }
            }
            let reply = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&received).into_owned());
        });
        (format!("http://{addr}/events"), rx)
    }

    #[tokio::test]
    async fn test_posts_record_as_json() {
        let (url, received) = endpoint("204 No Content").await;
        let sink = HttpTelemetrySink::new(&url, Duration::from_secs(5)).unwrap();

        sink.emit(&record()).await.unwrap();

        let request = received.await.unwrap();
        assert!(request.starts_with("POST /events"));
        assert!(request.contains("\"event_type\":\"message_sent\""));
        assert!(request.contains("\"user_id\":\"user-1\""));
    }

    #[tokio::test]
    async fn test_rejection_reports_status() {
        let (url, _received) = endpoint("503 Service Unavailable").await;
        let sink = HttpTelemetrySink::new(&url, Duration::from_secs(5)).unwrap();

        let err = sink.emit(&record()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Rejected { status: 503 }));
    }

    #[test]
    fn test_no_endpoint_means_noop() {
        let sink = super::super::sink_from_config(&TelemetryConfig::default());
        assert_eq!(sink.name(), "noop");
    }
}
