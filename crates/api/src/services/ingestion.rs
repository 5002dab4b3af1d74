//! Event ingestion: validate, derive, enrich, persist.

use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, warn};
use tracker_core::{
    Application, ClientHints, Enricher, Error, ErrorCode, EventStore, Result, TrackEventInput,
    TrackingEvent,
};

#[derive(Clone)]
pub struct IngestionService {
    events: Arc<dyn EventStore>,
    enricher: Arc<Enricher>,
}

impl IngestionService {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self {
            events,
            enricher: Arc::new(Enricher::new()),
        }
    }

    /// JSON track path. The body's `app_id` must name the authenticated
    /// tenant.
    pub async fn track(
        &self,
        tenant: &Application,
        input: TrackEventInput,
        hints: &ClientHints,
    ) -> Result<TrackingEvent> {
        metrics().events_received.inc();

        let outcome = async {
            input.check()?;
            if input.app_id.as_deref().map(str::trim) != Some(tenant.app_id.as_str()) {
                return Err(Error::forbidden("app_id does not match the API key"));
            }
            self.ingest(tenant, input, hints).await
        }
        .await;

        if outcome.is_err() {
            metrics().events_rejected.inc();
        }
        outcome
    }

    /// Pixel path. The tenant was resolved from the `app_id` query
    /// parameter alone, so there is nothing to cross-check.
    pub async fn track_pixel(
        &self,
        app: &Application,
        input: TrackEventInput,
        hints: &ClientHints,
    ) -> Result<TrackingEvent> {
        metrics().events_received.inc();

        let outcome = async {
            input.check()?;
            self.ingest(app, input, hints).await
        }
        .await;

        if outcome.is_err() {
            metrics().events_rejected.inc();
        }
        outcome
    }

    async fn ingest(
        &self,
        app: &Application,
        input: TrackEventInput,
        hints: &ClientHints,
    ) -> Result<TrackingEvent> {
        app.ensure_active()?;
        let started = Instant::now();

        let mut event = TrackingEvent::from_input(&app.app_id, input, hints)?;
        self.enricher.enrich(&mut event, hints);
        self.persist(&mut event).await?;

        metrics().events_persisted.inc();
        metrics()
            .ingest_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        debug!(
            id = %event.id,
            app_id = %event.app_id,
            device_type = event.device_type.as_deref().unwrap_or(""),
            "Event ingested"
        );
        Ok(event)
    }

    /// Insert, regenerating the ID once on a primary-key collision.
    async fn persist(&self, event: &mut TrackingEvent) -> Result<()> {
        match self.events.create(event).await {
            Err(e) if e.code() == ErrorCode::Duplicate => {
                warn!(id = %event.id, app_id = %event.app_id, "Event id collision, retrying");
                event.reassign_id();
                self.events.create(event).await
            }
            other => other,
        }
    }
}
