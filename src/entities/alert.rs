//! Threshold alert processors.
//!
//! A processor compares one reading against a fixed threshold and, when the
//! reading exceeds it, sends exactly one alert message to the device hosting
//! the response module. Processors are stateless: the sending sensor passes
//! its identity with every call.

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::entity::SimContext;
use crate::event::{EventPayload, EventTag};
use crate::message::Message;
use crate::types::{EntityId, UserId};

/// Module that receives alerts unless configured otherwise.
pub const DEFAULT_RESPONSE_MODULE: &str = "response-module";

/// CPU, network and output cost of every alert message.
pub const ALERT_MESSAGE_COST: u64 = 1000;

/// The kind of reading a processor watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Gas,
    Chemical,
    Surrounding,
}

impl AlertKind {
    /// Type tag carried by alert messages of this kind.
    pub fn category(&self) -> &'static str {
        match self {
            AlertKind::Gas => "GasAlert",
            AlertKind::Chemical => "ChemAlert",
            AlertKind::Surrounding => "SrAlert",
        }
    }

    /// Threshold used by the mine-safety deployment.
    pub fn default_threshold(&self) -> f64 {
        match self {
            AlertKind::Gas => 90.0,
            AlertKind::Chemical => 29.0,
            AlertKind::Surrounding => 4.5,
        }
    }

    /// Maps a sensor type tag to the processor watching it.
    ///
    /// Unrecognised tags have no processor.
    pub fn for_type_tag(type_tag: &str) -> Option<Self> {
        match type_tag {
            "GAS" => Some(AlertKind::Gas),
            "CHEM" => Some(AlertKind::Chemical),
            "SR" => Some(AlertKind::Surrounding),
            _ => None,
        }
    }

    /// Human-readable alert text.
    pub fn headline(&self) -> &'static str {
        match self {
            AlertKind::Gas => "gas level above threshold",
            AlertKind::Chemical => "chemical concentration above threshold",
            AlertKind::Surrounding => "surrounding environment unstable",
        }
    }
}

/// Who a reading came from.
#[derive(Clone, Copy, Debug)]
pub struct AlertOrigin<'a> {
    pub source_entity: EntityId,
    pub source_name: &'a str,
    pub user_id: UserId,
    pub application_id: &'a str,
}

/// Compares readings against a threshold and notifies the response module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProcessor {
    pub kind: AlertKind,
    pub threshold: f64,
    /// Module the alert is addressed to
    pub destination_module: String,
    /// Device hosting `destination_module`
    pub response_device: EntityId,
}

impl ThresholdProcessor {
    /// Creates a processor with an explicit threshold.
    pub fn new(
        kind: AlertKind,
        threshold: f64,
        destination_module: impl Into<String>,
        response_device: EntityId,
    ) -> Self {
        Self {
            kind,
            threshold,
            destination_module: destination_module.into(),
            response_device,
        }
    }

    /// Creates a processor with the kind's default threshold, alerting the
    /// default response module on `response_device`.
    pub fn for_kind(kind: AlertKind, response_device: EntityId) -> Self {
        Self::new(
            kind,
            kind.default_threshold(),
            DEFAULT_RESPONSE_MODULE,
            response_device,
        )
    }

    /// Returns `true` if `reading` is strictly above the threshold.
    pub fn evaluate(&self, reading: f64) -> bool {
        reading > self.threshold
    }

    /// Builds the alert message for `reading`.
    pub fn alert_message(&self, message_id: u64, reading: f64, origin: &AlertOrigin<'_>) -> Message {
        let mut alert = Message::new(origin.application_id, message_id, self.kind.category())
            .with_costs(ALERT_MESSAGE_COST, ALERT_MESSAGE_COST, ALERT_MESSAGE_COST)
            .with_route(origin.source_name, self.destination_module.as_str());
        alert.destination_device_id = self.response_device;
        alert.source_entity_id = origin.source_entity;
        alert.user_id = origin.user_id;
        alert.payload_value = reading;
        alert
    }

    /// Evaluates `reading` and, when positive, schedules one alert message.
    ///
    /// Returns whether an alert was raised.
    pub fn process(
        &self,
        ctx: &mut SimContext<'_>,
        reading: f64,
        origin: &AlertOrigin<'_>,
    ) -> Result<bool, EngineError> {
        if !self.evaluate(reading) {
            return Ok(false);
        }

        let message_id = ctx.next_message_id();
        let alert = self.alert_message(message_id, reading, origin);
        tracing::info!(
            category = self.kind.category(),
            reading,
            threshold = self.threshold,
            source = origin.source_name,
            "ALERT: {}",
            self.kind.headline()
        );
        ctx.schedule(
            self.response_device,
            0,
            EventTag::MessageArrival,
            EventPayload::Message(Box::new(alert)),
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityDirectory, EntityKind};
    use crate::timekeeper::TimeKeeper;

    fn origin() -> AlertOrigin<'static> {
        AlertOrigin {
            source_entity: 1,
            source_name: "gas-sensor",
            user_id: 7,
            application_id: "mine",
        }
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AlertKind::for_type_tag("GAS"), Some(AlertKind::Gas));
        assert_eq!(AlertKind::for_type_tag("CHEM"), Some(AlertKind::Chemical));
        assert_eq!(AlertKind::for_type_tag("SR"), Some(AlertKind::Surrounding));
        assert_eq!(AlertKind::for_type_tag("CH"), None);
        assert_eq!(AlertKind::for_type_tag("UNKNOWN"), None);

        assert_eq!(AlertKind::Gas.category(), "GasAlert");
        assert_eq!(AlertKind::Chemical.category(), "ChemAlert");
        assert_eq!(AlertKind::Surrounding.category(), "SrAlert");
    }

    #[test]
    fn test_evaluate_is_strict() {
        let p = ThresholdProcessor::for_kind(AlertKind::Gas, 0);
        assert!(!p.evaluate(90.0));
        assert!(p.evaluate(90.01));
        assert!(!p.evaluate(12.0));
    }

    #[test]
    fn test_process_sends_one_alert() {
        let mut dir = EntityDirectory::new();
        let response = dir.register("proxy-server", EntityKind::ProcessingNode).unwrap();
        dir.register("gas-sensor", EntityKind::Sensor).unwrap();
        let mut tk = TimeKeeper::new();
        let mut counter = 40;
        let mut ctx = SimContext::new(1, 12, &dir, &mut tk, &mut counter);

        let p = ThresholdProcessor::for_kind(AlertKind::Gas, response);
        assert!(p.process(&mut ctx, 95.5, &origin()).unwrap());
        assert!(!p.process(&mut ctx, 50.0, &origin()).unwrap());

        assert_eq!(ctx.outbox().len(), 1);
        let event = &ctx.outbox()[0];
        assert_eq!(event.time, 12);
        assert_eq!(event.target, response);
        assert_eq!(event.tag, EventTag::MessageArrival);

        let msg = event.payload.as_message().unwrap();
        assert_eq!(msg.type_tag, "GasAlert");
        assert_eq!(msg.destination_module_name, "response-module");
        assert_eq!(msg.source_entity_id, 1);
        assert_eq!(msg.user_id, 7);
        assert_eq!(msg.cpu_length, 1000);
        assert_eq!(msg.message_id, 40);
        assert!(!msg.is_tracked());
    }

    #[test]
    fn test_process_unknown_response_device() {
        let dir = EntityDirectory::new();
        let mut tk = TimeKeeper::new();
        let mut counter = 1;
        let mut ctx = SimContext::new(0, 0, &dir, &mut tk, &mut counter);

        let p = ThresholdProcessor::for_kind(AlertKind::Surrounding, 3);
        assert_eq!(
            p.process(&mut ctx, 9.0, &origin()),
            Err(EngineError::UnknownEntity(3))
        );
    }
}
