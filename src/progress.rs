use serde::Serialize;

/// Kind of [`EventMessage`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum EventType {
    Start,
    Info,
    Warning,
    Error,
    Finish,
}

/// Which pipeline emitted an [`EventMessage`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Stage {
    Package,
    Validation,
}

/// Progress of a bagging or validation run
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    /// Kind of event
    pub event_type: EventType,
    /// Emitting pipeline
    pub stage: Stage,
    /// Human readable
    pub message: String,
    /// Files handled so far
    pub current: u64,
    /// Expected number of files, an estimate
    pub total: u64,
    /// `current * 100 / total`, never above 100
    pub percent: u8,
}

impl EventMessage {
    /// Event without a position
    pub fn new(event_type: EventType, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            event_type,
            stage,
            message: message.into(),
            current: 0,
            total: 0,
            percent: 0,
        }
    }

    /// Info event at position `current` of `total`
    pub fn progress(stage: Stage, message: impl Into<String>, current: u64, total: u64) -> Self {
        Self {
            current,
            total,
            percent: percent(current, total),
            ..Self::new(EventType::Info, stage, message)
        }
    }

    /// JSON representation
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("Error serializing event: {e}"))
    }
}

/// The total is only an estimate: tag files and manifests can outnumber what the profile
/// announced.
fn percent(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (current.saturating_mul(100) / total).min(100) as u8
}

/// Receiver of [`EventMessage`]s
///
/// Sending never fails from the point of view of the engine: when nobody listens anymore,
/// events are dropped. The engine never closes the channel behind a sink.
pub trait ProgressSink: Send + Sync {
    /// Deliver one event
    fn emit(&self, event: EventMessage);
}

impl ProgressSink for std::sync::mpsc::Sender<EventMessage> {
    fn emit(&self, event: EventMessage) {
        let _ = self.send(event);
    }
}

/// Blocks until the receiver takes the event when the channel is full
impl ProgressSink for std::sync::mpsc::SyncSender<EventMessage> {
    fn emit(&self, event: EventMessage) {
        let _ = self.send(event);
    }
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<EventMessage> {
    fn emit(&self, event: EventMessage) {
        let _ = self.send(event);
    }
}

/// Optional sink with a running position, shared by the bagger and the validator
#[derive(Default)]
pub(crate) struct Progress {
    sink: Option<Box<dyn ProgressSink>>,
    pub(crate) current: u64,
    pub(crate) total: u64,
}

impl Progress {
    pub(crate) fn set_sink(&mut self, sink: Box<dyn ProgressSink>) {
        self.sink = Some(sink);
    }

    pub(crate) fn reset(&mut self, total: u64) {
        self.current = 0;
        self.total = total;
    }

    /// Report one step and advance the position
    pub(crate) fn step(&mut self, stage: Stage, message: impl Into<String>) {
        if let Some(sink) = &self.sink {
            sink.emit(EventMessage::progress(stage, message, self.current, self.total));
        }
        self.current += 1;
    }

    pub(crate) fn event(&self, event_type: EventType, stage: Stage, message: impl Into<String>) {
        if let Some(sink) = &self.sink {
            sink.emit(EventMessage::new(event_type, stage, message));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        for (current, total, output) in [(0, 0, 0), (0, 10, 0), (5, 10, 50), (10, 10, 100), (14, 10, 100)] {
            assert_eq!(
                percent(current, total),
                output,
                "failing on input `{current}/{total}`"
            );
        }
    }

    #[test]
    fn channels() {
        let (sender, receiver) = std::sync::mpsc::channel();
        let mut progress = Progress::default();
        progress.set_sink(Box::new(sender));
        progress.reset(2);
        for name in ["one", "two", "three"] {
            progress.step(Stage::Package, name);
        }
        progress.event(EventType::Finish, Stage::Package, "done");

        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(
            events.iter().map(|e| e.percent).collect::<Vec<_>>(),
            vec![0, 50, 100, 0]
        );
        assert_eq!(events[3].event_type, EventType::Finish);
        assert_eq!(
            events[1].to_json(),
            r#"{"eventType":"info","stage":"package","message":"two","current":1,"total":2,"percent":50}"#
        );

        // Nobody listening
        drop(receiver);
        progress.step(Stage::Package, "four");
    }

    #[tokio::test]
    async fn tokio_channel() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        sender.emit(EventMessage::new(EventType::Start, Stage::Validation, "start"));
        assert_eq!(receiver.recv().await.map(|e| e.stage), Some(Stage::Validation));
    }
}
