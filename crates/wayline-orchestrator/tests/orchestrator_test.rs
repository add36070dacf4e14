//! End-to-end orchestration tests over the in-memory bus and an in-memory
//! SQLite ledger, with a simulated external worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use wayline_bus::{MemoryBus, MessageBus};
use wayline_config::{HandlerDef, WorkflowConfig, WorkflowDef, WorkflowKind};
use wayline_ledger::{Ledger, SqliteLedger};
use wayline_message::QueueMessage;
use wayline_orchestrator::{
  DelegationContext, EventDispatcher, Orchestrator, StageError, StageSubscriber,
  SubscriptionManager,
};
use wayline_registry::WorkflowRegistry;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn trigger_def(identifier: &str, stage: &str, topic: &str) -> WorkflowDef {
  WorkflowDef {
    identifier: identifier.to_string(),
    kind: WorkflowKind::Trigger,
    group: "osw-upload".to_string(),
    stage: stage.to_string(),
    handlers: vec![HandlerDef {
      identifier: "publish_message".to_string(),
      delegate_workflow: vec![],
      params: json!({"topic": topic}),
    }],
  }
}

fn handler_def(identifier: &str, stage: &str, delegates: &[&str]) -> WorkflowDef {
  WorkflowDef {
    identifier: identifier.to_string(),
    kind: WorkflowKind::Handler,
    group: "osw-upload".to_string(),
    stage: stage.to_string(),
    handlers: vec![HandlerDef {
      identifier: "update_job_status".to_string(),
      delegate_workflow: delegates.iter().map(|s| s.to_string()).collect(),
      params: serde_json::Value::Null,
    }],
  }
}

fn pipeline_config() -> WorkflowConfig {
  WorkflowConfig {
    workflows: vec![
      trigger_def("UPLOAD_VALIDATE", "validate", "osw-validate-request"),
      handler_def("UPLOAD_VALIDATE_RESPONSE", "validate", &["UPLOAD_FORMAT"]),
      trigger_def("UPLOAD_FORMAT", "format", "osw-format-request"),
      handler_def("UPLOAD_FORMAT_RESPONSE", "format", &[]),
    ],
    subscriptions: vec![
      wayline_config::SubscriptionDef {
        topic: "osw-validate-response".to_string(),
        subscription: "wayline-validate".to_string(),
      },
      // Deployments may also feed triggers in over the bus.
      wayline_config::SubscriptionDef {
        topic: "osw-trigger-redelivery".to_string(),
        subscription: "wayline-redelivery".to_string(),
      },
    ],
  }
}

/// Trigger-side stage: publish the request for the external worker.
struct PublishingTrigger {
  orchestrator: Arc<Orchestrator>,
  topic: String,
}

#[async_trait]
impl StageSubscriber for PublishingTrigger {
  async fn on_message(
    &self,
    message: QueueMessage,
    _delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    self.orchestrator.publish_message(&self.topic, &message).await?;
    Ok(())
  }
}

/// Response-side stage: advance to the next stages when the worker
/// reported success.
struct AdvancingHandler {
  orchestrator: Arc<Orchestrator>,
  next: Vec<String>,
}

#[async_trait]
impl StageSubscriber for AdvancingHandler {
  async fn on_message(
    &self,
    message: QueueMessage,
    _delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    if message.success() {
      self
        .orchestrator
        .delegate_workflow_if_any(&self.next, &message)
        .await?;
    }
    Ok(())
  }
}

/// Records every message it sees.
struct Probe {
  sender: mpsc::UnboundedSender<QueueMessage>,
}

#[async_trait]
impl StageSubscriber for Probe {
  async fn on_message(
    &self,
    message: QueueMessage,
    _delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    let _ = self.sender.send(message);
    Ok(())
  }
}

struct Harness {
  orchestrator: Arc<Orchestrator>,
  bus: Arc<MemoryBus>,
  ledger: Arc<SqliteLedger>,
  dispatcher: Arc<EventDispatcher>,
  cancel: CancellationToken,
}

async fn harness() -> Harness {
  let registry = Arc::new(WorkflowRegistry::load(pipeline_config()));
  let ledger = Arc::new(SqliteLedger::in_memory().await.unwrap());
  let bus = Arc::new(MemoryBus::new());
  let dispatcher = Arc::new(EventDispatcher::new());

  let orchestrator = Arc::new(Orchestrator::new(
    registry.clone(),
    ledger.clone(),
    bus.clone(),
    dispatcher.clone(),
  ));

  let manager = SubscriptionManager::new(registry, bus.clone(), ledger.clone(), dispatcher.clone());
  let cancel = CancellationToken::new();
  manager.start(cancel.clone()).await.unwrap();

  Harness {
    orchestrator,
    bus,
    ledger,
    dispatcher,
    cancel,
  }
}

/// Simulated external worker: consume requests from a topic, reply with a
/// successful response message on the response topic.
async fn spawn_worker(bus: Arc<MemoryBus>, request_topic: &str, response_type: &'static str) {
  let mut requests = bus.subscribe(request_topic, "worker").await.unwrap();
  tokio::spawn(async move {
    while let Some(raw) = requests.recv().await {
      let request = QueueMessage::from_json(&raw).unwrap();
      let reply = QueueMessage::new(
        request.reference_id.clone(),
        response_type,
        json!({"success": true, "message": "stage complete"}),
      );
      bus.publish("osw-validate-response", &reply).await.unwrap();
    }
  });
}

#[tokio::test]
async fn test_full_stage_cycle_advances_to_next_trigger() {
  let h = harness().await;

  h.dispatcher.subscribe(
    "UPLOAD_VALIDATE",
    Arc::new(PublishingTrigger {
      orchestrator: h.orchestrator.clone(),
      topic: "osw-validate-request".to_string(),
    }),
  );
  h.dispatcher.subscribe(
    "UPLOAD_VALIDATE_RESPONSE",
    Arc::new(AdvancingHandler {
      orchestrator: h.orchestrator.clone(),
      next: vec!["UPLOAD_FORMAT".to_string()],
    }),
  );
  let (sender, mut format_rx) = mpsc::unbounded_channel();
  h.dispatcher.subscribe("UPLOAD_FORMAT", Arc::new(Probe { sender }));

  spawn_worker(h.bus.clone(), "osw-validate-request", "UPLOAD_VALIDATE_RESPONSE").await;

  h.orchestrator
    .trigger_workflow("UPLOAD_VALIDATE", QueueMessage::new("42", "", json!({})))
    .await
    .unwrap();

  // The next stage's trigger fires with the same reference id.
  let advanced = timeout(RECV_TIMEOUT, format_rx.recv()).await.unwrap().unwrap();
  assert_eq!(advanced.reference_id, "42");
  assert_eq!(advanced.message_type, "UPLOAD_FORMAT");
  assert!(advanced.success());

  // The run's most recent ledger record is the format stage's request.
  let record = h.ledger.latest("42", "osw-upload").await.unwrap().unwrap();
  assert_eq!(record.stage, "format");
  assert!(record.response.is_none());

  h.cancel.cancel();
}

#[tokio::test]
async fn test_worker_reply_is_logged_as_response() {
  let h = harness().await;

  h.dispatcher.subscribe(
    "UPLOAD_VALIDATE",
    Arc::new(PublishingTrigger {
      orchestrator: h.orchestrator.clone(),
      topic: "osw-validate-request".to_string(),
    }),
  );
  let (sender, mut response_rx) = mpsc::unbounded_channel();
  h.dispatcher
    .subscribe("UPLOAD_VALIDATE_RESPONSE", Arc::new(Probe { sender }));

  spawn_worker(h.bus.clone(), "osw-validate-request", "UPLOAD_VALIDATE_RESPONSE").await;

  h.orchestrator
    .trigger_workflow("UPLOAD_VALIDATE", QueueMessage::new("42", "", json!({})))
    .await
    .unwrap();

  let reply = timeout(RECV_TIMEOUT, response_rx.recv()).await.unwrap().unwrap();
  assert!(reply.success());

  // Response landed on the validate stage's request row.
  let record = h.ledger.latest("42", "osw-upload").await.unwrap().unwrap();
  assert_eq!(record.stage, "validate");
  let response = record.response.unwrap();
  assert_eq!(response.0["success"], json!(true));

  h.cancel.cancel();
}

#[tokio::test]
async fn test_failed_reply_does_not_advance() {
  let h = harness().await;

  h.dispatcher.subscribe(
    "UPLOAD_VALIDATE_RESPONSE",
    Arc::new(AdvancingHandler {
      orchestrator: h.orchestrator.clone(),
      next: vec!["UPLOAD_FORMAT".to_string()],
    }),
  );
  let (sender, mut format_rx) = mpsc::unbounded_channel();
  h.dispatcher.subscribe("UPLOAD_FORMAT", Arc::new(Probe { sender }));

  // Seed the request row, then deliver a failed reply from the bus.
  h.ledger
    .log_request(
      "osw-upload",
      "validate",
      &QueueMessage::new("42", "UPLOAD_VALIDATE", json!({})),
    )
    .await
    .unwrap();
  h.bus
    .publish(
      "osw-validate-response",
      &QueueMessage::new(
        "42",
        "UPLOAD_VALIDATE_RESPONSE",
        json!({"success": false, "message": "validation failed"}),
      ),
    )
    .await
    .unwrap();

  // The failure is recorded but the pipeline stays parked at validate.
  let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
  loop {
    let record = h.ledger.latest("42", "osw-upload").await.unwrap().unwrap();
    if record.response.is_some() {
      assert_eq!(record.stage, "validate");
      break;
    }
    assert!(tokio::time::Instant::now() < deadline, "response never logged");
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  // Give a buggy advancement a moment to surface before asserting silence.
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(format_rx.try_recv().is_err());

  h.cancel.cancel();
}

#[tokio::test]
async fn test_undecodable_payload_is_dropped() {
  let h = harness().await;

  let (sender, mut rx) = mpsc::unbounded_channel();
  h.dispatcher
    .subscribe("UPLOAD_VALIDATE_RESPONSE", Arc::new(Probe { sender }));

  // Seed a request row so the good reply below has somewhere to land.
  h.ledger
    .log_request(
      "osw-upload",
      "validate",
      &QueueMessage::new("42", "UPLOAD_VALIDATE", json!({})),
    )
    .await
    .unwrap();

  // Raw garbage straight onto the subscribed topic, then a good reply.
  h.bus.publish_raw("osw-validate-response", "not json at all {");
  h.bus
    .publish(
      "osw-validate-response",
      &QueueMessage::new("42", "UPLOAD_VALIDATE_RESPONSE", json!({"success": true})),
    )
    .await
    .unwrap();

  // The garbage was logged and dropped; the decodable message still flows.
  let ok = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
  assert_eq!(ok.reference_id, "42");

  h.cancel.cancel();
}

#[tokio::test]
async fn test_redelivered_trigger_converges_on_one_record() {
  let h = harness().await;

  let (sender, mut rx) = mpsc::unbounded_channel();
  h.dispatcher.subscribe("UPLOAD_VALIDATE", Arc::new(Probe { sender }));

  // The same trigger delivered twice from the bus (at-least-once).
  let trigger = QueueMessage::new("42", "UPLOAD_VALIDATE", json!({"attempt": 2}));
  h.bus.publish("osw-trigger-redelivery", &trigger).await.unwrap();
  h.bus.publish("osw-trigger-redelivery", &trigger).await.unwrap();

  // Both deliveries dispatch, but the ledger converges on one record.
  timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
  timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();

  let record = h.ledger.latest("42", "osw-upload").await.unwrap().unwrap();
  assert_eq!(record.stage, "validate");
  assert_eq!(record.request.0, json!({"attempt": 2}));

  h.cancel.cancel();
}
