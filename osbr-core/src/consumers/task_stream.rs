//! TaskStream consumer.
//!
//! Streams the progress of one task execution to its observers. The task
//! engine publishes [`TaskUpdate`]s through the `Processor` impl; a
//! `Finished` update is terminal and ends the stream.

use super::{ConnectRejection, Consumer, StreamChannel};
use crate::broker::ConnectionManager;
use crate::config::StreamConfig;
use crate::identifier::{Identifier, IdentifierError, Namespace};
use async_trait::async_trait;
use kanau::processor::Processor;
use osbr_sdk::objects::{ConnectRequest, ProduceStatus, StreamEvent, TaskUpdate};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

pub const TASK_NAMESPACE: &str = "task";

/// Publish one task state change to whoever watches `task_id`.
#[derive(Debug, Clone)]
pub struct PublishTaskUpdate {
    pub task_id: String,
    pub update: TaskUpdate,
}

pub struct TaskStream {
    channel: StreamChannel,
}

impl TaskStream {
    pub fn new(
        config: StreamConfig,
        connections: Arc<ConnectionManager>,
    ) -> Result<Self, IdentifierError> {
        Ok(Self {
            channel: StreamChannel::new(Namespace::new(TASK_NAMESPACE)?, config, connections),
        })
    }

    pub fn channel(&self) -> &StreamChannel {
        &self.channel
    }
}

/// Turn a task update into its wire event.
fn task_event(task_id: &str, update: &TaskUpdate) -> StreamEvent {
    let at = time::OffsetDateTime::now_utc().unix_timestamp();
    match update {
        TaskUpdate::Progress { stage, percent } => StreamEvent::new(
            "task.progress",
            serde_json::json!({
                "task_id": task_id,
                "stage": stage,
                "percent": percent,
                "timestamp": at,
            }),
        ),
        TaskUpdate::Finished { outcome, detail } => StreamEvent::new(
            "task.finished",
            serde_json::json!({
                "task_id": task_id,
                "outcome": outcome,
                "detail": detail,
                "timestamp": at,
            }),
        ),
    }
}

impl Processor<PublishTaskUpdate> for TaskStream {
    type Output = ProduceStatus;
    type Error = Infallible;

    async fn process(&self, command: PublishTaskUpdate) -> Result<ProduceStatus, Infallible> {
        let PublishTaskUpdate { task_id, update } = command;
        let event = task_event(&task_id, &update);
        Ok(self
            .channel
            .produce(&task_id, event, update.is_terminal())
            .await)
    }
}

#[async_trait]
impl Consumer for TaskStream {
    fn namespace(&self) -> &Namespace {
        self.channel.namespace()
    }

    async fn on_connect(
        &self,
        token: &str,
        request: &ConnectRequest,
    ) -> Result<Option<StreamEvent>, ConnectRejection> {
        self.channel.connect(token, request).await
    }

    async fn on_disconnect(&self, identifier: &Identifier) {
        debug!(task_id = identifier.local_id(), "Task observer left, task keeps running");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubSidecar;
    use osbr_sdk::objects::{SendRequest, TaskOutcome};
    use std::time::Duration;

    #[tokio::test]
    async fn test_finished_task_closes_stream() {
        let sidecar = StubSidecar::spawn().await;
        let stream = TaskStream::new(
            StreamConfig::new("/stream/tasks", "task_id"),
            Arc::new(sidecar.manager(Duration::from_secs(2))),
        )
        .unwrap();

        let request = ConnectRequest {
            url: "/stream/tasks?task_id=42".into(),
            headers: Default::default(),
        };
        assert_eq!(stream.on_connect("t42", &request).await.unwrap(), None);

        let progress = stream
            .process(PublishTaskUpdate {
                task_id: "42".into(),
                update: TaskUpdate::Progress {
                    stage: "compile".into(),
                    percent: Some(50),
                },
            })
            .await
            .unwrap();
        assert_eq!(progress, ProduceStatus::Delivered);

        let finished = stream
            .process(PublishTaskUpdate {
                task_id: "42".into(),
                update: TaskUpdate::Finished {
                    outcome: TaskOutcome::Succeeded,
                    detail: None,
                },
            })
            .await
            .unwrap();
        assert_eq!(finished, ProduceStatus::Delivered);

        let requests = sidecar.requests();
        assert_eq!(requests.len(), 3);
        let names: Vec<_> = requests
            .iter()
            .filter_map(|r| r.event.as_ref().map(|e| e.name.as_str()))
            .collect();
        assert_eq!(names, ["task.progress", "task.finished"]);
        assert_eq!(requests[0].event.as_ref().unwrap().data["percent"], 50);
        assert_eq!(requests[1].event.as_ref().unwrap().data["outcome"], "succeeded");
        assert_eq!(requests[2], SendRequest::close("t42"));
    }
}
