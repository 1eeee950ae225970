//! One chat connection: query decoding, admission, agent run, reply shaping.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::messages::{ClientQuery, ResponseData, ServerMessage};
use crate::rate_limiter::{Admission, RateLimiter};
use crate::types::{ChatConfig, Error, Result};

const CONNECTED: &str = "Connected to Market Query AI";
const PROCESSING: &str = "Processing your query...";
const INVALID_JSON: &str = "Invalid JSON format";
const UPSTREAM_RATE_LIMITED: &str = "API rate limit exceeded. Please wait a minute before trying again. Consider using simpler queries or reducing query frequency.";

/// Result of one agent run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    /// Final answer text.
    pub output: String,
    /// Tool names called during the run, possibly repeated.
    pub tools_used: Vec<String>,
    /// Complete conversation after the run, in the runtime's own message format.
    pub history: Vec<Value>,
}

/// The external LLM agent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Answer `query` given the prior conversation.
    async fn run(&self, query: &str, history: &[Value]) -> Result<AgentReply>;
}

/// Per-connection state. The limiter is shared across sessions; history is not.
pub struct ChatSession<A: ?Sized> {
    id: Uuid,
    agent: Arc<A>,
    limiter: Arc<RateLimiter>,
    agent_timeout: Duration,
    history: Vec<Value>,
}

impl<A: AgentRuntime + ?Sized> ChatSession<A> {
    pub fn new(agent: Arc<A>, limiter: Arc<RateLimiter>, config: &ChatConfig) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, "chat session opened");
        Self {
            id,
            agent,
            limiter,
            agent_timeout: config.agent_timeout,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &[Value] {
        &self.history
    }

    /// Greeting sent once the session is ready.
    pub fn connected(&self) -> ServerMessage {
        ServerMessage::Connected {
            message: CONNECTED.to_string(),
        }
    }

    /// Handle one raw client message, emitting zero or more replies on `out`.
    ///
    /// Fails only when `out` is closed.
    pub async fn handle_text(&mut self, raw: &str, out: &mpsc::Sender<ServerMessage>) -> Result<()> {
        let query = match serde_json::from_str::<ClientQuery>(raw) {
            Ok(q) => q.query.trim().to_string(),
            Err(_) => return emit(out, ServerMessage::error(INVALID_JSON)).await,
        };
        if query.is_empty() {
            return Ok(());
        }

        if let Admission::Denied { retry_after } = self.limiter.acquire() {
            tracing::info!(session = %self.id, wait_secs = retry_after.as_secs(), "query rate limited");
            return emit(
                out,
                ServerMessage::error(format!(
                    "Rate limit exceeded. Please wait {} seconds before trying again. This helps prevent API rate limit errors.",
                    retry_after.as_secs()
                )),
            )
            .await;
        }

        emit(
            out,
            ServerMessage::Processing {
                message: PROCESSING.to_string(),
            },
        )
        .await?;

        let reply = match tokio::time::timeout(self.agent_timeout, self.agent.run(&query, &self.history)).await
        {
            Err(_elapsed) => {
                tracing::warn!(session = %self.id, "agent run timed out");
                return emit(
                    out,
                    ServerMessage::error(format!(
                        "Query timed out after {} seconds. Please try a simpler query or try again later.",
                        self.agent_timeout.as_secs()
                    )),
                )
                .await;
            }
            Ok(Err(e)) => {
                tracing::warn!(session = %self.id, error = %e, "agent run failed");
                return emit(out, ServerMessage::error(describe_agent_error(&e))).await;
            }
            Ok(Ok(reply)) => reply,
        };

        let tools_used: Vec<String> = reply
            .tools_used
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        tracing::info!(session = %self.id, tools = ?tools_used, "agent run completed");

        // The full history is kept so tool calls stay paired with their results.
        self.history = reply.history;

        emit(
            out,
            ServerMessage::Response {
                data: ResponseData {
                    output: reply.output,
                    tools_used,
                },
            },
        )
        .await
    }
}

impl<A: ?Sized> fmt::Debug for ChatSession<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("agent_timeout", &self.agent_timeout)
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

fn describe_agent_error(err: &Error) -> String {
    let message = err.to_string();
    if message.contains("rate_limit_error") || message.contains("429") {
        UPSTREAM_RATE_LIMITED.to_string()
    } else {
        format!("Error: {}", message)
    }
}

async fn emit(out: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> Result<()> {
    out.send(message)
        .await
        .map_err(|_| Error::cancelled("client disconnected"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RateLimitConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn limiter(max_requests: u32) -> Arc<RateLimiter> {
        Arc::new(
            RateLimiter::new(&RateLimitConfig {
                max_requests,
                window: Duration::from_secs(60),
            })
            .unwrap(),
        )
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn session<A: AgentRuntime>(agent: A, limiter: Arc<RateLimiter>) -> ChatSession<A> {
        ChatSession::new(Arc::new(agent), limiter, &ChatConfig::default())
    }

    #[tokio::test]
    async fn test_successful_query() {
        let mut agent = MockAgentRuntime::new();
        agent
            .expect_run()
            .withf(|query, history| query == "price of AAPL?" && history.is_empty())
            .times(1)
            .returning(|_, _| {
                Ok(AgentReply {
                    output: "AAPL closed at $150.00".to_string(),
                    tools_used: vec![
                        "get_stock_price".to_string(),
                        "get_ticker_details".to_string(),
                        "get_stock_price".to_string(),
                    ],
                    history: vec![json!({"role": "user"}), json!({"role": "assistant"})],
                })
            });

        let mut session = session(agent, limiter(3));
        let (tx, mut rx) = mpsc::channel(8);
        session
            .handle_text(r#"{"query": "  price of AAPL?  "}"#, &tx)
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::Processing {
                    message: PROCESSING.to_string()
                },
                ServerMessage::Response {
                    data: ResponseData {
                        output: "AAPL closed at $150.00".to_string(),
                        tools_used: vec![
                            "get_stock_price".to_string(),
                            "get_ticker_details".to_string()
                        ],
                    }
                },
            ]
        );
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_history_carries_into_next_run() {
        let mut agent = MockAgentRuntime::new();
        let mut seq = mockall::Sequence::new();
        agent
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(AgentReply {
                    output: "first".into(),
                    tools_used: vec![],
                    history: vec![json!("q1"), json!("a1")],
                })
            });
        agent
            .expect_run()
            .withf(|_, history| history == [json!("q1"), json!("a1")])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(AgentReply::default()));

        let mut session = session(agent, limiter(3));
        let (tx, _rx) = mpsc::channel(8);
        session.handle_text(r#"{"query":"one"}"#, &tx).await.unwrap();
        session.handle_text(r#"{"query":"two"}"#, &tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_json_and_blank_query() {
        let mut agent = MockAgentRuntime::new();
        agent.expect_run().never();
        let limiter = limiter(1);

        let mut session = session(agent, limiter.clone());
        let (tx, mut rx) = mpsc::channel(8);
        session.handle_text("not json", &tx).await.unwrap();
        session.handle_text(r#"{"query": "   "}"#, &tx).await.unwrap();
        session.handle_text("{}", &tx).await.unwrap();

        assert_eq!(drain(&mut rx), vec![ServerMessage::error(INVALID_JSON)]);
        // Ignored messages do not consume admissions.
        assert_eq!(limiter.in_window(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_query_skips_agent() {
        let mut agent = MockAgentRuntime::new();
        agent
            .expect_run()
            .times(1)
            .returning(|_, _| Ok(AgentReply::default()));

        let mut session = session(agent, limiter(1));
        let (tx, mut rx) = mpsc::channel(8);
        session.handle_text(r#"{"query":"one"}"#, &tx).await.unwrap();
        drain(&mut rx);

        session.handle_text(r#"{"query":"two"}"#, &tx).await.unwrap();
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ServerMessage::Error { message } => {
                assert!(message.starts_with("Rate limit exceeded. Please wait "), "{message}");
                assert!(message.ends_with("seconds before trying again. This helps prevent API rate limit errors."));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_limiter_shared_between_sessions() {
        let shared = limiter(1);
        let mut first_agent = MockAgentRuntime::new();
        first_agent
            .expect_run()
            .returning(|_, _| Ok(AgentReply::default()));
        let mut second_agent = MockAgentRuntime::new();
        second_agent.expect_run().never();

        let mut first = session(first_agent, shared.clone());
        let mut second = session(second_agent, shared);
        assert_ne!(first.id(), second.id());

        let (tx, mut rx) = mpsc::channel(8);
        first.handle_text(r#"{"query":"a"}"#, &tx).await.unwrap();
        drain(&mut rx);
        second.handle_text(r#"{"query":"b"}"#, &tx).await.unwrap();
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Error { .. }]));
    }

    #[tokio::test]
    async fn test_agent_errors_are_reported() {
        let mut agent = MockAgentRuntime::new();
        let mut seq = mockall::Sequence::new();
        agent
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(Error::agent("status 429: rate_limit_error")));
        agent
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(Error::agent("model overloaded")));

        let mut session = session(agent, limiter(5));
        let (tx, mut rx) = mpsc::channel(8);

        session.handle_text(r#"{"query":"a"}"#, &tx).await.unwrap();
        assert_eq!(drain(&mut rx)[1], ServerMessage::error(UPSTREAM_RATE_LIMITED));

        session.handle_text(r#"{"query":"b"}"#, &tx).await.unwrap();
        assert_eq!(drain(&mut rx)[1], ServerMessage::error("Error: model overloaded"));
        assert!(session.history().is_empty());
    }

    struct StalledAgent;

    #[async_trait]
    impl AgentRuntime for StalledAgent {
        async fn run(&self, _query: &str, _history: &[Value]) -> Result<AgentReply> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AgentReply::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_timeout() {
        let mut session = session(StalledAgent, limiter(5));
        let (tx, mut rx) = mpsc::channel(8);
        session.handle_text(r#"{"query":"slow"}"#, &tx).await.unwrap();

        assert_eq!(
            drain(&mut rx)[1],
            ServerMessage::error(
                "Query timed out after 60 seconds. Please try a simpler query or try again later."
            )
        );
    }

    #[tokio::test]
    async fn test_closed_output_is_an_error() {
        let agent = MockAgentRuntime::new();
        let mut session = session(agent, limiter(1));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = session.handle_text("garbage", &tx).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }

    #[test]
    fn test_connected_greeting() {
        let session = session(MockAgentRuntime::new(), limiter(1));
        assert_eq!(
            session.connected(),
            ServerMessage::Connected {
                message: CONNECTED.to_string()
            }
        );
    }
}
