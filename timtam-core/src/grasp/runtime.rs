//! Runtime Grasp: one configured judgment unit bound to a judgment client.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use super::cooldown::Cooldown;
use super::notebook::Notebook;
use super::template::with_preamble;
use super::window::WindowBuffer;
use crate::config::GraspConfig;
use crate::error::Result;
use crate::traits::{JudgeClient, MetricsSink, Notifier, metric};
use crate::types::{JudgeResult, MeetingId};

/// Everything a Grasp touches while it runs, borrowed from its meeting.
pub struct ExecContext<'a> {
    pub meeting_id: &'a MeetingId,
    pub window: &'a WindowBuffer,
    pub notebook: &'a mut Notebook,
    pub notifier: &'a dyn Notifier,
    pub metrics: &'a dyn MetricsSink,
}

/// How one execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraspOutcome {
    /// The model asked to intervene and the output was dispatched.
    Acted,
    /// The model answered but declined to intervene.
    Declined,
    /// The model's answer could not be interpreted.
    NoDecision,
    /// Rendering, the judgment call, or dispatch failed.
    Failed(String),
}

pub struct Grasp {
    config: GraspConfig,
    cooldown: Cooldown,
    judge: Arc<dyn JudgeClient>,
}

impl std::fmt::Debug for Grasp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grasp")
            .field("node_id", &self.config.node_id)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

impl Grasp {
    pub fn new(config: GraspConfig, judge: Arc<dyn JudgeClient>) -> Self {
        let cooldown = Cooldown::new(config.cooldown_ms());
        Self {
            config,
            cooldown,
            judge,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn config(&self) -> &GraspConfig {
        &self.config
    }

    pub fn should_execute(&self, now_ms: i64) -> bool {
        self.cooldown.should_execute(now_ms)
    }

    pub fn mark_executed(&mut self, now_ms: i64) {
        self.cooldown.mark_executed(now_ms);
    }

    pub fn build_prompt(&self, window: &WindowBuffer, notebook: &Notebook, now_ms: i64) -> String {
        self.config
            .prompt
            .render(window, notebook, self.config.input_length, now_ms)
    }

    /// Call the judgment client and record the exchange for audit.
    pub async fn invoke(
        &self,
        prompt: &str,
        meeting_id: &MeetingId,
        notifier: &dyn Notifier,
    ) -> Result<JudgeResult> {
        let result = self.judge.invoke(prompt, &self.config.node_id).await?;
        notifier
            .post_log_entry(
                meeting_id,
                &result.prompt,
                &result.raw_response,
                &self.config.node_id,
            )
            .await?;
        Ok(result)
    }

    /// Dispatch a positive decision to chat and/or the notebook.
    pub async fn reflect(
        &self,
        result: &JudgeResult,
        ctx: &mut ExecContext<'_>,
        now_ms: i64,
    ) -> Result<GraspOutcome> {
        let decision = match &result.decision {
            None => return Ok(GraspOutcome::NoDecision),
            Some(d) if !d.should_intervene => return Ok(GraspOutcome::Declined),
            Some(d) => d,
        };

        let handler = self.config.output_handler;
        if handler.writes_chat() {
            ctx.notifier
                .post_chat(ctx.meeting_id, &decision.message)
                .await?;
        }
        if handler.writes_note() {
            ctx.notebook.add_note(
                self.config.note_tag(),
                decision.message.clone(),
                self.config.node_id.clone(),
                now_ms,
            );
        }
        Ok(GraspOutcome::Acted)
    }

    /// Build, invoke, reflect and record metrics.
    ///
    /// Never fails: errors are logged and counted, and the cooldown advances
    /// either way so a broken Grasp cannot retry on every tick.
    pub async fn execute(
        &mut self,
        ctx: &mut ExecContext<'_>,
        event_timestamp_ms: Option<i64>,
        now_ms: i64,
    ) -> GraspOutcome {
        let started = Instant::now();
        let outcome = match self.run(ctx, now_ms).await {
            Ok(outcome) => {
                let finished_ms = now_ms + started.elapsed().as_millis() as i64;
                ctx.metrics.put_latency(
                    &metric::execution_latency(&self.config.node_id),
                    started.elapsed().as_secs_f64() * 1000.0,
                );
                if let Some(ts) = event_timestamp_ms {
                    ctx.metrics.put_latency(
                        &metric::e2e_latency(&self.config.node_id),
                        (finished_ms - ts) as f64,
                    );
                }
                debug!(
                    meeting_id = %ctx.meeting_id,
                    node_id = %self.config.node_id,
                    outcome = ?outcome,
                    "grasp.executed"
                );
                outcome
            }
            Err(e) => {
                error!(
                    meeting_id = %ctx.meeting_id,
                    node_id = %self.config.node_id,
                    error = %e,
                    "grasp.error"
                );
                ctx.metrics.put_count(&metric::errors(&self.config.node_id), 1);
                GraspOutcome::Failed(e.to_string())
            }
        };
        self.cooldown
            .mark_executed(now_ms + started.elapsed().as_millis() as i64);
        outcome
    }

    async fn run(&self, ctx: &mut ExecContext<'_>, now_ms: i64) -> Result<GraspOutcome> {
        let prompt = with_preamble(&self.build_prompt(ctx.window, &*ctx.notebook, now_ms));
        let result = self.invoke(&prompt, ctx.meeting_id, ctx.notifier).await?;
        self.reflect(&result, ctx, now_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grasp::template::PromptTemplate;
    use crate::testing::{RecordingMetrics, RecordingNotifier, ScriptedJudge};
    use crate::types::OutputHandler;

    const BASE: i64 = 1_705_314_600_000;

    fn config(handler: OutputHandler, note_tag: Option<&str>) -> GraspConfig {
        GraspConfig {
            node_id: "nodder".into(),
            prompt: PromptTemplate::literal("Recent: {{INPUT:latest2}}").unwrap(),
            interval_sec: 15.0,
            output_handler: handler,
            note_tag: note_tag.map(String::from),
            input_length: None,
        }
    }

    struct Fixture {
        meeting_id: MeetingId,
        window: WindowBuffer,
        notebook: Notebook,
        notifier: RecordingNotifier,
        metrics: RecordingMetrics,
    }

    impl Fixture {
        fn new() -> Self {
            let meeting_id = MeetingId::new("m-1");
            let mut window = WindowBuffer::new();
            window.push("[alice] hello", BASE);
            Self {
                notebook: Notebook::new(meeting_id.clone()),
                meeting_id,
                window,
                notifier: RecordingNotifier::default(),
                metrics: RecordingMetrics::default(),
            }
        }

        fn ctx(&mut self) -> ExecContext<'_> {
            ExecContext {
                meeting_id: &self.meeting_id,
                window: &self.window,
                notebook: &mut self.notebook,
                notifier: &self.notifier,
                metrics: &self.metrics,
            }
        }
    }

    #[tokio::test]
    async fn test_chat_grasp_posts_message() {
        let judge = Arc::new(ScriptedJudge::intervene("nice point"));
        let mut grasp = Grasp::new(config(OutputHandler::Chat, None), judge.clone());
        let mut fx = Fixture::new();

        let outcome = grasp.execute(&mut fx.ctx(), Some(BASE - 500), BASE).await;

        assert_eq!(outcome, GraspOutcome::Acted);
        assert_eq!(fx.notifier.chats(), vec![("m-1".to_string(), "nice point".to_string())]);
        assert_eq!(fx.notifier.log_entries().len(), 1);
        assert!(fx.notebook.is_empty());

        let prompt = &judge.prompts()[0];
        assert!(prompt.contains("\"should_intervene\""));
        assert!(prompt.ends_with("Recent: [10:30:00] [alice] hello"));

        assert_eq!(fx.metrics.latencies("Grasp.nodder.ExecutionLatency").len(), 1);
        let e2e = fx.metrics.latencies("Grasp.nodder.E2ELatency");
        assert_eq!(e2e.len(), 1);
        assert!(e2e[0] >= 500.0);
    }

    #[tokio::test]
    async fn test_note_grasp_writes_tagged_note() {
        let judge = Arc::new(ScriptedJudge::intervene("they disagree on scope"));
        let mut grasp = Grasp::new(config(OutputHandler::Note, Some("arguments")), judge);
        let mut fx = Fixture::new();

        grasp.execute(&mut fx.ctx(), None, BASE).await;

        assert!(fx.notifier.chats().is_empty());
        let note = fx.notebook.latest_note("arguments").unwrap();
        assert_eq!(note.content, "they disagree on scope");
        assert_eq!(note.created_by, "nodder");
        assert!(fx.metrics.latencies("Grasp.nodder.E2ELatency").is_empty());
    }

    #[tokio::test]
    async fn test_both_without_tag_defaults_to_node_id() {
        let judge = Arc::new(ScriptedJudge::intervene("hi"));
        let mut grasp = Grasp::new(config(OutputHandler::Both, None), judge);
        let mut fx = Fixture::new();

        grasp.execute(&mut fx.ctx(), None, BASE).await;

        assert_eq!(fx.notifier.chats().len(), 1);
        assert!(fx.notebook.latest_note("nodder").is_some());
    }

    #[tokio::test]
    async fn test_declined_and_unparseable_have_no_side_effects() {
        let mut fx = Fixture::new();

        let mut grasp = Grasp::new(
            config(OutputHandler::Both, Some("t")),
            Arc::new(ScriptedJudge::decline()),
        );
        assert_eq!(grasp.execute(&mut fx.ctx(), None, BASE).await, GraspOutcome::Declined);

        let mut grasp = Grasp::new(
            config(OutputHandler::Both, Some("t")),
            Arc::new(ScriptedJudge::no_decision("I think so?")),
        );
        assert_eq!(
            grasp.execute(&mut fx.ctx(), None, BASE).await,
            GraspOutcome::NoDecision
        );

        assert!(fx.notifier.chats().is_empty());
        assert!(fx.notebook.is_empty());
        // audit entries are still written
        assert_eq!(fx.notifier.log_entries().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_judge_still_advances_cooldown() {
        let mut grasp = Grasp::new(
            config(OutputHandler::Chat, None),
            Arc::new(ScriptedJudge::failing("boom")),
        );
        let mut fx = Fixture::new();
        assert!(grasp.should_execute(BASE));

        let outcome = grasp.execute(&mut fx.ctx(), None, BASE).await;

        assert!(matches!(outcome, GraspOutcome::Failed(ref msg) if msg.contains("boom")));
        assert!(!grasp.should_execute(BASE + 1_000));
        assert!(grasp.should_execute(BASE + 15_000 + 1_000));
        assert_eq!(fx.metrics.count("Grasp.nodder.Errors"), 1);
        assert!(fx.notifier.chats().is_empty());
    }

    #[tokio::test]
    async fn test_notifier_failure_is_contained() {
        let mut grasp = Grasp::new(
            config(OutputHandler::Chat, None),
            Arc::new(ScriptedJudge::intervene("hello")),
        );
        let mut fx = Fixture::new();
        fx.notifier.fail_all();

        let outcome = grasp.execute(&mut fx.ctx(), None, BASE).await;

        assert!(matches!(outcome, GraspOutcome::Failed(_)));
        assert_eq!(fx.metrics.count("Grasp.nodder.Errors"), 1);
        assert!(!grasp.should_execute(BASE + 1));
    }
}
