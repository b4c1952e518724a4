//! Top-level coordinator for one research run
//!
//! ```text
//! recall → plan → fetch (parallel) → specialists (parallel)
//!        → chain ∥ routing → evaluator-optimizer → reflection → record
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use research_core::{
    AgentAnalysis, DataSnapshot, MemoryEntry, QualityAssessment, Reasoner, ResearchError,
    ResearchPlan, ResearchReport, WorkflowResult,
};
use research_data::{
    AlphaVantageClient, DataSourceGateway, FredClient, SecEdgarClient, SnapshotCache,
    YahooFinanceClient,
};
use research_llm::providers::openai::{OpenAIConfig, OpenAIProvider};
use research_llm::LlmReasoner;
use research_workflow::{
    detect_ticker, EvaluatorOptimizerWorkflow, PromptChainWorkflow, RoutingWorkflow,
};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ResearchConfig;
use crate::memory::MemoryStore;
use crate::planner::Planner;
use crate::reflection::{ReflectionEngine, RunSummary};
use crate::specialist::{RoleContext, SpecialistAgent};

/// Results gathered before a run failed
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartialResults {
    pub plan: Option<ResearchPlan>,
    pub snapshots: Vec<DataSnapshot>,
    pub analyses: Vec<AgentAnalysis>,
    pub workflows: Vec<WorkflowResult>,
}

/// A run that did not produce a report
#[derive(Debug, Error)]
#[error("research run {run_id} on '{topic}' failed: {error}")]
pub struct RunFailure {
    pub run_id: Uuid,
    pub topic: String,
    #[source]
    pub error: ResearchError,
    pub partial: PartialResults,
}

impl RunFailure {
    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

/// Mutable state of a run in progress, frozen into a [`ResearchReport`]
pub(crate) struct ReportDraft {
    run_id: Uuid,
    topic: String,
    started_at: DateTime<Utc>,
    plan: Option<ResearchPlan>,
    snapshots: Vec<DataSnapshot>,
    analyses: Vec<AgentAnalysis>,
    workflows: Vec<WorkflowResult>,
    quality: Option<QualityAssessment>,
    memory_entry: Option<MemoryEntry>,
}

impl ReportDraft {
    fn new(topic: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.trim().to_string(),
            started_at: Utc::now(),
            plan: None,
            snapshots: Vec::new(),
            analyses: Vec::new(),
            workflows: Vec::new(),
            quality: None,
            memory_entry: None,
        }
    }

    fn summary(&self) -> Option<RunSummary<'_>> {
        Some(RunSummary {
            topic: &self.topic,
            plan: self.plan.as_ref()?,
            analyses: &self.analyses,
            workflows: &self.workflows,
        })
    }

    fn into_failure(self, error: ResearchError) -> RunFailure {
        RunFailure {
            run_id: self.run_id,
            topic: self.topic,
            error,
            partial: PartialResults {
                plan: self.plan,
                snapshots: self.snapshots,
                analyses: self.analyses,
                workflows: self.workflows,
            },
        }
    }

    fn freeze(self) -> Result<ResearchReport, RunFailure> {
        let (Some(plan), Some(quality), Some(memory_entry)) =
            (self.plan.clone(), self.quality.clone(), self.memory_entry.clone())
        else {
            return Err(self.into_failure(ResearchError::Planning(
                "run finished without a plan, assessment or memory entry".to_string(),
            )));
        };

        Ok(ResearchReport {
            run_id: self.run_id,
            topic: self.topic,
            plan,
            snapshots: self.snapshots,
            analyses: self.analyses,
            workflows: self.workflows,
            quality,
            memory_entry,
            started_at: self.started_at,
            completed_at: Utc::now(),
        })
    }
}

/// Coordinates planning, data gathering, analysis, workflows, reflection
/// and memory for one topic at a time
pub struct ResearchOrchestrator {
    gateway: Arc<DataSourceGateway>,
    memory: Arc<MemoryStore>,
    planner: Planner,
    specialists: Vec<SpecialistAgent>,
    chain: PromptChainWorkflow,
    router: RoutingWorkflow,
    evaluator: EvaluatorOptimizerWorkflow,
    reflection: ReflectionEngine,
}

impl ResearchOrchestrator {
    /// Wire every component around one reasoner
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        gateway: Arc<DataSourceGateway>,
        memory: Arc<MemoryStore>,
        config: &ResearchConfig,
    ) -> Self {
        Self {
            gateway,
            memory,
            planner: Planner::new(reasoner.clone()),
            specialists: SpecialistAgent::team(reasoner.clone(), config.regulatory_rule_based),
            chain: PromptChainWorkflow::new(reasoner.clone()),
            router: RoutingWorkflow::new(reasoner.clone()),
            evaluator: EvaluatorOptimizerWorkflow::new(reasoner.clone())
                .with_threshold(config.quality_threshold)
                .with_max_iterations(config.max_iterations),
            reflection: ReflectionEngine::new(reasoner),
        }
    }

    /// Build the production stack: OpenAI-compatible reasoner, the four
    /// vendor clients and the configured memory log
    pub async fn from_config(config: &ResearchConfig) -> Result<Self, ResearchError> {
        config.validate()?;

        let mut openai = OpenAIConfig::from_env()
            .map_err(|e| ResearchError::Config(e.to_string()))?
            .with_timeout(config.reasoning_timeout.as_secs().max(1));
        if let Some(base) = &config.openai_api_base {
            openai = openai.with_api_base(base);
        }
        let provider =
            OpenAIProvider::with_config(openai).map_err(|e| ResearchError::Config(e.to_string()))?;
        let reasoner = LlmReasoner::new(Arc::new(provider), &config.model)
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
            .with_timeout(config.reasoning_timeout);

        let gateway = DataSourceGateway::builder()
            .client(Arc::new(YahooFinanceClient::new()))
            .client(Arc::new(AlphaVantageClient::new(
                config.alpha_vantage_api_key.clone().unwrap_or_default(),
                5,
            )))
            .client(Arc::new(FredClient::new(
                config.fred_api_key.clone().unwrap_or_default(),
                None,
            )))
            .client(Arc::new(match &config.sec_user_agent {
                Some(agent) => SecEdgarClient::new(agent.clone()),
                None => SecEdgarClient::from_env(),
            }))
            .policy(config.fetch_policy())
            .cache(SnapshotCache::new(config.cache_ttl))
            .build();

        let memory = match &config.memory_path {
            Some(path) => MemoryStore::open(path).await?,
            None => MemoryStore::in_memory(),
        };

        Ok(Self::new(
            Arc::new(reasoner),
            Arc::new(gateway),
            Arc::new(memory),
            config,
        ))
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Conduct one research run
    pub async fn conduct_research(&self, topic: &str) -> Result<ResearchReport, RunFailure> {
        self.conduct_research_with_cancel(topic, CancellationToken::new())
            .await
    }

    /// Conduct one research run, abandoning in-flight calls when `cancel` fires
    ///
    /// A cancelled run records nothing to memory.
    #[instrument(skip(self, cancel))]
    pub async fn conduct_research_with_cancel(
        &self,
        topic: &str,
        cancel: CancellationToken,
    ) -> Result<ResearchReport, RunFailure> {
        let mut draft = ReportDraft::new(topic);
        info!(run_id = %draft.run_id, "Starting research run");

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ResearchError::Cancelled),
            result = self.run(&mut draft) => result,
        };

        let outcome = match outcome {
            Ok(entry) => self.remember(entry.clone()).await.map(|()| {
                draft.memory_entry = Some(entry);
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                let report = draft.freeze()?;
                info!(
                    run_id = %report.run_id,
                    score = report.overall_quality_score(),
                    "Research run completed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(run_id = %draft.run_id, error = %e, "Research run failed");
                Err(draft.into_failure(e))
            }
        }
    }

    /// Record the entry on a detached task, so the log line and the
    /// in-memory index stay in step even if this future is dropped
    async fn remember(&self, entry: MemoryEntry) -> Result<(), ResearchError> {
        let memory = Arc::clone(&self.memory);
        tokio::spawn(async move { memory.record(entry).await })
            .await
            .map_err(|e| ResearchError::Memory(e.to_string()))??;
        Ok(())
    }

    /// Everything up to the memory entry; cancellable at any await point
    async fn run(&self, draft: &mut ReportDraft) -> Result<MemoryEntry, ResearchError> {
        let topic = draft.topic.clone();
        if topic.is_empty() {
            return Err(ResearchError::Planning("topic is empty".to_string()));
        }

        let history = self.memory.recall(&topic).await;
        info!(prior_runs = history.len(), "Recalled memory");

        let plan = self.planner.plan(&topic, &history).await?;
        draft.plan = Some(plan.clone());

        let symbol = detect_ticker(&topic).unwrap_or_else(|| topic.clone());
        draft.snapshots = self
            .gateway
            .fetch_all(&symbol, &plan.required_sources())
            .await;

        let context = RoleContext::new(topic.clone(), plan.objectives.clone());
        draft.analyses = join_all(
            self.specialists
                .iter()
                .map(|agent| agent.analyze(&draft.snapshots, &context)),
        )
        .await;
        for analysis in draft.analyses.iter().filter(|a| !a.is_valid()) {
            warn!(role = %analysis.agent_role, reason = analysis.invalid_reason(), "Specialist analysis invalid");
        }

        let query = match plan.first_objective() {
            Some(objective) => format!("{topic}: {objective}"),
            None => topic.clone(),
        };
        let (chain, routing) = tokio::join!(
            self.chain.run(&topic, &draft.snapshots),
            self.router.run(&query, &draft.analyses),
        );
        let evaluation_draft = compose_draft(&chain.artifact, &draft.analyses);
        draft.workflows.push(WorkflowResult::Chain(chain));
        draft.workflows.push(WorkflowResult::Routing(routing));

        let evaluation = self.evaluator.run(&topic, evaluation_draft).await?;
        draft.workflows.push(WorkflowResult::EvalOpt(evaluation));

        let summary = draft
            .summary()
            .ok_or_else(|| ResearchError::Planning("plan missing before reflection".to_string()))?;
        let quality = self.reflection.assess(summary, &history).await;

        let insights = quality
            .weaknesses
            .iter()
            .chain(&quality.suggested_improvements)
            .cloned();
        let entry = MemoryEntry::new(draft.run_id, topic, insights, quality.overall_score);

        draft.quality = Some(quality);
        Ok(entry)
    }
}

/// Evaluator input: the chain summary followed by every valid finding
fn compose_draft(chain_artifact: &str, analyses: &[AgentAnalysis]) -> String {
    let mut text = chain_artifact.trim().to_string();
    for analysis in analyses.iter().filter(|a| a.is_valid()) {
        text.push_str(&format!("\n\n{} view:", analysis.agent_role));
        for finding in &analysis.findings {
            text.push_str(&format!("\n- {finding}"));
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use research_core::testing::ScriptedReasoner;
    use research_core::{catalog, DataSourceKind, Payload, ReasoningError, SnapshotStatus};
    use research_data::{DataError, FetchPolicy, VendorClient};
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    struct StaticClient {
        source: DataSourceKind,
        result: Result<Payload, DataError>,
        delay: Duration,
    }

    impl StaticClient {
        fn ok(source: DataSourceKind, payload: Payload) -> Arc<Self> {
            Arc::new(Self {
                source,
                result: Ok(payload),
                delay: Duration::ZERO,
            })
        }

        fn failing(source: DataSourceKind, error: DataError) -> Arc<Self> {
            Arc::new(Self {
                source,
                result: Err(error),
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl VendorClient for StaticClient {
        fn source(&self) -> DataSourceKind {
            self.source
        }

        async fn fetch(&self, _symbol: &str) -> research_data::Result<Payload> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.result.clone()
        }
    }

    fn payload(fields: &[(&str, serde_json::Value)]) -> Payload {
        fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn sec_payload() -> Payload {
        payload(&[
            ("company_name", json!("Apple Inc.")),
            ("cik", json!("320193")),
            ("latest_10k_date", json!("2023-11-03")),
            ("recent_8k_count", json!(1)),
        ])
    }

    fn all_ok_clients() -> Vec<Arc<StaticClient>> {
        vec![
            StaticClient::ok(
                DataSourceKind::YahooFinance,
                payload(&[("current_price", json!(189.5)), ("volume", json!(5_000_000))]),
            ),
            StaticClient::ok(
                DataSourceKind::AlphaVantage,
                payload(&[("pe_ratio", json!(29.5)), ("revenue", json!(3.8e11))]),
            ),
            StaticClient::ok(DataSourceKind::Fred, payload(&[("fed_funds_rate", json!(5.33))])),
            StaticClient::ok(DataSourceKind::SecEdgar, sec_payload()),
        ]
    }

    fn orchestrator(
        reasoner: Arc<ScriptedReasoner>,
        clients: Vec<Arc<StaticClient>>,
        memory: Arc<MemoryStore>,
    ) -> ResearchOrchestrator {
        let mut builder = DataSourceGateway::builder().policy(FetchPolicy::fast());
        for client in clients {
            builder = builder.client(client);
        }
        ResearchOrchestrator::new(
            reasoner,
            Arc::new(builder.build()),
            memory,
            &ResearchConfig::default(),
        )
    }

    #[test]
    fn test_compose_draft_skips_invalid() {
        let analyses = vec![
            AgentAnalysis::new(
                research_core::AgentRole::Market,
                vec!["Uptrend".to_string()],
                vec![],
                0.8,
                Default::default(),
            ),
            AgentAnalysis::invalid(research_core::AgentRole::Fundamentals, "no data", Default::default()),
        ];
        let draft = compose_draft("Summary.", &analyses);
        assert_eq!(draft, "Summary.\n\nMarket view:\n- Uptrend");
    }

    #[tokio::test]
    async fn test_all_sources_ok() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        let memory = Arc::new(MemoryStore::in_memory());
        let orchestrator = orchestrator(reasoner.clone(), all_ok_clients(), memory.clone());

        let report = assert_ok!(orchestrator.conduct_research("AAPL").await);

        assert_eq!(report.snapshots.len(), 4);
        assert!(report.snapshots.iter().all(DataSnapshot::is_ok));
        assert_eq!(report.analyses.len(), 4);
        assert!(report.analyses.iter().all(|a| a.is_grounded_in(&report.snapshots)));
        assert_eq!(report.valid_analyses().count(), 4);
        assert_eq!(report.workflows.len(), 3);
        assert!(report.chain().unwrap().completed);
        assert!(report.routing().is_some());
        assert!(report.evaluation().unwrap().accepted);
        assert!((0.0..=1.0).contains(&report.overall_quality_score()));
        assert!(!report.quality.degraded);

        let recalled = memory.recall("aapl").await;
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].run_id, report.run_id);
        assert_eq!(report.memory_entry, recalled[0]);
        assert_eq!(
            recalled[0].insights,
            vec!["Limited historical depth", "Include peer comparison"]
        );

        // Regulatory runs rule-based by default
        assert_eq!(reasoner.call_count(catalog::AGENT_ANALYSIS), 3);
    }

    #[tokio::test]
    async fn test_failed_vendor_flags_only_its_specialist() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        let mut clients = all_ok_clients();
        clients[1] = StaticClient::failing(
            DataSourceKind::AlphaVantage,
            DataError::Auth("invalid API key".into()),
        );
        let orchestrator = orchestrator(reasoner, clients, Arc::new(MemoryStore::in_memory()));

        let report = orchestrator.conduct_research("AAPL").await.unwrap();

        let fundamentals = report
            .analyses
            .iter()
            .find(|a| a.agent_role == research_core::AgentRole::Fundamentals)
            .unwrap();
        assert!(!fundamentals.is_valid());
        assert_eq!(report.valid_analyses().count(), 3);
        let av = report
            .snapshots
            .iter()
            .find(|s| s.source == DataSourceKind::AlphaVantage)
            .unwrap();
        assert_eq!(av.status, SnapshotStatus::Error);
        assert!(report.quality.overall_score >= 0.0);
    }

    #[tokio::test]
    async fn test_planning_failure_is_fatal() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        reasoner.clear_default(catalog::RESEARCH_PLAN);
        let memory = Arc::new(MemoryStore::in_memory());
        let orchestrator = orchestrator(reasoner.clone(), all_ok_clients(), memory.clone());

        let failure = assert_err!(orchestrator.conduct_research("AAPL").await);

        assert_eq!(failure.kind(), "planning_failure");
        assert!(failure.partial.plan.is_none());
        assert!(failure.partial.snapshots.is_empty());
        assert!(memory.is_empty().await);
        assert_eq!(reasoner.call_count(catalog::RESEARCH_PLAN), 2);
    }

    #[tokio::test]
    async fn test_evaluation_exhausted_keeps_partial_results() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        reasoner.clear_default(catalog::EVALUATION);
        let memory = Arc::new(MemoryStore::in_memory());
        let orchestrator = orchestrator(reasoner, all_ok_clients(), memory.clone());

        let failure = orchestrator.conduct_research("AAPL").await.unwrap_err();

        assert!(matches!(failure.error, ResearchError::EvaluationExhausted { .. }));
        assert!(failure.partial.plan.is_some());
        assert_eq!(failure.partial.snapshots.len(), 4);
        assert_eq!(failure.partial.analyses.len(), 4);
        assert_eq!(failure.partial.workflows.len(), 2);
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_reflection_outage_is_degraded() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        reasoner.clear_default(catalog::QUALITY_ASSESSMENT);
        reasoner.push(
            catalog::QUALITY_ASSESSMENT,
            Err(ReasoningError::CallFailed("down".into())),
        );
        let orchestrator =
            orchestrator(reasoner, all_ok_clients(), Arc::new(MemoryStore::in_memory()));

        let report = orchestrator.conduct_research("AAPL").await.unwrap();

        assert!(report.quality.degraded);
        assert!((0.0..=1.0).contains(&report.overall_quality_score()));
        assert!(report.memory_entry.insights[0].starts_with("Reflection unavailable"));
    }

    #[tokio::test]
    async fn test_memory_feeds_next_run() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        let memory = Arc::new(MemoryStore::in_memory());
        let orchestrator = orchestrator(reasoner.clone(), all_ok_clients(), memory.clone());

        orchestrator.conduct_research("AAPL").await.unwrap();
        orchestrator.conduct_research("aapl").await.unwrap();

        assert_eq!(memory.recall("AAPL").await.len(), 2);
        let plan_prompts: Vec<_> = reasoner
            .calls()
            .into_iter()
            .filter(|c| c.schema == catalog::RESEARCH_PLAN)
            .collect();
        assert!(!plan_prompts[0].prompt.contains("Lessons from previous research"));
        assert!(plan_prompts[1].prompt.contains("Include peer comparison"));
    }

    #[tokio::test]
    async fn test_cancellation_records_nothing() {
        let reasoner = Arc::new(ScriptedReasoner::with_defaults());
        let memory = Arc::new(MemoryStore::in_memory());
        let slow = Arc::new(StaticClient {
            source: DataSourceKind::YahooFinance,
            result: Ok(payload(&[("current_price", json!(1.0))])),
            delay: Duration::from_secs(5),
        });
        let mut builder = DataSourceGateway::builder().policy(FetchPolicy::new(
            1,
            Duration::ZERO,
            Duration::from_secs(10),
        ));
        builder = builder.client(slow);
        let orchestrator = ResearchOrchestrator::new(
            reasoner,
            Arc::new(builder.build()),
            memory.clone(),
            &ResearchConfig::default(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let failure = orchestrator
            .conduct_research_with_cancel("AAPL", cancel)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ResearchError::Cancelled));
        assert!(failure.partial.plan.is_some());
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_log_and_index_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.jsonl");
        let memory = Arc::new(MemoryStore::open(&path).await.unwrap());
        let orchestrator = orchestrator(
            Arc::new(ScriptedReasoner::with_defaults()),
            all_ok_clients(),
            memory.clone(),
        );

        // Sweep the cancellation point across the whole run, memory append included
        let mut completed = Vec::new();
        for yields in 0..200 {
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                for _ in 0..yields {
                    tokio::task::yield_now().await;
                }
                trigger.cancel();
            });

            match orchestrator.conduct_research_with_cancel("AAPL", cancel).await {
                Ok(report) => completed.push(report.run_id),
                Err(failure) => assert!(matches!(failure.error, ResearchError::Cancelled)),
            }
        }

        let in_memory: Vec<_> = memory
            .recall("AAPL")
            .await
            .into_iter()
            .rev()
            .map(|e| e.run_id)
            .collect();
        assert_eq!(in_memory, completed);

        let reopened = MemoryStore::open(&path).await.unwrap();
        let on_disk: Vec<_> = reopened
            .recall("AAPL")
            .await
            .into_iter()
            .rev()
            .map(|e| e.run_id)
            .collect();
        assert_eq!(on_disk, completed);
    }
}
