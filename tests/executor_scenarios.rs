//! End-to-end graph executions against a scripted language model.

mod common;

use std::sync::Arc;

use common::{parse_scorer, scripted_executor, seed, single_texts};
use thoughtgraph::adapters::offline_language_model::OfflineLanguageModel;
use thoughtgraph::adapters::overlap_scorer::{OverlapScorer, ReferenceText};
use thoughtgraph::adapters::scripted_language_model::{ScriptedLanguageModel, ScriptedResponse};
use thoughtgraph::domain::models::{NodeId, OperationKind, Pricing};
use thoughtgraph::{
    Budget, ExecutionStatus, ExecutorSettings, GraphExecutor, Method, Operation, OperationGraph,
    PromptContext, RunArtifact, ScorerSet, StageThresholds,
};

#[tokio::test]
async fn test_generate_score_keep_returns_best() {
    let (executor, lm) = scripted_executor(
        ScriptedLanguageModel::new().with_script(vec![ScriptedResponse::Texts(vec![
            "0.1".to_string(),
            "0.4".to_string(),
            "0.3".to_string(),
        ])]),
        10.0,
    );
    let mut graph = OperationGraph::new();
    graph.append(Operation::generate(1, 3).unwrap());
    graph.append(Operation::score(3, false, parse_scorer()).unwrap());
    graph.append(Operation::keep_best_n(1, true).unwrap());

    let report = executor.execute(&graph, seed(), PromptContext::default()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(lm.invocations(), 1);
    let best = report.final_states();
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].current, "0.4");
    assert_eq!(best[0].score, Some(0.4));
}

#[tokio::test]
async fn test_gated_generation_stops_at_first_passing_draw() {
    let (executor, lm) = scripted_executor(
        ScriptedLanguageModel::new().with_script(single_texts(&["0.2", "0.4", "0.9"])),
        10.0,
    );
    let mut graph = OperationGraph::new();
    graph.append(Operation::d_generate_score(1, 3, parse_scorer(), 0.35).unwrap());

    let report = executor.execute(&graph, seed(), PromptContext::default()).await;

    assert_eq!(lm.invocations(), 2);
    let states = report.final_states();
    assert_eq!(states.len(), 2);
    assert_eq!(states[1].score, Some(0.4));
    assert_eq!(report.metrics.gate_exits, 1);
}

#[tokio::test]
async fn test_budget_stops_third_invocation() {
    let (executor, lm) = scripted_executor(ScriptedLanguageModel::new().with_cost_per_call(0.03), 0.05);
    let mut graph = OperationGraph::new();
    for _ in 0..3 {
        graph.append(Operation::generate(1, 1).unwrap());
    }

    let report = executor.execute(&graph, seed(), PromptContext::default()).await;

    assert_eq!(lm.invocations(), 2);
    assert!((executor.budget().remaining() - (-0.01)).abs() < 1e-9);
    assert!(matches!(
        report.status,
        ExecutionStatus::Partial { halted_at: NodeId(2), .. }
    ));
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.metrics.partial_executions, 1);
}

#[tokio::test]
async fn test_shared_budget_blocks_later_executions() {
    let (executor, lm) = scripted_executor(ScriptedLanguageModel::new().with_cost_per_call(1.0), 0.5);
    let mut graph = OperationGraph::new();
    graph.append(Operation::generate(1, 1).unwrap());

    let first = executor.execute(&graph, seed(), PromptContext::default()).await;
    let second = executor.clone().execute(&graph, seed(), PromptContext::default()).await;

    assert_eq!(first.status, ExecutionStatus::Completed);
    assert!(second.is_partial());
    assert!(second.records.is_empty());
    assert_eq!(lm.invocations(), 1);
}

#[tokio::test]
async fn test_score_record_survives_artifact_round_trip() {
    let (executor, _) = scripted_executor(
        ScriptedLanguageModel::new().with_script(vec![ScriptedResponse::Texts(vec![
            "0.3".to_string(),
            "0.7".to_string(),
        ])]),
        10.0,
    );
    let mut graph = OperationGraph::new();
    graph.append(Operation::generate(1, 2).unwrap());
    graph.append(Operation::score(2, false, parse_scorer()).unwrap());

    let report = executor.execute(&graph, seed(), PromptContext::default()).await;
    let json = serde_json::to_string(&report.to_artifact()).unwrap();
    let reloaded: RunArtifact = serde_json::from_str(&json).unwrap();

    let entering = report.records[0].thoughts.len();
    let score_record = reloaded.score_records().next().unwrap();
    assert_eq!(score_record.scores.as_ref().map(Vec::len), Some(entering));
    assert_eq!(reloaded, report.to_artifact());

    let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
    let entries = raw.as_array().unwrap();
    assert!(entries.last().unwrap().get("prompt_tokens").is_some());
    assert_eq!(entries[entries.len() - 2]["operation"], "score");
}

#[tokio::test]
async fn test_every_method_completes_with_offline_model() {
    let lm = Arc::new(OfflineLanguageModel::new("offline", Pricing::default()));
    let executor = GraphExecutor::new(lm, Budget::new(100.0), ExecutorSettings::default());
    let scorers = ScorerSet {
        intermediate: Arc::new(OverlapScorer::new(ReferenceText::Introduction)),
        evaluation: Arc::new(OverlapScorer::new(ReferenceText::Abstract)),
    };
    let gates = StageThresholds {
        generate: 0.3,
        aggregate: 0.5,
        refine: 0.3,
    };

    for method in Method::ALL {
        let graph = method.build(&scorers, &gates).unwrap();
        let report = executor
            .execute(&graph, seed(), PromptContext { prompt_token_limit: Some(256) })
            .await;

        assert_eq!(report.status, ExecutionStatus::Completed, "{method}");
        let artifact = report.to_artifact();
        assert_eq!(artifact.records.last().unwrap().operation, OperationKind::Score, "{method}");
        assert_eq!(artifact.final_thoughts().len(), 1, "{method}");
        assert!(artifact.final_thoughts()[0].is_scored(), "{method}");
        assert!(report.usage.cost > 0.0, "{method}");
    }
}

#[tokio::test]
async fn test_adaptive_merge_runs_at_most_once_per_group() {
    // First round: 0.1 misses the 0.15 gate, 0.2 passes. The pair sits
    // between the low and high aggregation gates, so it is merged once.
    // The refinement gate is out of reach, so all three draws happen.
    let lm = ScriptedLanguageModel::new().with_script(
        single_texts(&["0.1", "0.2", "0.25", "0.3", "0.2", "0.1"]),
    );
    let (executor, lm) = scripted_executor(lm, 10.0);
    let scorers = ScorerSet {
        intermediate: parse_scorer(),
        evaluation: parse_scorer(),
    };
    let gates = StageThresholds {
        generate: 0.15,
        aggregate: 0.99,
        refine: 0.99,
    };

    let graph = Method::Dgot.build(&scorers, &gates).unwrap();
    let report = executor.execute(&graph, seed(), PromptContext::default()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(lm.aggregate_calls(), 1);
    assert_eq!(lm.invocations(), 6);
    assert_eq!(report.metrics.gate_exits, 1);
    assert_eq!(report.metrics.skipped_aggregations, 0);
    assert_eq!(report.final_states()[0].score, Some(0.3));
}
