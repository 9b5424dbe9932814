//! End-to-end math benchmark runs against scripted LLM replies.

use std::sync::Arc;

use easy_exp_core::{RunConfig, RunController};
use easy_exp_llm::fakes::ScriptedChatClient;
use easy_exp_math::metric::fields;
use easy_exp_math::{JsonDataset, MathProblem, MathStep, ProblemMetric, ProblemModel};
use easy_exp_tracking::fakes::MemoryTracker;
use easy_exp_tracking::{RunRef, Tracker};

const PROBLEMS: &str = r#"[
    {"problem": "1+1?", "solution": "so \\boxed{2}", "path": "algebra/1.json"},
    {"problem": "2*3?", "solution": "so \\boxed{6}", "path": "algebra/2.json"},
    {"problem": "9-4?", "solution": "so \\boxed{5}", "path": "algebra/3.json"}
]"#;

fn dataset(take: usize) -> JsonDataset<MathProblem> {
    let mut items: Vec<MathProblem> = serde_json::from_str(PROBLEMS).unwrap();
    items.truncate(take);
    JsonDataset::from_items(items).with_key_field("path")
}

/// Queue one solver reply and one judge verdict per problem.
fn script(client: &ScriptedChatClient, answers: &[(&str, bool, f64)]) {
    for (answer, verdict, cost) in answers {
        client.push_reply(&format!("thinking... \\boxed{{{answer}}}"), 20, 10, *cost);
        client.push_reply(if *verdict { "True" } else { "False" }, 5, 1, 0.0);
    }
}

async fn run_math(
    tracker: &MemoryTracker,
    cfg: RunConfig,
    data: &JsonDataset<MathProblem>,
    client: ScriptedChatClient,
) -> (RunRef, ProblemMetric) {
    let shared: Arc<dyn Tracker> = Arc::new(tracker.clone());
    let mut runner = RunController::open(cfg, Some(shared)).await.unwrap();
    let run = runner.tracked_run().cloned().unwrap();

    let client = Arc::new(client);
    let model = ProblemModel::new(client.clone());
    let mut metric = ProblemMetric::new(client);
    let report = runner.run(data, &MathStep, &model, &mut metric).await.unwrap();
    assert!(report.completed());
    runner.close().await.unwrap();
    (run, metric)
}

#[tokio::test]
async fn logs_are_filed_by_verdict_and_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = MemoryTracker::new();
    let client = ScriptedChatClient::new();
    script(&client, &[("2", true, 0.01), ("7", false, 0.02), ("5", true, 0.03)]);

    let data = dataset(3);
    let cfg = RunConfig::new("math", "qwen")
        .with_workdir(dir.path())
        .with_dataset_digest(data.digest().unwrap());
    let (run, metric) = run_math(&tracker, cfg, &data, client.clone()).await;

    assert_eq!(metric.count(), 3);
    assert_eq!(metric.correct_count(), 2);
    assert_eq!(client.remaining(), 0);

    let local = dir.path().join("exp_log/false/algebra/2.json");
    let transcript = std::fs::read_to_string(&local).unwrap();
    assert!(transcript.contains("------------------------Agent Answer------------------------\n7"));
    assert!(dir.path().join("exp_log/true/algebra/1.json").exists());
    assert!(!dir.path().join("temp.log").exists());

    assert!(tracker.file_contents(&run, "exp_log/true/algebra/3.json").is_some());
    let rows = tracker.rows(&run);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1]["_item_key"], "algebra/2.json");
    assert_eq!(rows[2][fields::CORRECT_NUM], 2);
}

#[tokio::test]
async fn resumed_run_ends_with_the_same_aggregates() {
    let answers = [("2", true, 0.01), ("7", false, 0.02), ("5", true, 0.03)];

    // Uninterrupted reference run.
    let full_dir = tempfile::tempdir().unwrap();
    let tracker = MemoryTracker::new();
    let client = ScriptedChatClient::new();
    script(&client, &answers);
    let cfg = RunConfig::new("math", "full").with_workdir(full_dir.path());
    let (full_run, full) = run_math(&tracker, cfg, &dataset(3), client).await;

    // A run that only got through the first two problems.
    let first_dir = tempfile::tempdir().unwrap();
    let client = ScriptedChatClient::new();
    script(&client, &answers[..2]);
    let cfg = RunConfig::new("math", "partial").with_workdir(first_dir.path());
    let (partial_run, _) = run_math(&tracker, cfg, &dataset(2), client).await;

    // Resume it over the whole dataset: only the third problem hits the LLM.
    let resume_dir = tempfile::tempdir().unwrap();
    let client = ScriptedChatClient::new();
    script(&client, &answers[2..]);
    let cfg = RunConfig::new("math", "partial")
        .with_workdir(resume_dir.path())
        .with_restore_from(partial_run.run_id.as_str());
    let (resumed_run, resumed) = run_math(&tracker, cfg, &dataset(3), client.clone()).await;

    assert_eq!(client.calls().len(), 2);
    assert_eq!(resumed.count(), full.count());
    assert_eq!(resumed.correct_count(), full.correct_count());
    assert_eq!(resumed.accuracy(), full.accuracy());
    assert_eq!(resumed.average_cost(), full.average_cost());

    let verdicts = |run: &RunRef| -> Vec<_> {
        tracker
            .rows(run)
            .iter()
            .map(|r| {
                (
                    r[fields::IS_CORRECT].clone(),
                    r[fields::COST].clone(),
                    r["_item_key"].clone(),
                )
            })
            .collect()
    };
    assert_eq!(verdicts(&resumed_run), verdicts(&full_run));

    // Restored logs come back under the resumed workdir.
    assert!(resume_dir.path().join("exp_log/false/algebra/2.json").exists());
}
