mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use common::{drain, generation_events, Reply, ScriptedInference};
use wa_review::error::AppError;
use wa_review::models::section::{join_sections, DocumentSection, UNORDERED_SECTION};
use wa_review::orchestrator::chunked_generation::{
    ChunkedGenerationController, GenerationRequest, GenerationSettings, RoundContext,
    SectionAccumulator,
};
use wa_review::services::cancellation::{CancelToken, CancellationController, RunKind};
use wa_review::services::progress::ChannelReporter;

fn settings() -> GenerationSettings {
    GenerationSettings {
        max_no_op_rounds: 3,
        round_delay: Duration::ZERO,
    }
}

fn request() -> GenerationRequest<impl Fn(&RoundContext<'_>) -> String + Send + Sync> {
    GenerationRequest {
        system_prompt: "system".to_string(),
        image: None,
        status: "Generating template".to_string(),
        prompt: |ctx: &RoundContext<'_>| {
            format!(
                "round={} previous={}\n{}",
                ctx.iteration, ctx.previous_units, ctx.previous_content
            )
        },
    }
}

#[tokio::test]
async fn test_completion_on_round_three_stops_calling() {
    let inference = Arc::new(ScriptedInference::new(vec![
        Reply::text("# Section 2 - Compute\nec2"),
        Reply::text("# Section 1 - Networking\nvpc"),
        Reply::text("# Section 3 - Storage\ns3\n<end_of_generation>"),
        Reply::text("# Section 4 - Never\nnever"),
    ]));
    let (reporter, mut rx) = ChannelReporter::new();
    let controller = ChunkedGenerationController::new(inference.clone(), Arc::new(reporter), settings());

    let mut acc = SectionAccumulator::new();
    let outcome = assert_ok!(controller.run(&request(), &mut acc, &CancelToken::never()).await);

    assert_eq!(inference.calls(), 3);
    assert_eq!(inference.remaining(), 1);
    assert!(!outcome.cancelled);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.content, "# Networking\nvpc\n\n# Compute\nec2\n\n# Storage\ns3");

    // 每轮提示词都带上已累积的内容
    let prompts = inference.prompts();
    assert!(prompts[0].0.starts_with("round=0 previous=0"));
    assert!(prompts[2].0.starts_with("round=2 previous=2"));
    assert!(prompts[2].0.contains("Networking"));

    // 进度单调，完成前封顶 90，完成时 100
    let progress: Vec<u8> = generation_events(&drain(&mut rx)).iter().map(|(_, p)| *p).collect();
    assert_eq!(progress, vec![0, 10, 20, 100]);
}

#[tokio::test]
async fn test_cancel_during_round_two_keeps_round_one_only() {
    let release = Arc::new(Notify::new());
    let (inference, mut started) = ScriptedInference::new(vec![
        Reply::text("# Section 1 - Networking\nvpc\n# Section 2 - Compute\nec2"),
        Reply::Blocked {
            text: "# Section 3 - Storage\ns3<end_of_generation>".to_string(),
            release: release.clone(),
        },
    ])
    .with_start_signal();
    let inference = Arc::new(inference);

    let cancellation = CancellationController::new();
    let token = cancellation.begin_run(RunKind::Generation);
    let (reporter, _rx) = ChannelReporter::new();
    let controller = ChunkedGenerationController::new(inference.clone(), Arc::new(reporter), settings());

    let mut acc = SectionAccumulator::new();
    let request = request();
    let driver = async {
        assert_eq!(started.recv().await, Some(1));
        assert_eq!(started.recv().await, Some(2));
        cancellation.signal_cancel(RunKind::Generation);
    };
    let (outcome, _) = tokio::join!(controller.run(&request, &mut acc, &token), driver);
    let outcome = assert_ok!(outcome);

    // 第二轮的结果在取消之后才到达，必须丢弃
    release.notify_one();
    tokio::task::yield_now().await;

    assert!(outcome.cancelled);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.content, "# Networking\nvpc\n\n# Compute\nec2");
    assert_eq!(acc.sections().len(), 2);
    assert_eq!(inference.calls(), 2);
}

#[tokio::test]
async fn test_cancel_before_first_round_issues_no_call() {
    let inference = Arc::new(ScriptedInference::new(vec![Reply::text("x<end_of_generation>")]));
    let cancellation = CancellationController::new();
    let token = cancellation.begin_run(RunKind::Generation);
    cancellation.signal_cancel(RunKind::Generation);

    let (reporter, _rx) = ChannelReporter::new();
    let controller = ChunkedGenerationController::new(inference.clone(), Arc::new(reporter), settings());

    let mut acc = SectionAccumulator::new();
    let outcome = assert_ok!(controller.run(&request(), &mut acc, &token).await);
    assert!(outcome.cancelled);
    assert_eq!(outcome.content, "");
    assert_eq!(inference.calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_round_delay() {
    let (inference, mut started) =
        ScriptedInference::new(vec![Reply::text("# Section 1 - Networking\nvpc")]).with_start_signal();
    let inference = Arc::new(inference);

    let cancellation = CancellationController::new();
    let token = cancellation.begin_run(RunKind::Generation);
    let (reporter, _rx) = ChannelReporter::new();
    let controller = ChunkedGenerationController::new(
        inference.clone(),
        Arc::new(reporter),
        GenerationSettings {
            max_no_op_rounds: 3,
            round_delay: Duration::from_secs(60),
        },
    );

    let mut acc = SectionAccumulator::new();
    let request = request();
    let driver = async {
        assert_eq!(started.recv().await, Some(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancellation.signal_cancel(RunKind::Generation);
    };

    let run = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(controller.run(&request, &mut acc, &token), driver).0
    });
    let outcome = assert_ok!(assert_ok!(run.await));
    assert!(outcome.cancelled);
    assert_eq!(outcome.content, "# Networking\nvpc");
    assert_eq!(inference.calls(), 1);
}

#[tokio::test]
async fn test_review_cancellation_does_not_stop_generation() {
    let inference = Arc::new(ScriptedInference::new(vec![Reply::text(
        "# Section 1 - Networking\nvpc<end_of_iac_document_generation>",
    )]));
    let cancellation = CancellationController::new();
    let token = cancellation.begin_run(RunKind::Generation);
    cancellation.signal_cancel(RunKind::Review);

    let (reporter, _rx) = ChannelReporter::new();
    let controller = ChunkedGenerationController::new(inference, Arc::new(reporter), settings());
    let mut acc = SectionAccumulator::new();
    let outcome = assert_ok!(controller.run(&request(), &mut acc, &token).await);
    assert!(!outcome.cancelled);
    assert_eq!(outcome.content, "# Networking\nvpc");
}

#[tokio::test]
async fn test_no_op_rounds_fail_as_stuck() {
    let inference = Arc::new(ScriptedInference::new(vec![
        Reply::text("# Section 1 - Networking\nvpc"),
        Reply::text("I am thinking about it."),
        Reply::text(""),
        Reply::text("still nothing"),
        Reply::text("# Section 9 - Never\nnever"),
    ]));
    let (reporter, _rx) = ChannelReporter::new();
    let controller = ChunkedGenerationController::new(inference.clone(), Arc::new(reporter), settings());

    let mut acc = SectionAccumulator::new();
    let err = assert_err!(controller.run(&request(), &mut acc, &CancelToken::never()).await);
    assert!(matches!(
        err,
        AppError::StuckGeneration {
            no_op_rounds: 3,
            rounds: 4
        }
    ));
    assert_eq!(inference.calls(), 4);
}

#[tokio::test]
async fn test_inference_failure_propagates() {
    let inference = Arc::new(ScriptedInference::new(vec![Reply::Fail("throttled")]));
    let (reporter, _rx) = ChannelReporter::new();
    let controller = ChunkedGenerationController::new(inference, Arc::new(reporter), settings());

    let mut acc = SectionAccumulator::new();
    let err = assert_err!(controller.run(&request(), &mut acc, &CancelToken::never()).await);
    assert!(matches!(err, AppError::InferenceFailure { .. }));
}

#[tokio::test]
async fn test_unparseable_order_sorts_last() {
    let inference = Arc::new(ScriptedInference::new(vec![
        Reply::text("# Section X - Broken\nb\n# Section 2 - Second\ns"),
        Reply::text("# Section 1 - First\nf\n<end_of_generation>"),
    ]));
    let (reporter, _rx) = ChannelReporter::new();
    let controller = ChunkedGenerationController::new(inference, Arc::new(reporter), settings());

    let mut acc = SectionAccumulator::new();
    let outcome = assert_ok!(controller.run(&request(), &mut acc, &CancelToken::never()).await);

    let expected = join_sections(&[
        DocumentSection::new(1, "First", "f"),
        DocumentSection::new(2, "Second", "s"),
        DocumentSection::new(UNORDERED_SECTION, "Broken", "b"),
    ]);
    assert_eq!(outcome.content, expected);
    assert_eq!(acc.sections()[0].order, UNORDERED_SECTION);
}
