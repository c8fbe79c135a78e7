//! Equal inputs must produce equal worlds.

mod common;

use battle_core::{EngineConfig, GameEngine};
use battle_runtime::snapshot_digest;

use common::{duel, manual_runtime, use_skill};

async fn run_session() -> String {
    let runtime = manual_runtime();
    let handle = runtime.handle();
    handle.start(duel()).await.expect("start should succeed");

    handle.process_intent(use_skill(1, "slash", 3)).await.expect("intent accepted");
    handle.step(3).await.expect("step");
    handle.process_intent(use_skill(2, "slash", 3)).await.expect("intent accepted");
    handle.step(20).await.expect("step");

    let snapshot = handle.snapshot().await.expect("snapshot");
    drop(handle);
    runtime.shutdown().await.expect("worker should exit");
    snapshot_digest(&snapshot).expect("digest")
}

#[tokio::test]
async fn two_runtime_sessions_share_a_digest() {
    let first = run_session().await;
    let second = run_session().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn worker_matches_an_inline_engine() {
    let mut engine = GameEngine::new(EngineConfig::default());
    engine.start(&duel()).expect("start");
    engine.process_intent(use_skill(1, "slash", 3)).expect("intent");
    for _ in 0..3 {
        engine.step().expect("step");
    }
    engine.process_intent(use_skill(2, "slash", 3)).expect("intent");
    for _ in 0..20 {
        engine.step().expect("step");
    }
    let inline = snapshot_digest(&engine.snapshot()).expect("digest");
    assert_eq!(inline, run_session().await);
}
