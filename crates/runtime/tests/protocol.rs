//! Request/response protocol against a live worker.

mod common;

use battle_core::{EngineState, MemberId};
use battle_runtime::{Request, RequestEnvelope, Response, RuntimeError, Topic, Event};

use common::{duel, manual_runtime, use_skill};

#[tokio::test]
async fn responses_carry_the_request_id() {
    let runtime = manual_runtime();
    let handle = runtime.handle();

    for id in [42, 7, 1_000_000] {
        let answer = handle
            .send(RequestEnvelope {
                id,
                request: Request::GetStats,
            })
            .await
            .expect("worker should answer");
        assert_eq!(answer.id, id);
        assert!(matches!(answer.response, Response::Stats(_)));
    }

    let rejected = handle
        .send(RequestEnvelope {
            id: 9,
            request: Request::PauseSimulation,
        })
        .await
        .expect("worker should answer");
    assert_eq!(rejected.id, 9);
    assert!(matches!(rejected.response, Response::Error { .. }));

    drop(handle);
    runtime.shutdown().await.expect("worker should exit");
}

#[tokio::test]
async fn lifecycle_violations_surface_engine_codes() {
    let runtime = manual_runtime();
    let handle = runtime.handle();

    let err = handle.step(1).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Engine { ref code, .. } if code == "ENGINE_NOT_STARTED"));

    handle.start(duel()).await.expect("start should succeed");
    let err = handle.start(duel()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Engine { ref code, .. } if code == "ENGINE_ALREADY_STARTED"));

    let err = handle.resume().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Engine { ref code, .. } if code == "ENGINE_NOT_PAUSED"));

    handle.pause().await.expect("pause should succeed");
    let err = handle.process_intent(use_skill(1, "slash", 3)).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Engine { ref code, .. } if code == "ENGINE_NOT_RUNNING"));

    handle.resume().await.expect("resume should succeed");
    handle.stop().await.expect("stop should succeed");
    let stats = handle.stats().await.expect("stats are always available");
    assert_eq!(stats.state, EngineState::Stopped);

    drop(handle);
    runtime.shutdown().await.expect("worker should exit");
}

#[tokio::test]
async fn stepping_publishes_frames_and_renders() {
    let runtime = manual_runtime();
    let handle = runtime.handle();
    let mut frames = handle.subscribe(Topic::Frame);
    let mut renders = handle.subscribe(Topic::Render);

    handle.start(duel()).await.expect("start should succeed");
    let mut spawned = 0;
    while let Ok(Event::Render(command)) = renders.try_recv() {
        assert_eq!(command.seq, 1);
        spawned += 1;
    }
    assert_eq!(spawned, 3);

    handle.process_intent(use_skill(1, "slash", 3)).await.expect("intent accepted");
    let summary = handle.step(10).await.expect("step should succeed");
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.frame.0, 9);
    assert_eq!(summary.skipped, 0);

    let mut seen = 0;
    while let Ok(event) = frames.try_recv() {
        assert!(matches!(event, Event::Frame(_)));
        seen += 1;
    }
    assert_eq!(seen, 10);

    let members = handle.members().await.expect("members");
    let mob = members.iter().find(|m| m.id == MemberId(3)).expect("mob exists");
    assert!(mob.health.is_some_and(|hp| hp < 900.0));

    drop(handle);
    runtime.shutdown().await.expect("worker should exit");
}
