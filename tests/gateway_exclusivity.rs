//! Exclusivity laws of the engine gateway: one live reservation, one engine
//! instance, defensive workspace clearing, faithful transcripts.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{mock_gateway, MockEngineScript};
use diffexpr::{EngineError, EngineValue};

#[test]
fn concurrent_reserves_admit_exactly_one_winner() {
    let (gateway, _probe) = mock_gateway(MockEngineScript::default());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gateway = Arc::clone(&gateway);
        handles.push(thread::spawn(move || gateway.reserve().is_ok()));
    }
    let wins: usize = handles
        .into_iter()
        .map(|h| usize::from(h.join().expect("reserver thread lives")))
        .sum();

    assert_eq!(wins, 1, "exactly one concurrent reserve may succeed");
    assert!(gateway.is_held());
}

#[test]
fn engine_is_constructed_once_across_reservation_cycles() {
    let (gateway, probe) = mock_gateway(MockEngineScript::default());

    for _ in 0..3 {
        let token = gateway.reserve().expect("slot free");
        let mut lease = gateway.acquire(&token).expect("token matches");
        lease
            .assign("x", EngineValue::Integers(vec![1]))
            .expect("assign succeeds");
        drop(lease);
        gateway.release(token).expect("release succeeds");
    }

    assert_eq!(probe.read(|s| s.constructed), 1, "singleton engine instance");
}

#[test]
fn workspace_is_cleared_on_acquire_and_release() {
    let (gateway, probe) = mock_gateway(MockEngineScript::default());

    let token = gateway.reserve().expect("reserve");
    drop(gateway.acquire(&token).expect("acquire"));
    gateway.release(token).expect("release");

    // One clear when the lease was handed out, one on release.
    assert_eq!(probe.read(|s| s.cleared), 2);
}

#[test]
fn reserve_fails_busy_immediately_while_a_lease_is_live() {
    let (gateway, _probe) = mock_gateway(MockEngineScript::default());
    let token = gateway.reserve().expect("reserve");
    let mut lease = gateway.acquire(&token).expect("acquire");
    lease
        .assign("counts", EngineValue::Integers(vec![1]))
        .expect("assign succeeds");
    assert!(gateway.is_held());

    // A competing run arrives while this lease idles between commands, as
    // it does for the whole sleep of a result poll.
    let contender = Arc::clone(&gateway);
    let attempt = thread::spawn(move || {
        let started = Instant::now();
        (contender.reserve(), started.elapsed())
    });
    let (outcome, waited) = attempt.join().expect("contender thread lives");

    assert!(matches!(outcome, Err(EngineError::Busy)));
    assert!(
        waited < Duration::from_millis(100),
        "reserve must refuse at once, not queue behind the lease ({waited:?})"
    );
    // The refusal left the live lease untouched.
    lease.evaluate("run()").expect("lease still usable");
}

#[test]
fn acquire_with_foreign_token_fails_busy() {
    let (gateway, _probe) = mock_gateway(MockEngineScript::default());
    let (other_gateway, _other_probe) = mock_gateway(MockEngineScript::default());

    let _mine = gateway.reserve().expect("reserve");
    let foreign = other_gateway.reserve().expect("other gateway reserve");

    assert!(matches!(
        gateway.acquire(&foreign),
        Err(EngineError::Busy)
    ));
}

#[test]
fn transcript_survives_failed_commands() {
    let (gateway, _probe) = mock_gateway(MockEngineScript {
        failing_exprs: vec!["explode()".into()],
        ..MockEngineScript::default()
    });

    let token = gateway.reserve().expect("reserve");
    let mut lease = gateway.acquire(&token).expect("acquire");
    lease
        .assign("counts", EngineValue::Integers(vec![0]))
        .expect("assign succeeds");
    let err = lease.evaluate("explode()").expect_err("scripted failure");
    drop(lease);

    assert!(matches!(err, EngineError::Runtime { .. }));
    // The failing command is still on record; the transcript is the only
    // diagnostic the opaque engine leaves behind.
    assert_eq!(
        gateway.transcript(),
        vec!["assign counts".to_string(), "evaluate explode()".to_string()]
    );
}
