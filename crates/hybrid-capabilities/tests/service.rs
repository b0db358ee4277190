//! Installs and invocations through the background task runner.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hybrid_capabilities::{
    CapabilityDescriptor, CapabilityError, CapabilityOutput, CapabilityRegistry,
    CapabilityService, Feature, Invocation, InvocationOptions, TaskError, TaskState,
};
use hybrid_packages::InstallOutcome;
use hybrid_test::{RecordingCapability, TestEnv, test_name};

struct Fixture {
    env: TestEnv,
    service: CapabilityService,
}

fn fixture(demo: RecordingCapability) -> Fixture {
    let mut registry = CapabilityRegistry::new();
    registry
        .register(
            CapabilityDescriptor::new(test_name("demo"), Arc::new(demo))
                .with_packages(&["foo==1.0", "bar==2.0"])
                .with_features([Feature::Voice, Feature::Seed]),
        )
        .unwrap();
    registry
        .register(
            CapabilityDescriptor::new(
                test_name("demo2"),
                Arc::new(RecordingCapability::new(test_name("demo2"))),
            )
            .with_packages(&["bar==2.0"]),
        )
        .unwrap();

    let env = TestEnv::new(registry.requirement_table());
    env.orchestrator.reconcile().unwrap();
    let service = CapabilityService::new(
        Arc::new(registry),
        Arc::clone(&env.orchestrator),
        env.runner.clone(),
    );
    Fixture { env, service }
}

#[tokio::test]
async fn test_install_then_invoke() {
    let demo = RecordingCapability::new(test_name("demo"))
        .returning(CapabilityOutput::File(PathBuf::from("/tmp/demo.wav")));
    let fx = fixture(demo.clone());
    let name = test_name("demo");

    assert!(!fx.service.is_installed(&name).unwrap());
    let done = fx.service.install(&name).unwrap().wait().await;
    assert!(matches!(done.result, Ok(InstallOutcome::Installed(_))));
    assert!(fx.service.is_installed(&name).unwrap());
    fx.service.require_installed(&name).unwrap();

    let invocation = Invocation::text("Hello").with_options(InvocationOptions {
        voice: Some("v2/en_speaker_6".to_string()),
        lang: Some("en".to_string()),
        rate: None,
        seed: Some(3),
    });
    let done = fx.service.invoke(&name, invocation).unwrap().wait().await;
    assert_eq!(
        done.result.unwrap(),
        CapabilityOutput::File(PathBuf::from("/tmp/demo.wav"))
    );

    let calls = demo.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].options.voice.as_deref(), Some("v2/en_speaker_6"));
    assert_eq!(calls[0].options.seed, Some(3));
    assert!(calls[0].options.lang.is_none());
}

#[tokio::test]
async fn test_invocation_uses_dedicated_interpreter_once_it_exists() {
    let fx = fixture(RecordingCapability::new(test_name("demo")));
    assert_eq!(
        fx.service.context().unwrap().python(),
        PathBuf::from("/usr/bin/python3")
    );

    fx.service.install(&test_name("demo")).unwrap().wait().await;
    let ctx = fx.service.context().unwrap();
    assert_eq!(ctx.python(), fx.env.venv_dir().join("bin").join("python"));
    assert_eq!(ctx.import_paths().snapshot().len(), 1);
}

#[tokio::test]
async fn test_failing_entrypoint_is_delivered_as_value() {
    let fx = fixture(RecordingCapability::new(test_name("demo")).failing("CUDA out of memory"));
    let handle = fx
        .service
        .invoke(&test_name("demo"), Invocation::text("x"))
        .unwrap();
    let done = handle.wait().await;
    match done.result {
        Err(TaskError::Failed(message)) => assert!(message.contains("CUDA out of memory")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!fx.service.tasks().is_running("demo"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_entrypoint_leaves_foreground_responsive() {
    let demo = RecordingCapability::new(test_name("demo"))
        .with_delay(Duration::from_millis(100))
        .panicking("segfault in native code");
    let fx = fixture(demo);

    let mut handle = fx
        .service
        .invoke(&test_name("demo"), Invocation::text("x"))
        .unwrap();

    let ticks = AtomicUsize::new(0);
    let done = loop {
        if let Some(done) = handle.try_complete() {
            break done;
        }
        ticks.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert!(ticks.load(Ordering::Relaxed) > 1);
    assert_eq!(
        done.result.unwrap_err(),
        TaskError::Panicked("segfault in native code".to_string())
    );
    assert_eq!(handle.state(), TaskState::Failed);
}

#[tokio::test]
async fn test_second_task_for_same_capability_is_rejected() {
    let demo = RecordingCapability::new(test_name("demo")).with_delay(Duration::from_millis(200));
    let fx = fixture(demo);
    let name = test_name("demo");

    let first = fx.service.invoke(&name, Invocation::text("a")).unwrap();
    let second = fx.service.invoke(&name, Invocation::text("b"));
    assert!(matches!(
        second,
        Err(CapabilityError::Task(TaskError::AlreadyRunning(_)))
    ));
    assert!(matches!(
        fx.service.install(&name),
        Err(CapabilityError::Task(TaskError::AlreadyRunning(_)))
    ));

    // Another capability is not blocked.
    let other = fx.service.install(&test_name("demo2")).unwrap();
    assert!(other.wait().await.is_ok());

    assert!(first.wait().await.is_ok());
    let third = fx.service.invoke(&name, Invocation::text("c")).unwrap();
    assert!(third.wait().await.is_ok());
}

#[tokio::test]
async fn test_failed_install_is_delivered_as_value() {
    let fx = fixture(RecordingCapability::new(test_name("demo")));
    fx.env.runner.fail_installs(1, "ERROR: Could not find a version");

    let done = fx.service.install(&test_name("demo")).unwrap().wait().await;
    match done.result {
        Err(TaskError::Failed(message)) => assert!(message.contains("install failed")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(fx.env.log_lines().is_empty());
}

#[tokio::test]
async fn test_uninstall_through_service() {
    let fx = fixture(RecordingCapability::new(test_name("demo")));
    fx.service.install(&test_name("demo")).unwrap().wait().await;
    fx.service.install(&test_name("demo2")).unwrap().wait().await;

    let done = fx.service.uninstall(&test_name("demo")).unwrap().wait().await;
    let outcome = done.result.unwrap();
    assert_eq!(outcome.removed.len(), 1);
    assert_eq!(outcome.retained.len(), 1);
    assert!(!fx.service.is_installed(&test_name("demo")).unwrap());
    assert!(fx.service.is_installed(&test_name("demo2")).unwrap());
}

#[test]
fn test_unknown_and_uninstalled_capabilities() {
    let fx = fixture(RecordingCapability::new(test_name("demo")));

    assert!(matches!(
        fx.service.install(&test_name("nope")),
        Err(CapabilityError::NotFound(_))
    ));
    match fx.service.require_installed(&test_name("demo")).unwrap_err() {
        CapabilityError::NotInstalled { missing, .. } => {
            assert_eq!(missing, ["foo==1.0", "bar==2.0"]);
        },
        other => panic!("unexpected error: {other}"),
    }
}
