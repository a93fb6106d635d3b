use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskloom::{
    Bus, Config, Event, EventKind, HookContext, LifecycleError, LifecyclePhase, RuntimeError,
    ServiceContext, ServiceFn, ServiceHost, ServiceRef, ServiceRegistry, ServiceSettings,
    ServiceStatus, ServiceTask, Subscribe, TaskError,
};

fn until_cancelled() -> ServiceRef {
    ServiceFn::arc(|ctx: ServiceContext| async move {
        ctx.cancelled().await;
        Ok::<_, TaskError>(())
    })
}

async fn wait_for(task: &ServiceTask, status: ServiceStatus) {
    while task.status() != status {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

fn spawn_start(
    task: &Arc<ServiceTask>,
    token: &CancellationToken,
) -> tokio::task::JoinHandle<Result<(), LifecycleError>> {
    let t = Arc::clone(task);
    let tok = token.clone();
    tokio::spawn(async move { t.start(tok).await })
}

struct Recorder(Mutex<Vec<EventKind>>);

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.0.lock().unwrap().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn second_start_is_rejected_and_status_kept() {
    let task = Arc::new(ServiceTask::new("feed", until_cancelled(), Bus::new(16)));
    let token = CancellationToken::new();
    let running = spawn_start(&task, &token);
    wait_for(&task, ServiceStatus::Running).await;

    assert_eq!(
        task.start(CancellationToken::new()).await,
        Err(LifecycleError::AlreadyRunning {
            name: "feed".to_string()
        })
    );
    assert_eq!(task.status(), ServiceStatus::Running);

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert_eq!(
        task.start(cancelled).await,
        Err(LifecycleError::AlreadyRunning {
            name: "feed".to_string()
        })
    );
    assert_eq!(task.status(), ServiceStatus::Running);

    token.cancel();
    assert_eq!(running.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn stop_out_of_turn_is_reported() {
    let task = Arc::new(ServiceTask::new("feed", until_cancelled(), Bus::new(16)));

    let err = task.stop().unwrap_err();
    assert_eq!(err.to_string(), "cannot stop service `feed` while not_started");
    assert_eq!(err.as_label(), "lifecycle_invalid_state");

    let token = CancellationToken::new();
    let running = spawn_start(&task, &token);
    wait_for(&task, ServiceStatus::Running).await;
    task.stop().unwrap();
    assert!(matches!(
        task.stop(),
        Err(LifecycleError::AlreadyStopping { .. }) | Err(LifecycleError::InvalidState { .. })
    ));
    running.await.unwrap().unwrap();
    assert_eq!(task.status(), ServiceStatus::Stopped);
}

#[tokio::test]
async fn hooks_run_in_phase_and_registration_order() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let hook = |tag: &'static str, log: &Arc<Mutex<Vec<String>>>| {
        let log = Arc::clone(log);
        move |ctx: HookContext| {
            let log = Arc::clone(&log);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                log.lock()
                    .unwrap()
                    .push(format!("{tag}:{}:{}", ctx.phase.as_label(), ctx.status));
            }
        }
    };

    let task = Arc::new(
        ServiceTask::new("feed", until_cancelled(), Bus::new(16))
            .with_hook(LifecyclePhase::Stopped, hook("a", &log))
            .with_hook(LifecyclePhase::BeforeStart, hook("a", &log))
            .with_hook(LifecyclePhase::BeforeStart, hook("b", &log))
            .with_hook(LifecyclePhase::Started, hook("a", &log))
            .with_hook(LifecyclePhase::BeforeStop, hook("a", &log)),
    );

    let token = CancellationToken::new();
    let running = spawn_start(&task, &token);
    while log.lock().unwrap().len() < 3 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    token.cancel();
    running.await.unwrap().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "a:before_start:starting",
            "b:before_start:starting",
            "a:started:running",
            "a:before_stop:stopping",
            "a:stopped:stopped",
        ]
    );
}

#[tokio::test]
async fn host_stops_everything_within_grace() {
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let host = ServiceHost::new(Config::default(), vec![recorder.clone() as Arc<dyn Subscribe>]);

    let tasks: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| Arc::new(ServiceTask::new(name, until_cancelled(), host.bus().clone())))
        .collect();

    let res = host
        .run_until(tasks.clone(), tokio::time::sleep(Duration::from_millis(100)))
        .await;
    assert!(res.is_ok());
    assert!(tasks.iter().all(|t| t.status() == ServiceStatus::Stopped));

    let kinds = recorder.0.lock().unwrap().clone();
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert!(kinds.contains(&EventKind::AllStoppedWithin));
    assert_eq!(
        kinds.iter().filter(|k| **k == EventKind::ServiceStopped).count(),
        2
    );
}

#[tokio::test]
async fn host_reports_services_stuck_past_grace() {
    let cfg = Config {
        grace: Duration::from_millis(100),
        ..Config::default()
    };
    let host = ServiceHost::new(cfg, Vec::new());

    let quick = Arc::new(ServiceTask::new("quick", until_cancelled(), host.bus().clone()));
    let slow = Arc::new(
        ServiceTask::new("slow", until_cancelled(), host.bus().clone()).with_hook(
            LifecyclePhase::BeforeStop,
            |_ctx: HookContext| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
            },
        ),
    );

    let res = host
        .run_until(vec![quick, slow], tokio::time::sleep(Duration::from_millis(50)))
        .await;
    match res {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(100));
            assert_eq!(stuck, vec!["slow".to_string()]);
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn host_returns_when_services_finish_on_their_own() {
    let host = ServiceHost::new(Config::default(), Vec::new());
    let once: ServiceRef = ServiceFn::arc(|_ctx: ServiceContext| async { Ok::<_, TaskError>(()) });
    let task = Arc::new(ServiceTask::new("once", once, host.bus().clone()));

    let res = host
        .run_until(vec![Arc::clone(&task)], std::future::pending::<()>())
        .await;
    assert!(res.is_ok());
    assert_eq!(task.status(), ServiceStatus::Stopped);
}

#[tokio::test]
async fn registry_builds_tasks_the_host_can_run() {
    let host = ServiceHost::new(Config::default(), Vec::new());
    let mut registry = ServiceRegistry::new(host.bus().clone()).with_grace(Duration::from_secs(1));
    registry.register("idle", |_s: &ServiceSettings| Ok(until_cancelled()));

    let settings: Vec<ServiceSettings> = serde_json::from_str(
        r#"[
            { "name": "one", "classIdentifier": "idle" },
            { "name": "two", "classIdentifier": "idle", "idleTimeMs": 10 }
        ]"#,
    )
    .unwrap();
    let tasks: Vec<_> = registry
        .build_all(&settings)
        .unwrap()
        .into_iter()
        .map(Arc::new)
        .collect();
    assert_eq!(tasks.len(), 2);

    let res = host
        .run_until(tasks.clone(), tokio::time::sleep(Duration::from_millis(50)))
        .await;
    assert!(res.is_ok());
    assert!(tasks.iter().all(|t| t.status() == ServiceStatus::Stopped));
}
