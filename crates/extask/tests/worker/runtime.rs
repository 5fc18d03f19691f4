//! Runtime behavior against the in-memory task service.

use std::time::Duration;

use anyhow::Context;
use extask::{
    Args, Category, ErrorMapping, Error, ExternalTask, Failure, HandlerDescriptor,
    InMemoryTaskService, ParameterBinding, PropertyResolver, Reported, ResultPolicy, TaskState,
    WorkerConfig, handler_fn,
};
use serde_json::json;
use test_utils::worker_test;

use crate::support::handlers::{
    CHARGE_TOPIC, ChargeCard, Flaky, SlowEcho, charge_descriptor, echo_descriptor,
    flaky_descriptor,
};
use crate::support::helpers::{TEST_MAX_RETRIES, TestApp, no_variables, test_worker_config};

fn failures_for<'a>(reported: &'a [Reported], task_id: &str) -> Vec<&'a Reported> {
    reported
        .iter()
        .filter(|report| report.task_id() == task_id)
        .filter(|report| matches!(report, Reported::Failure { .. }))
        .collect()
}

worker_test!(charge_completes_with_flattened_receipt, {
    let service = InMemoryTaskService::new();
    let handler = ChargeCard::new();
    let app = TestApp::builder(&service)
        .register(charge_descriptor(handler.clone()))
        .build_and_run()?;

    let id = service
        .push(CHARGE_TOPIC, [("amount", json!("250.5"))])
        .await;
    app.wait_for_state(&id, TaskState::Completed).await?;

    let task = service.task(&id).await.context("task exists")?;
    assert_eq!(task.variable("payment_charged"), Some(&json!(250.5)));
    assert_eq!(task.variable("payment_currency"), Some(&json!("EUR")));
    assert_eq!(handler.calls(), 1);
    assert!(service.incidents().await.is_empty());

    app.shutdown().await
});

worker_test!(declined_charge_is_reported_as_business_error, {
    let service = InMemoryTaskService::new();
    let handler = ChargeCard::new();
    let app = TestApp::builder(&service)
        .register(charge_descriptor(handler.clone()))
        .build_and_run()?;

    let id = service
        .push(CHARGE_TOPIC, [("amount", json!(1500)), ("currency", json!("USD"))])
        .await;
    app.wait_for_state(&id, TaskState::BusinessError).await?;

    let reported = service.reported().await;
    assert_eq!(
        reported,
        vec![Reported::BusinessError {
            task_id: id.clone(),
            code: "PAYMENT_DECLINED".to_string(),
            message: Some("card declined for amount 1500".to_string()),
            variables: Default::default(),
        }]
    );
    // Business errors are never retried
    assert_eq!(handler.calls(), 1);

    app.shutdown().await
});

worker_test!(technical_failures_count_down_to_an_incident, {
    let service = InMemoryTaskService::new();
    let handler = Flaky::new(usize::MAX);
    let app = TestApp::builder(&service)
        .register(flaky_descriptor("sync-ledger", handler.clone()))
        .build_and_run()?;

    let id = service.push("sync-ledger", no_variables()).await;
    app.wait_for_state(&id, TaskState::Incident).await?;

    let reported = service.reported().await;
    let retries: Vec<u32> = failures_for(&reported, &id)
        .into_iter()
        .filter_map(|report| match report {
            Reported::Failure { retries, .. } => Some(*retries),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![TEST_MAX_RETRIES - 1, TEST_MAX_RETRIES - 2, 0]);
    assert_eq!(handler.calls(), TEST_MAX_RETRIES as usize);

    let incidents = service.incidents().await;
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].task_id, id);
    assert_eq!(incidents[0].message, "gateway unavailable");
    assert!(incidents[0].details.contains("GatewayDown"));

    app.shutdown().await
});

worker_test!(flaky_handler_recovers_within_retry_budget, {
    let service = InMemoryTaskService::new();
    let handler = Flaky::new(2);
    let app = TestApp::builder(&service)
        .register(flaky_descriptor("sync-ledger", handler.clone()))
        .build_and_run()?;

    let id = service.push("sync-ledger", no_variables()).await;
    app.wait_for_state(&id, TaskState::Completed).await?;

    let task = service.task(&id).await.context("task exists")?;
    assert_eq!(task.variable("status"), Some(&json!("done")));
    assert_eq!(task.retries(), Some(TEST_MAX_RETRIES - 2));
    assert_eq!(handler.calls(), 3);
    assert!(service.incidents().await.is_empty());

    app.shutdown().await
});

worker_test!(unknown_topic_raises_incident_without_retries, {
    let service = InMemoryTaskService::new();
    let app = TestApp::builder(&service)
        .register(charge_descriptor(ChargeCard::new()))
        .fetch_unknown_topics()
        .build_and_run()?;

    let id = service.push("ship-order", [("order", json!(7))]).await;
    app.wait_for_state(&id, TaskState::Incident).await?;

    let reported = service.reported().await;
    assert_eq!(reported.len(), 1);
    match &reported[0] {
        Reported::Failure {
            message, retries, ..
        } => {
            assert!(message.contains("ship-order"), "message: {message}");
            assert_eq!(*retries, 0);
        }
        other => panic!("expected failure report, got {other:?}"),
    }

    app.shutdown().await
});

worker_test!(missing_required_variable_ignores_catch_all_mapping, {
    let service = InMemoryTaskService::new();
    let descriptor = HandlerDescriptor::builder(
        "score",
        handler_fn(1, |args: Args| async move {
            let points: i64 = args.require(0)?;
            Ok(Some(json!(points * 2)))
        }),
    )
    .bind(ParameterBinding::variable("points").required())
    .map_error(ErrorMapping::new(Category::ROOT, "ANY_FAILURE"))
    .build()?;

    let app = TestApp::builder(&service).register(descriptor).build_and_run()?;

    // A null variable counts as absent
    let id = service.push("score", [("points", json!(null))]).await;
    app.wait_for_state(&id, TaskState::Incident).await?;

    let reported = service.reported().await;
    assert!(
        reported
            .iter()
            .all(|report| matches!(report, Reported::Failure { .. }))
    );
    let incidents = service.incidents().await;
    assert_eq!(incidents[0].message, "required variable 'points' not found");
    assert!(incidents[0].details.starts_with("MissingVariable"));

    app.shutdown().await
});

worker_test!(handler_failures_match_catch_all_mapping, {
    let service = InMemoryTaskService::new();
    let descriptor = HandlerDescriptor::builder(
        "score",
        handler_fn(0, |_: Args| async {
            Err(Failure::new("ScoringFailed", "no score available"))
        }),
    )
    .map_error(ErrorMapping::new(Category::ROOT, "ANY_FAILURE").message("scoring failed"))
    .build()?;

    let app = TestApp::builder(&service).register(descriptor).build_and_run()?;

    let id = service.push("score", no_variables()).await;
    app.wait_for_state(&id, TaskState::BusinessError).await?;

    match &service.reported().await[0] {
        Reported::BusinessError { code, message, .. } => {
            assert_eq!(code, "ANY_FAILURE");
            assert_eq!(message.as_deref(), Some("scoring failed"));
        }
        other => panic!("expected business error, got {other:?}"),
    }

    app.shutdown().await
});

worker_test!(panicking_handler_is_a_technical_failure, {
    let service = InMemoryTaskService::new();
    let descriptor = HandlerDescriptor::builder(
        "explode",
        handler_fn(0, |args: Args| async move {
            if args.is_empty() {
                panic!("boom");
            }
            Ok(None)
        }),
    )
    .build()?;

    let config = WorkerConfig {
        retry_policy: extask::RetryPolicy {
            max_retries: 1,
            ..test_worker_config().retry_policy
        },
        ..test_worker_config()
    };
    let app = TestApp::builder(&service)
        .register(descriptor)
        .config(config)
        .build_and_run()?;

    let id = service.push("explode", no_variables()).await;
    app.wait_for_state(&id, TaskState::Incident).await?;

    let incidents = service.incidents().await;
    assert!(incidents[0].message.contains("boom"));
    assert!(incidents[0].details.starts_with("Panic"));

    // The worker survives the panic and keeps processing
    let next = service.push("explode", no_variables()).await;
    app.wait_for_state(&next, TaskState::Incident).await?;

    app.shutdown().await
});

worker_test!(workers_share_the_load_without_double_processing, {
    let service = InMemoryTaskService::new();
    let handler = SlowEcho::new(Duration::from_millis(20));
    let config = WorkerConfig {
        workers: 4,
        max_tasks: 2,
        ..test_worker_config()
    };
    let app = TestApp::builder(&service)
        .register(echo_descriptor("echo", handler.clone()))
        .config(config)
        .build_and_run()?;

    let mut ids = Vec::new();
    for i in 0..20 {
        ids.push(service.push("echo", [("input", json!(i))]).await);
    }
    app.wait_for_drain().await?;

    for (i, id) in ids.iter().enumerate() {
        assert_eq!(service.state_of(id).await, Some(TaskState::Completed));
        let task = service.task(id).await.context("task exists")?;
        assert_eq!(task.variable("output"), Some(&json!(i)));
    }
    assert_eq!(handler.calls(), 20);
    assert!(handler.max_concurrent() > 1);

    app.shutdown().await
});

worker_test!(shutdown_returns_promptly_when_idle, {
    let service = InMemoryTaskService::new();
    let app = TestApp::builder(&service)
        .register(echo_descriptor("echo", SlowEcho::new(Duration::ZERO)))
        .build_and_run()?;

    tokio::time::timeout(Duration::from_secs(2), app.shutdown())
        .await
        .context("shutdown timed out")??;
    Ok(())
});

worker_test!(names_are_resolved_at_registration, {
    let service = InMemoryTaskService::new();
    let resolver = PropertyResolver::new()
        .property("env", "prod")
        .property("amount.var", "total");

    let descriptor = HandlerDescriptor::builder(
        "charge-#{env}",
        handler_fn(1, |args: Args| async move {
            let total: i64 = args.require(0)?;
            Ok(Some(json!(total + 1)))
        }),
    )
    .bind(ParameterBinding::variable("#{amount.var}").required())
    .result(ResultPolicy::named("#{env}_result"))
    .build()?;

    let app = TestApp::builder(&service)
        .register(descriptor)
        .resolver(resolver)
        .build_and_run()?;

    let id = service.push("charge-prod", [("total", json!(41))]).await;
    app.wait_for_state(&id, TaskState::Completed).await?;

    let task = service.task(&id).await.context("task exists")?;
    assert_eq!(task.variable("prod_result"), Some(&json!(42)));

    app.shutdown().await
});

worker_test!(unresolvable_name_fails_the_build, {
    let service = InMemoryTaskService::new();
    let result = TestApp::builder(&service)
        .register(echo_descriptor("echo-#{missing}", SlowEcho::new(Duration::ZERO)))
        .resolver(PropertyResolver::new())
        .build();

    assert!(matches!(result, Err(Error::InvalidExpression { .. })));
    Ok(())
});

worker_test!(duplicate_topics_fail_the_build, {
    let service = InMemoryTaskService::new();
    let result = TestApp::builder(&service)
        .register(echo_descriptor("echo", SlowEcho::new(Duration::ZERO)))
        .register(echo_descriptor("echo", SlowEcho::new(Duration::ZERO)))
        .build();

    assert!(matches!(result, Err(Error::DuplicateTopic(topic)) if topic == "echo"));
    Ok(())
});

worker_test!(poll_once_processes_higher_priority_first, {
    let service = InMemoryTaskService::new();
    let config = WorkerConfig {
        max_tasks: 1,
        ..test_worker_config()
    };
    let runtime = TestApp::builder(&service)
        .register(echo_descriptor("echo", SlowEcho::new(Duration::ZERO)))
        .config(config)
        .build()?;

    let low = service
        .push_task(ExternalTask::new("low", "echo").with_variable("input", json!("low")))
        .await;
    let high = service
        .push_task(
            ExternalTask::new("high", "echo")
                .with_variable("input", json!("high"))
                .with_priority(10),
        )
        .await;

    assert_eq!(runtime.poll_once().await?, 1);
    assert_eq!(service.state_of(&high).await, Some(TaskState::Completed));
    assert_eq!(service.state_of(&low).await, Some(TaskState::Open));

    assert_eq!(runtime.poll_once().await?, 1);
    assert_eq!(service.state_of(&low).await, Some(TaskState::Completed));
    assert_eq!(runtime.poll_once().await?, 0);
    Ok(())
});

worker_test!(lock_duration_override_is_applied, {
    let service = InMemoryTaskService::new();
    let descriptor = HandlerDescriptor::builder(
        "inspect",
        handler_fn(1, |args: Args| async move {
            let Some(task) = args.task(0) else {
                return Err(Failure::new("IllegalArgument", "expected the task itself"));
            };
            let remaining = task
                .lock_expiration_time()
                .map(|expires| (expires - task.created_at()).whole_seconds());
            Ok(Some(json!(remaining)))
        }),
    )
    .bind(ParameterBinding::task())
    .result(ResultPolicy::named("lock_seconds"))
    .lock_duration(Duration::from_secs(3600))
    .build()?;
    let runtime = TestApp::builder(&service).register(descriptor).build()?;

    let id = service.push("inspect", no_variables()).await;
    assert_eq!(runtime.poll_once().await?, 1);

    let task = service.task(&id).await.context("task exists")?;
    let seconds = task
        .variable("lock_seconds")
        .and_then(|value| value.as_i64())
        .context("lock_seconds published")?;
    assert!((3599..=3601).contains(&seconds), "lock seconds: {seconds}");
    Ok(())
});
