mod common;

use async_trait::async_trait;
use hashvisor::framework::mock::{CallJournal, CapturedOutput, MockPlugin};
use hashvisor::framework::{Frontend, LogSource, Plugin, PluginError, PluginId, PluginKind, Settings};
use hashvisor::lifecycle::{Core, CoreConfig, LifecycleState};
use hashvisor::pipeline::{EventRecord, LogLevel, LogRecord};
use std::sync::Arc;
use std::time::Duration;

/// Log frontend whose sink never completes.
struct StuckSink {
    id: PluginId,
}

#[async_trait]
impl Plugin for StuckSink {
    fn id(&self) -> PluginId {
        self.id
    }

    fn type_tag(&self) -> &'static str {
        "test.stuck"
    }

    fn settings(&self) -> Settings {
        Settings::named("stuck")
    }
}

#[async_trait]
impl Frontend for StuckSink {
    fn can_log(&self) -> bool {
        true
    }

    async fn write_log_message(&self, _record: &LogRecord) -> Result<(), PluginError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Events queued since construction reach an event frontend in submission order.
#[tokio::test]
async fn test_lifecycle_events_are_delivered_in_order() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (core, _) = common::core(dir.path(), "events");
    let watcher = MockPlugin::builder(PluginKind::Frontend, "watcher")
        .handles_events()
        .build(&core.handle(), &CallJournal::default());
    core.add_frontend(watcher.clone()).await;

    core.start().await.expect("Failed to start core");
    core.stop().await;

    assert_eq!(
        watcher.event_names(),
        vec![
            "initializing",
            "reset",
            "loading_config",
            "loading_config_failed",
            "starting",
            "started",
            "stopping",
            "saving_config",
            "saved_config",
        ]
    );
    let first = &watcher.events()[0];
    assert_eq!(first.level, LogLevel::BANNER);
    assert_eq!(first.source.name, "Core");
}

/// The `stopped` event waits in the fresh channel and is delivered on the next start.
#[tokio::test]
async fn test_stopped_event_arrives_with_the_next_start() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (core, _) = common::core(dir.path(), "restart");
    let watcher = MockPlugin::builder(PluginKind::Frontend, "watcher")
        .handles_events()
        .build(&core.handle(), &CallJournal::default());
    core.add_frontend(watcher.clone()).await;

    core.start().await.expect("Failed to start core");
    core.stop().await;
    assert!(!watcher.event_names().iter().any(|e| e == "stopped"));

    core.start().await.expect("Failed to restart core");
    core.stop().await;
    let names = watcher.event_names();
    let stopped = names.iter().position(|e| e == "stopped").expect("stopped never delivered");
    assert_eq!(names[stopped + 1], "starting");
}

/// Plugins may publish their own events through the core handle.
#[tokio::test]
async fn test_plugin_events_carry_their_payload() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (core, _) = common::core(dir.path(), "payload");
    let handle = core.handle();
    let journal = CallJournal::default();
    let watcher = MockPlugin::builder(PluginKind::Frontend, "watcher")
        .handles_events()
        .build(&handle, &journal);
    let worker = MockPlugin::builder(PluginKind::Worker, "w1").build(&handle, &journal);
    core.add_frontend(watcher.clone()).await;

    core.start().await.expect("Failed to start core");
    handle.event(
        EventRecord::new(LogLevel::INFO, worker.source(), "nonce_found")
            .arg(serde_json::json!({ "difficulty": 1.0 }))
            .worker(worker.clone()),
    );
    core.stop().await;

    let found = watcher
        .events()
        .into_iter()
        .find(|e| e.event == "nonce_found")
        .expect("plugin event not delivered");
    assert_eq!(found.source.name, "w1");
    assert_eq!(found.arg, Some(serde_json::json!({ "difficulty": 1.0 })));
    assert_eq!(found.worker.map(|w| w.name()), Some("w1".to_string()));
}

/// A frontend whose log sink fails is flagged once; the others keep receiving lines.
#[tokio::test]
async fn test_broken_log_frontend_is_flagged_and_isolated() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (core, _) = common::core(dir.path(), "broken-sink");
    let handle = core.handle();
    let journal = CallJournal::default();
    let broken = MockPlugin::builder(PluginKind::Frontend, "broken").logs().fail_log().build(&handle, &journal);
    let healthy = MockPlugin::builder(PluginKind::Frontend, "healthy").logs().build(&handle, &journal);
    core.add_frontend(broken.clone()).await;
    core.add_frontend(healthy.clone()).await;

    core.start().await.expect("Failed to start core");
    core.stop().await;

    assert!(handle.log_pipeline().is_broken(broken.id()));
    assert!(!handle.log_pipeline().is_broken(healthy.id()));
    assert!(broken.logs().is_empty());

    let lines = healthy.log_lines();
    assert!(lines.iter().any(|l| l == "Startup completed\n"));
    let complaints: Vec<_> = lines
        .iter()
        .filter(|l| l.starts_with("Exception while logging message"))
        .collect();
    assert_eq!(complaints.len(), 1);
}

/// Frontends see the whole line history, including what was logged before startup.
#[tokio::test]
async fn test_early_lines_reach_frontends_after_startup() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (core, out) = common::core(dir.path(), "history");
    let console = MockPlugin::builder(PluginKind::Frontend, "console")
        .logs()
        .build(&core.handle(), &CallJournal::default());
    core.add_frontend(console.clone()).await;

    core.start().await.expect("Failed to start core");
    core.stop().await;

    let lines = console.log_lines();
    assert_eq!(lines[0], format!("hashvisor v{}\n", hashvisor::lifecycle::VERSION));
    assert!(lines.iter().any(|l| l == "Loading modules...\n"));
    let first = &console.logs()[0];
    assert_eq!(first.level, LogLevel::BANNER);
    assert_eq!(first.fragments[0].format, "B");

    // While the dispatcher is down the fallback stream carries the output.
    let fallback = out.contents();
    assert!(fallback.contains("Core: Loading modules..."));
    assert!(fallback.contains("Core: Shutdown completed"));
    assert!(!fallback.contains("Core: Startup completed"));
}

/// Starting without any log frontend warns on the fallback stream.
#[tokio::test]
async fn test_missing_frontends_are_reported() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (core, out) = common::core(dir.path(), "lonely");
    core.start().await.expect("Failed to start core");
    core.stop().await;

    let text = out.contents();
    assert!(text.contains("[ 10] Core: No working logger frontend module present!"));
    assert!(text.contains("Core: Run detect_frontends after ensuring that all necessary modules are installed."));
}

/// Lines built from fragments are submitted once complete, with the most severe level.
#[tokio::test]
async fn test_fragmented_line_is_delivered_as_one_record() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (core, _) = common::core(dir.path(), "fragments");
    let handle = core.handle();
    let console = MockPlugin::builder(PluginKind::Frontend, "console")
        .logs()
        .build(&handle, &CallJournal::default());
    core.add_frontend(console.clone()).await;
    core.start().await.expect("Failed to start core");

    let mut line = handle.line(LogSource::new(42, "w42"));
    line.append("Found share ", LogLevel::INFO, "")
        .append("(stale)", LogLevel::WARNING, "y")
        .append("\n", LogLevel::INFO, "");
    core.stop().await;

    let record = console
        .logs()
        .into_iter()
        .find(|r| r.source.name == "w42")
        .expect("fragmented line not delivered");
    assert_eq!(record.text(), "Found share (stale)\n");
    assert_eq!(record.level, LogLevel::WARNING);
    assert_eq!(record.fragments.len(), 3);
}

/// A frontend that never returns from its sink cannot hold up shutdown.
#[tokio::test]
async fn test_stop_gives_up_on_a_hung_dispatcher() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let out = CapturedOutput::default();
    let config = CoreConfig::new("hung")
        .with_config_dir(dir.path())
        .with_join_timeout(Duration::from_millis(200));
    let core = Core::builder(config)
        .without_inventory()
        .module(common::MOCK_MODULE)
        .fallback(Box::new(out.clone()))
        .build();
    let sink = Arc::new(StuckSink {
        id: core.handle().allocate_id(),
    });
    core.add_frontend(sink).await;

    core.start().await.expect("Failed to start core");
    tokio::time::timeout(Duration::from_secs(10), core.stop())
        .await
        .expect("Failed to stop within the join timeout");

    assert_eq!(core.state(), LifecycleState::Uninitialized);
    assert!(out.contents().contains("Core: Shutdown completed"));
}
