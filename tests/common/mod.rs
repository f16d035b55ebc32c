//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use hashvisor::framework::mock::{
    CapturedOutput, MOCK_BLOCKCHAIN_CLASS, MOCK_FRONTEND_CLASS, MOCK_WORKER_CLASS, MOCK_WORKSOURCE_CLASS,
};
use hashvisor::framework::PluginError;
use hashvisor::lifecycle::{try_setup_tracing, Core, CoreBuilder, CoreConfig};
use hashvisor::registry::{PluginClasses, PluginModule};
use std::path::Path;
use std::time::Duration;

fn mock_exports() -> Result<PluginClasses, PluginError> {
    Ok(PluginClasses::default()
        .frontend(&MOCK_FRONTEND_CLASS)
        .worker(&MOCK_WORKER_CLASS)
        .blockchain(&MOCK_BLOCKCHAIN_CLASS)
        .work_source(&MOCK_WORKSOURCE_CLASS))
}

pub const MOCK_MODULE: PluginModule = PluginModule {
    maintainer: "test",
    name: "mock",
    exports: mock_exports,
};

/// Builder for an instance stored under `dir`, with the mock module and a captured fallback.
pub fn builder(dir: &Path, instance: &str) -> (CoreBuilder, CapturedOutput) {
    try_setup_tracing();
    let out = CapturedOutput::default();
    let config = CoreConfig::new(instance)
        .with_config_dir(dir)
        .with_join_timeout(Duration::from_secs(5));
    let builder = Core::builder(config)
        .without_inventory()
        .module(MOCK_MODULE)
        .fallback(Box::new(out.clone()));
    (builder, out)
}

pub fn core(dir: &Path, instance: &str) -> (Core, CapturedOutput) {
    let (builder, out) = builder(dir, instance);
    (builder.build(), out)
}
