//! Mount guard against the scripted tool runner.

mod helpers;

use std::fs;
use std::sync::Arc;

use helpers::{FakeTools, TestEnv};
use tiny11::config::Timings;
use tiny11::image::ImageMountGuard;
use tiny11::log::BuildLog;
use tiny11::process::ToolRunner;

fn guard(env: &TestEnv, tools: &Arc<FakeTools>) -> ImageMountGuard {
    let runner: Arc<dyn ToolRunner> = tools.clone();
    ImageMountGuard::new(runner, &env.config.scratch_dir, Timings::immediate(), BuildLog::new("mount-test"))
}

#[test]
fn test_is_mounted_follows_the_live_mount() {
    let env = TestEnv::new();
    let tools = FakeTools::new();
    let wim = env.source.join("sources").join("install.wim");
    let mut g = guard(&env, &tools);

    assert!(!g.is_mounted());
    g.mount(&wim, 1, true).unwrap();
    assert!(g.is_mounted());
    g.unmount(false).unwrap();
    assert!(!g.is_mounted());
}

#[test]
fn test_clean_discards_a_mount_left_by_another_run() {
    let env = TestEnv::new();
    let tools = FakeTools::new();
    let wim = env.source.join("sources").join("install.wim");

    // Simulate a crashed build: mounted with hives loaded, guard never dropped.
    let mut crashed = guard(&env, &tools);
    crashed.mount(&wim, 1, false).unwrap();
    crashed.registry().load().unwrap();
    std::mem::forget(crashed);
    assert!(tools.is_mounted());

    let mut cleaner = guard(&env, &tools);
    assert!(cleaner.force_release());
    assert!(!tools.is_mounted());
    assert!(tools.loaded_hives().is_empty());
}

#[test]
fn test_stale_files_without_a_mount_are_not_discarded() {
    let env = TestEnv::new();
    let tools = FakeTools::new();
    fs::create_dir_all(env.config.scratch_dir.join("Windows").join("System32")).unwrap();

    let mut g = guard(&env, &tools);
    assert!(!g.is_mounted());
    assert!(!g.force_release());
    assert!(!tools.calls().iter().any(|c| c.contains("/Unmount-Image")));
}
