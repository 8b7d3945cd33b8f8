//! Patch rollout example
//!
//! Walks a small fleet through a patch rollout with nested scopes, a failing
//! step, and remote shipping to a stand-in shipper that prints batches.
//!
//! Run with: cargo run --example patch_rollout

use fleet_log::prelude::*;
use fleet_log::{info, warning};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Prints each batch instead of calling a log service
struct StdoutShipper;

impl LogShipper for StdoutShipper {
    fn ship(&self, log_group: &str, events: &[RemoteEvent]) -> fleet_log::Result<()> {
        println!("   -> shipping {} events to {}", events.len(), log_group);
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

fn patch_instance(logger: &Logger, instance: &str, attempt: u32) -> io::Result<()> {
    logger.run_within_scope(
        "PatchInstance",
        ScopeOptions::new().with_field("instanceId", instance),
        |scope| {
            scope.add_context("attempt", attempt);
            if instance.ends_with('3') {
                warning!(logger, "Instance {} did not report back", instance);
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("SSM command timed out on {}", instance),
                ));
            }
            info!(logger, "Patched {}", instance);
            Ok(())
        },
    )
    .map_err(|e| match e.into_body() {
        Some(body) => body,
        None => io::Error::new(io::ErrorKind::Other, "scope did not start"),
    })
}

fn main() -> Result<()> {
    println!("=== fleet_log - Patch Rollout Example ===\n");

    let mut config = LoggerConfig::from_json_str(
        r#"{
            "minimumLevel": "Debug",
            "outputFormat": "Console",
            "remoteLoggingEnabled": true,
            "remoteBufferThreshold": 5,
            "remoteLogGroupName": "/fleet-ops/patching"
        }"#,
    )?
    .apply_env_overrides()?;
    config.module_name = "PatchRollout".to_string();

    let logger = LoggerBuilder::from_config(&config)?
        .shipper(Arc::new(StdoutShipper))
        .build();

    let prefix = CorrelationPrefix::new("rollout")?;
    let rollout = logger.start_scope(
        "Rollout",
        ScopeOptions::new()
            .with_prefix(prefix)
            .with_field("patchBaseline", "pb-2024-06"),
    )?;

    let instances = ["i-0a1", "i-0a2", "i-0a3", "i-0a4"];
    let mut failed = Vec::new();
    for instance in instances {
        if let Err(e) = patch_instance(&logger, instance, 1) {
            failed.push(instance);
            logger.write(
                format!("Patch failed on {}", instance),
                WriteOptions::new()
                    .with_level(LogLevel::Warning)
                    .with_error(&e)
                    .with_field("instanceId", instance),
            );
        }
    }

    rollout.add_context("failedCount", failed.len());
    logger.info(format!(
        "Rollout finished: {} patched, {} failed",
        instances.len() - failed.len(),
        failed.len()
    ));
    rollout.dispose();

    if let Some(report) = logger.flush_remote(true) {
        println!("\nFinal flush shipped {} events", report.shipped);
    }
    if !logger.shutdown(Duration::from_secs(5)) {
        eprintln!("Warning: Logger shutdown timed out");
    }

    let metrics = logger.metrics();
    println!("\nEntries logged: {}", metrics.total_logged());
    println!("Sink errors: {}", metrics.sink_errors());
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
