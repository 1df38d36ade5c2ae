//! Provisioned engine path: Java runtime resolution and engine supervision.
//!
//! The engine is a jar spawned under the resolved Java runtime. Properties
//! travel over its stdin as a JSON envelope; its stdout is a stream of
//! structured log records re-emitted through the local logging sink.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, trace, warn};

use sonarboot_core::{PropertyMap, ScannerProperty};
use sonarboot_http::proxy::proxy_java_options;
use sonarboot_http::HttpClient;

use crate::error::BootstrapError;

const ENGINE_TOOL_NAME: &str = "Scanner engine";

/// One structured log record on the engine's stdout.
#[derive(Debug, Deserialize)]
struct EngineLogEntry {
    level: String,
    message: String,
    #[serde(default)]
    stacktrace: Option<String>,
}

/// Resolve the Java runtime, in priority order: explicit path property,
/// system `java` when provisioning is skipped, otherwise a provisioned JRE.
pub async fn resolve_java(
    client: &HttpClient,
    properties: &mut PropertyMap,
) -> Result<PathBuf, BootstrapError> {
    if let Some(path) = properties
        .get_prop(ScannerProperty::SonarScannerJavaExePath)
        .filter(|p| !p.is_empty())
    {
        debug!("Using explicitly configured java executable: {path}");
        return Ok(PathBuf::from(path));
    }

    if properties.is_true(ScannerProperty::SonarScannerSkipJreProvisioning) {
        info!("JRE provisioning skipped, looking for java on the PATH");
        return which::which("java").map_err(|source| BootstrapError::ExecutableNotFound {
            executable: "java".to_string(),
            source,
        });
    }

    Ok(sonarboot_cache::fetch_jre(client, properties).await?)
}

/// Run the engine jar under `java` and supervise it to completion.
///
/// When `sonar.scanner.internal.dumpToFile` is set, the would-be invocation
/// is written to that file instead of launching anything.
pub async fn run_engine(
    java: &Path,
    engine_jar: &Path,
    properties: &PropertyMap,
    jvm_options: &[String],
) -> Result<(), BootstrapError> {
    let mut args: Vec<String> = jvm_options.to_vec();
    args.extend(proxy_java_options(properties));
    args.push("-jar".to_string());
    args.push(engine_jar.to_string_lossy().into_owned());

    if let Some(dump_path) = properties
        .get_prop(ScannerProperty::SonarScannerInternalDumpToFile)
        .filter(|p| !p.is_empty())
    {
        info!("Dumping scanner engine invocation to {dump_path}");
        let invocation = serde_json::json!({
            "executable": java.to_string_lossy(),
            "args": args,
            "properties": properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<String, String>>(),
        });
        std::fs::write(dump_path, serde_json::to_vec_pretty(&invocation)?)?;
        return Ok(());
    }

    debug!("Running scanner engine: {} {}", java.display(), args.join(" "));
    let mut child = Command::new(java)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // The envelope goes in first and stdin closes so the engine sees EOF.
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(properties.to_engine_envelope().as_bytes())
            .await?;
        stdin.shutdown().await?;
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let forward_stdout = async {
        if let Some(out) = stdout {
            let mut lines = BufReader::new(out).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                emit_engine_log(&line);
            }
        }
    };
    let forward_stderr = async {
        if let Some(err) = stderr {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                error!("{line}");
            }
        }
    };

    let (status, (), ()) = tokio::join!(child.wait(), forward_stdout, forward_stderr);
    let status = status?;
    match status.code() {
        Some(0) => {
            info!("Scanner engine finished successfully");
            Ok(())
        }
        Some(code) => Err(BootstrapError::Execution {
            tool: ENGINE_TOOL_NAME.to_string(),
            code,
        }),
        None => Err(BootstrapError::Interrupted {
            tool: ENGINE_TOOL_NAME.to_string(),
        }),
    }
}

/// Re-emit one engine stdout line at its own level; lines that are not
/// structured records pass through verbatim.
fn emit_engine_log(line: &str) {
    match serde_json::from_str::<EngineLogEntry>(line) {
        Ok(entry) => {
            let message = match entry.stacktrace {
                Some(trace) => format!("{}\n{trace}", entry.message),
                None => entry.message,
            };
            match entry.level.to_ascii_uppercase().as_str() {
                "TRACE" => trace!("{message}"),
                "DEBUG" => debug!("{message}"),
                "WARN" => warn!("{message}"),
                "ERROR" => error!("{message}"),
                _ => info!("{message}"),
            }
        }
        Err(_) => info!("{line}"),
    }
}
