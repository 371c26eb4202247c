use anyhow::{anyhow, Result};
use pingfan_model::RunReport;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn write_summary(path: &Path, report: &RunReport) -> Result<()> {
    write_json(path, report)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &json)
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|err| anyhow!("failed to create summary directory {:?}: {}", parent, err))?;

    let tmp_path = temp_path(parent, path);
    let mut file = fs::File::create(&tmp_path)
        .map_err(|err| anyhow!("failed to create temp file {:?}: {}", tmp_path, err))?;
    file.write_all(data)
        .map_err(|err| anyhow!("failed to write temp file {:?}: {}", tmp_path, err))?;
    file.sync_all()
        .map_err(|err| anyhow!("failed to sync temp file {:?}: {}", tmp_path, err))?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(anyhow!("failed to replace summary {:?}: {}", path, err));
    }

    // The rename is only durable once the directory entry is on disk.
    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}

fn temp_path(parent: &Path, path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("summary");
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    parent.join(format!(".{}.part-{}-{}", file_name, std::process::id(), stamp))
}
