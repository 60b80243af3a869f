//! Model hub downloads: a single GGUF file from HuggingFace or ModelScope.
//!
//! Files land in `<cache_dir>/<hub>/<org>/<repo>/<file>`. A download is written
//! to `<file>.part` and renamed when complete; an existing `.part` is resumed
//! with an HTTP Range request.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{ResponderError, Result};
use crate::{sys_debug, sys_info, sys_warn};

const USER_AGENT: &str = "llama-cpp-responder/0.1";

/// Interval between progress log lines
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Which model hub the downloader talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubBackend {
    #[serde(alias = "hf")]
    HuggingFace,
    #[serde(alias = "ms")]
    ModelScope,
}

impl fmt::Display for HubBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubBackend::HuggingFace => write!(f, "huggingface"),
            HubBackend::ModelScope => write!(f, "modelscope"),
        }
    }
}

impl FromStr for HubBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(HubBackend::HuggingFace),
            "modelscope" | "ms" => Ok(HubBackend::ModelScope),
            // Boolean "use ModelScope" switch
            "true" | "1" => Ok(HubBackend::ModelScope),
            "false" | "0" => Ok(HubBackend::HuggingFace),
            other => Err(format!("unknown model hub '{other}'")),
        }
    }
}

impl HubBackend {
    /// Direct download URL for one file of a repo.
    pub fn file_url(&self, repo_id: &str, filename: &str) -> String {
        let filename = filename
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        match self {
            HubBackend::HuggingFace => {
                format!("https://huggingface.co/{repo_id}/resolve/main/{filename}")
            }
            HubBackend::ModelScope => {
                format!("https://modelscope.cn/models/{repo_id}/resolve/master/{filename}")
            }
        }
    }

    /// URL that lists the files of a repo.
    pub fn listing_url(&self, repo_id: &str) -> String {
        match self {
            HubBackend::HuggingFace => {
                format!("https://huggingface.co/api/models/{repo_id}/tree/main")
            }
            HubBackend::ModelScope => format!(
                "https://modelscope.cn/api/v1/models/{repo_id}/repo/files?Revision=master&Recursive=true"
            ),
        }
    }

    /// Extract file paths from a listing response body.
    pub fn parse_listing(&self, body: &str) -> Result<Vec<String>> {
        let bad = |e: serde_json::Error| {
            ResponderError::Download(format!("failed to parse {self} file listing: {e}"))
        };
        match self {
            HubBackend::HuggingFace => {
                let entries: Vec<HfTreeEntry> = serde_json::from_str(body).map_err(bad)?;
                Ok(entries
                    .into_iter()
                    .filter(|e| e.entry_type == "file")
                    .map(|e| e.path)
                    .collect())
            }
            HubBackend::ModelScope => {
                let listing: MsListing = serde_json::from_str(body).map_err(bad)?;
                Ok(listing
                    .data
                    .files
                    .into_iter()
                    .filter(|f| f.file_type == "blob")
                    .map(|f| f.path)
                    .collect())
            }
        }
    }
}

#[derive(Deserialize)]
struct HfTreeEntry {
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
struct MsListing {
    #[serde(rename = "Data")]
    data: MsListingData,
}

#[derive(Deserialize)]
struct MsListingData {
    #[serde(rename = "Files", default)]
    files: Vec<MsFile>,
}

#[derive(Deserialize)]
struct MsFile {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Type", default)]
    file_type: String,
}

/// Pick the GGUF to download from a repo listing.
///
/// Split shards (`-00001-of-00003.gguf`) can't be loaded from a single path,
/// so a whole file wins over a shard.
pub fn pick_gguf(files: &[String]) -> Option<String> {
    let ggufs: Vec<&String> = files
        .iter()
        .filter(|f| f.to_lowercase().ends_with(".gguf"))
        .collect();

    ggufs
        .iter()
        .find(|f| !f.contains("-of-"))
        .or_else(|| ggufs.first())
        .map(|f| f.to_string())
}

/// Local path a repo file is cached at.
pub fn cache_path(cache_dir: &Path, hub: HubBackend, repo_id: &str, filename: &str) -> PathBuf {
    let mut path = cache_dir.join(hub.to_string());
    for segment in repo_id.split('/').filter(|s| !s.is_empty() && *s != "..") {
        path.push(segment);
    }
    // Strip any path components from the file name
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("model.gguf");
    path.join(name)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Make sure the model file is in the local cache and return its path.
///
/// Blocking; run it on the blocking pool.
pub fn snapshot_download(
    hub: HubBackend,
    repo_id: &str,
    filename: Option<&str>,
    cache_dir: &Path,
) -> Result<PathBuf> {
    let filename = match filename {
        Some(name) => name.to_string(),
        None => {
            let files = list_repo_files(hub, repo_id)?;
            pick_gguf(&files).ok_or_else(|| {
                ResponderError::Download(format!("no .gguf file found in {hub} repo {repo_id}"))
            })?
        }
    };

    let dest = cache_path(cache_dir, hub, repo_id, &filename);
    if dest.is_file() {
        sys_info!("[HUB] Using cached model {}", dest.display());
        return Ok(dest);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let url = hub.file_url(repo_id, &filename);
    sys_info!("[HUB] Downloading {} from {}", filename, url);
    download_file(&url, &dest)?;
    Ok(dest)
}

fn list_repo_files(hub: HubBackend, repo_id: &str) -> Result<Vec<String>> {
    let url = hub.listing_url(repo_id);
    sys_debug!("[HUB] Listing files: {}", url);
    let body = ureq::get(&url)
        .set("User-Agent", USER_AGENT)
        .call()
        .map_err(|e| ResponderError::Download(format!("{hub} API error: {e}")))?
        .into_string()
        .map_err(|e| ResponderError::Download(format!("failed to read {hub} listing: {e}")))?;
    hub.parse_listing(&body)
}

/// Stream `url` into `dest`, resuming from `dest.part` when present.
fn download_file(url: &str, dest: &Path) -> Result<()> {
    let part_file = part_path(dest);
    let resume_offset = fs::metadata(&part_file).map(|m| m.len()).unwrap_or(0);

    let mut request = ureq::get(url).set("User-Agent", USER_AGENT);
    if resume_offset > 0 {
        sys_info!("[HUB] Resuming download at {} bytes", resume_offset);
        request = request.set("Range", &format!("bytes={resume_offset}-"));
    }

    let resp = match request.call() {
        Ok(resp) => resp,
        Err(ureq::Error::Status(416, resp)) if resume_offset > 0 => {
            let remote_size = resp.header("content-range").and_then(content_range_total);
            return finish_unsatisfiable_resume(url, dest, &part_file, resume_offset, remote_size);
        }
        Err(e) => return Err(ResponderError::Download(format!("{url}: {e}"))),
    };

    // Server returned 200 instead of 206: Range ignored, start over
    let is_range_response = resp.status() == 206;
    let offset = if is_range_response { resume_offset } else { 0 };

    let content_length: u64 = resp
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let total = content_length + offset;

    let mut file = open_part_file(&part_file, offset > 0)?;

    let mut reader = resp.into_reader();
    let mut buf = vec![0u8; 64 * 1024];
    let mut downloaded = offset;
    let start = Instant::now();
    let mut last_progress = Instant::now();

    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| ResponderError::Download(format!("read error after {downloaded} bytes: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        downloaded += n as u64;

        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            log_progress(downloaded, total, downloaded - offset, start.elapsed());
            last_progress = Instant::now();
        }
    }

    file.flush()?;
    drop(file); // Close file handle before rename

    if total > 0 && downloaded < total {
        sys_warn!(
            "[HUB] Download ended early ({} of {} bytes), keeping {}",
            downloaded,
            total,
            part_file.display()
        );
        return Err(ResponderError::Download(format!(
            "connection closed after {downloaded} of {total} bytes"
        )));
    }

    fs::rename(&part_file, dest)?;
    sys_info!("[HUB] Download complete: {} ({} bytes)", dest.display(), downloaded);
    Ok(())
}

/// A 416 to a resume request: the `.part` file is already whole, unless the
/// server says the file is a different size, in which case start over.
fn finish_unsatisfiable_resume(
    url: &str,
    dest: &Path,
    part_file: &Path,
    resume_offset: u64,
    remote_size: Option<u64>,
) -> Result<()> {
    match remote_size {
        Some(size) if size != resume_offset => {
            sys_warn!(
                "[HUB] Partial file is {} bytes but the remote file is {}, restarting",
                resume_offset,
                size
            );
            fs::remove_file(part_file)?;
            download_file(url, dest)
        }
        _ => {
            fs::rename(part_file, dest)?;
            sys_info!(
                "[HUB] Download already complete: {} ({} bytes)",
                dest.display(),
                resume_offset
            );
            Ok(())
        }
    }
}

/// Total size from a `Content-Range` value such as `bytes */1234` or `bytes 0-9/1234`.
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn open_part_file(part_file: &Path, append: bool) -> Result<File> {
    let file = if append {
        OpenOptions::new().append(true).open(part_file)?
    } else {
        File::create(part_file)?
    };
    Ok(file)
}

fn log_progress(downloaded: u64, total: u64, session_bytes: u64, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let speed_mbps = if secs > 0.0 {
        session_bytes as f64 / (1024.0 * 1024.0) / secs
    } else {
        0.0
    };
    if total > 0 {
        sys_info!(
            "[HUB] {:.1}% ({} / {} MB, {:.1} MB/s)",
            downloaded as f64 * 100.0 / total as f64,
            downloaded / (1024 * 1024),
            total / (1024 * 1024),
            speed_mbps
        );
    } else {
        sys_info!("[HUB] {} MB ({:.1} MB/s)", downloaded / (1024 * 1024), speed_mbps);
    }
}
