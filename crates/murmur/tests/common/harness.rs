//! Test harness for isolated end-to-end job execution.
//!
//! Provides a complete hermetic environment: temp directories, a
//! file-backed ledger, an executor, and stub shell scripts standing in
//! for every external tool (downloader, probe, media tool, speech engine,
//! translator).

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use murmur::broadcast::JobEventBroadcaster;
use murmur::config::MurmurConfig;
use murmur::db::Database;
use murmur::executor::JobExecutor;
use murmur::job::{Job, JobStatus};
use murmur::ledger::JobLedger;

/// Speech engine stub: two segments over a 10 second clip, plus the SRT
/// file the real engine writes next to its input.
pub const DEFAULT_ENGINE: &str = r#"input="$1"
echo '[00:00:00.000 --> 00:00:05.000] hello'
echo '[00:00:05.000 --> 00:00:10.000] world'
srt="${input%.*}.srt"
printf '1\n00:00:00,000 --> 00:00:05,000\nhello\n\n2\n00:00:05,000 --> 00:00:08,000\nworld\n\n' > "$srt"
"#;

/// Speech engine stub that runs long enough to be cancelled.
pub const SLOW_ENGINE: &str = r#"i=0
while [ $i -lt 100 ]; do
  echo "[00:00:0$((i % 9)).000 --> 00:00:0$((i % 9 + 1)).000] tick"
  i=$((i+1))
  sleep 0.1
done
"#;

pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Arc<MurmurConfig>,
    pub ledger: Arc<JobLedger>,
    pub executor: Arc<JobExecutor>,
    pub download_dir: PathBuf,
    pub media_dir: PathBuf,
}

impl TestHarness {
    /// Harness with the default (fast, successful) speech engine.
    pub fn new() -> Self {
        Self::with_engine(DEFAULT_ENGINE)
    }

    /// Harness with a custom speech engine script body.
    pub fn with_engine(engine_body: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let download_dir = base.join("downloads");
        let media_dir = base.join("media");
        std::fs::create_dir_all(&download_dir).expect("Failed to create download dir");
        std::fs::create_dir_all(&media_dir).expect("Failed to create media dir");

        // Stub tools. The probe reports a fixed 10 second duration; the
        // media tool emits one progress line and writes its output file;
        // the downloader produces two media files; the translator
        // upper-cases its input.
        let ffprobe = write_script(base, "ffprobe", "echo 10.0");
        let engine = write_script(base, "engine", engine_body);
        let ffmpeg = write_script(
            base,
            "ffmpeg",
            r#"for last; do :; done
echo 'out_time_ms=5000000'
echo 'progress=end'
printf 'fake video' > "$last"
"#,
        );
        let downloader = write_script(
            base,
            "downloader",
            &format!(
                r#"dir='{dir}'
mkdir -p "$dir"
printf 'fake video' > "$dir/First Talk [abcdefghijk].mp4"
printf 'fake video' > "$dir/Second Talk [lmnopqrstuv].mp4"
echo '[download]  50.0% of ~100MiB at 5MiB/s'
echo "[download] Destination: $dir/First Talk [abcdefghijk].mp4"
echo '[download] 100% of ~100MiB'
echo "[Merger] Merging formats into \"$dir/Second Talk [lmnopqrstuv].mp4\""
"#,
                dir = download_dir.display()
            ),
        );
        let translator = write_script(base, "translator", "tr '[:lower:]' '[:upper:]'");

        let mut config = MurmurConfig::default();
        config.directories.download_dir = download_dir.clone();
        config.directories.upload_dir = base.join("uploads");
        config.directories.data_dir = base.join("data");
        config.directories.job_log_dir = base.join("logs").join("jobs");
        config.tools.ffprobe = ffprobe;
        config.tools.ffmpeg = ffmpeg;
        config.tools.speech_engine = engine;
        config.tools.downloader = downloader;
        config.tools.translator = translator;
        let config = Arc::new(config);

        let db = Database::open(&config.directories.database_path()).expect("Failed to open db");
        let ledger = Arc::new(JobLedger::new(db, JobEventBroadcaster::default()));
        let executor = Arc::new(JobExecutor::new(Arc::clone(&ledger), Arc::clone(&config)));

        Self {
            temp_dir,
            config,
            ledger,
            executor,
            download_dir,
            media_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a fake media file into the media directory.
    pub fn write_media(&self, filename: &str) -> PathBuf {
        let path = self.media_dir.join(filename);
        std::fs::write(&path, b"fake media content").expect("Failed to write media file");
        path
    }

    /// Writes a subtitle file into the media directory.
    pub fn write_srt(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.media_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write srt file");
        path
    }

    /// Reopens the ledger database from disk, as a fresh process would.
    pub fn reopen_ledger(&self) -> JobLedger {
        let db = Database::open(&self.config.directories.database_path())
            .expect("Failed to reopen db");
        JobLedger::new(db, JobEventBroadcaster::default())
    }

    /// Polls the ledger until the job reaches a terminal status.
    pub fn wait_terminal(&self, job_id: &str) -> Job {
        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            let job = self
                .ledger
                .get(job_id)
                .expect("ledger read failed")
                .expect("job missing from ledger");
            if job.status.is_terminal() {
                return job;
            }
            assert!(
                Instant::now() < deadline,
                "job {} never became terminal (last status {})",
                job_id,
                job.status
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Polls the ledger until the job reaches the given status.
    pub fn wait_status(&self, job_id: &str, status: JobStatus) {
        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            let job = self
                .ledger
                .get(job_id)
                .expect("ledger read failed")
                .expect("job missing from ledger");
            if job.status == status {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "job {} never reached {} (last status {})",
                job_id,
                status,
                job.status
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Polls the ledger until `count` jobs of the given predicate exist.
    pub fn wait_for_jobs<F>(&self, count: usize, predicate: F) -> Vec<Job>
    where
        F: Fn(&Job) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            let matching: Vec<Job> = self
                .ledger
                .list(&[])
                .expect("ledger list failed")
                .into_iter()
                .filter(|j| predicate(j))
                .collect();
            if matching.len() >= count {
                return matching;
            }
            assert!(
                Instant::now() < deadline,
                "expected {} matching jobs, found {}",
                count,
                matching.len()
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}
