use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::SchedulerConfig;
use crate::pool::WorkerPool;
use crate::provider::{ContinuousProvider, Promise, QueueProvider};
use crate::registry::{activity, RunningTaskRegistry};
use crate::scheduler::Scheduler;
use crate::shutdown::{QuitDecision, ShutdownCoordinator};
use crate::task::{Completion, Task};

/// File extensions treated as audio tracks during the library scan.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "wav", "aiff"];

/// How many synthetic tracks to queue when no library path is given.
const SYNTHETIC_TRACKS: usize = 8;

/// Command to run the scheduler against simulated media-library maintenance
/// work: one queued analysis task per audio file, plus a continuous provider
/// standing in for "the currently audible track must be analyzed now".
pub struct SimulateCommand {
    library: Option<PathBuf>,
    config: SchedulerConfig,
    duration: Option<Duration>,
    json: bool,
}

impl SimulateCommand {
    pub fn new(
        library: Option<PathBuf>,
        config: SchedulerConfig,
        duration_secs: Option<u64>,
        json: bool,
    ) -> Self {
        Self {
            library,
            config,
            duration: duration_secs.map(Duration::from_secs),
            json,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let tracks = match &self.library {
            Some(library) => {
                if !library.exists() {
                    return Err(anyhow!("Library directory does not exist: {:?}", library));
                }
                if !library.is_dir() {
                    return Err(anyhow!("Path is not a directory: {:?}", library));
                }

                info!("🔎 Scanning library: {:?}", library);
                collect_audio_files(library)
            }
            None => (0..SYNTHETIC_TRACKS)
                .map(|i| PathBuf::from(format!("synthetic/track-{i:02}.mp3")))
                .collect(),
        };

        let pool = Arc::new(WorkerPool::new(self.config.worker_slots));
        let registry = Arc::new(RunningTaskRegistry::new());
        let queue = Arc::new(QueueProvider::new());

        for track in &tracks {
            queue.enqueue(Arc::new(AnalyzeTrack::new(track.clone())));
        }
        info!("✅ Scan complete. Queued {} analysis tasks.", tracks.len());

        // Stand-in for the currently-playing track: promises exempt work
        // until its one task has been dispatched.
        let now_playing = tracks.first().cloned();
        let dispatched = Arc::new(AtomicBool::new(now_playing.is_none()));
        let probe = dispatched.clone();
        let current_track = ContinuousProvider::new(
            move || {
                if probe.load(Ordering::SeqCst) {
                    None
                } else {
                    Some(Promise::EXEMPT)
                }
            },
            move || {
                if dispatched.swap(true, Ordering::SeqCst) {
                    return None;
                }
                now_playing
                    .clone()
                    .map(|track| Arc::new(AnalyzeTrack::now_playing(track)) as Arc<dyn Task>)
            },
        );

        let mut scheduler = Scheduler::new(pool.clone(), registry.clone());
        scheduler.register_provider(queue.clone());
        scheduler.register_provider(Arc::new(current_track));
        let scheduler = Arc::new(scheduler);

        let coordinator = ShutdownCoordinator::new(registry.clone(), queue.clone());
        let scheduler_loop = tokio::spawn(scheduler.clone().run(self.config.tick_interval()));

        let spinner = if self.json {
            None
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .expect("static spinner template is valid"),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        };

        let started = tokio::time::Instant::now();
        let mut status_interval = tokio::time::interval(Duration::from_millis(250));

        tokio::pin! {
            let shutdown_signal = signal::ctrl_c();
        }

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("🛑 Shutdown signal received.");
                    let decision = coordinator.request_quit(|warning| {
                        // A desktop app would raise its dialog here; the
                        // harness lists the casualties and accepts.
                        warn!(
                            "Quitting would interrupt {} tasks: {}",
                            warning.count(),
                            warning.blocking.join(", ")
                        );
                        true
                    });
                    debug!("Quit decision: {:?}", decision);
                    if decision == QuitDecision::Allowed {
                        break;
                    }
                }

                _ = status_interval.tick() => {
                    let groups = activity(&registry, &queue);
                    if self.json {
                        println!("{}", serde_json::to_string(&groups)?);
                    } else if let Some(bar) = &spinner {
                        bar.set_message(format!(
                            "{} running / {} queued / {} free slots",
                            registry.running_count(),
                            queue.pending_count(),
                            pool.available(),
                        ));
                    }

                    let drained = registry.running_count() == 0 && queue.is_empty();
                    let expired = self
                        .duration
                        .is_some_and(|limit| started.elapsed() >= limit);
                    if drained || expired {
                        break;
                    }
                }
            }
        }

        scheduler_loop.abort();
        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }

        info!(
            "✅ Simulation finished. {} tasks still queued, {} still running.",
            queue.pending_count(),
            registry.running_count()
        );
        Ok(())
    }
}

/// Walk the library for audio files, relative paths sorted for stable order.
fn collect_audio_files(library: &Path) -> Vec<PathBuf> {
    let mut tracks: Vec<PathBuf> = WalkDir::new(library)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_lowercase();
                    AUDIO_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false)
        })
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(library)
                .ok()
                .map(|relative| relative.to_path_buf())
        })
        .collect();

    tracks.sort();
    tracks
}

/// Simulated audio analysis: sleeps in short, cancel-checking increments in
/// place of fingerprinting the file.
struct AnalyzeTrack {
    track: PathBuf,
    now_playing: bool,
    cancelled: Arc<AtomicBool>,
}

impl AnalyzeTrack {
    fn new(track: PathBuf) -> Self {
        Self {
            track,
            now_playing: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn now_playing(track: PathBuf) -> Self {
        Self {
            now_playing: true,
            ..Self::new(track)
        }
    }
}

impl Task for AnalyzeTrack {
    fn title(&self) -> String {
        if self.now_playing {
            "Analyze Current Track".to_string()
        } else {
            "Analyze Track".to_string()
        }
    }

    fn execute(self: Arc<Self>, completion: Completion) {
        tokio::spawn(async move {
            debug!("Analyzing: {:?}", self.track);

            // A few hundred milliseconds of pretend DSP, abandoned early if
            // a cancel comes in between increments.
            for _ in 0..6 {
                if self.cancelled.load(Ordering::SeqCst) {
                    warn!("Analysis canceled: {:?}", self.track);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }

            completion.finish();
        });
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
