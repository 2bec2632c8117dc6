//! Load generator for a running hand sign server.
//!
//! Spawns a number of virtual users. Each one loops until the run ends,
//! waiting a random interval between requests and picking the upload form
//! or a prediction upload (twice as often).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tokio::task::JoinSet;

#[derive(Parser, Debug)]
#[command(name = "loadgen")]
#[command(about = "Exercise / and /prediction of a running hand sign server")]
struct Args {
    /// Base URL of the server
    #[arg(long, default_value = "http://127.0.0.1:9000")]
    host: String,

    /// Image uploaded by the prediction task
    #[arg(long, default_value = "test_images/0/Sign 0 (21).jpeg")]
    image: PathBuf,

    /// Number of concurrent virtual users
    #[arg(short, long, default_value = "10")]
    users: usize,

    /// Length of the run in seconds
    #[arg(short, long, default_value = "60")]
    duration: u64,

    /// Minimum wait between tasks in milliseconds
    #[arg(long, default_value = "1000")]
    min_wait_ms: u64,

    /// Maximum wait between tasks in milliseconds
    #[arg(long, default_value = "3000")]
    max_wait_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    LoadMain,
    PredictImageFile,
}

impl Task {
    const ALL: [Task; 2] = [Task::LoadMain, Task::PredictImageFile];

    fn weight(self) -> u32 {
        match self {
            Task::LoadMain => 1,
            Task::PredictImageFile => 2,
        }
    }

    fn pick(rng: &mut impl Rng) -> Task {
        let total: u32 = Task::ALL.iter().map(|t| t.weight()).sum();
        let mut roll = rng.gen_range(0..total);
        for task in Task::ALL {
            if roll < task.weight() {
                return task;
            }
            roll -= task.weight();
        }
        Task::PredictImageFile
    }

    fn name(self) -> &'static str {
        match self {
            Task::LoadMain => "GET /",
            Task::PredictImageFile => "POST /prediction",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TaskStats {
    requests: u64,
    failures: u64,
    total_latency: Duration,
}

impl TaskStats {
    fn record(&mut self, latency: Duration, ok: bool) {
        self.requests += 1;
        self.total_latency += latency;
        if !ok {
            self.failures += 1;
        }
    }

    fn merge(&mut self, other: &TaskStats) {
        self.requests += other.requests;
        self.failures += other.failures;
        self.total_latency += other.total_latency;
    }

    fn mean_latency_ms(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.total_latency.as_secs_f64() * 1000.0 / self.requests as f64
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct UserStats {
    main: TaskStats,
    predict: TaskStats,
}

impl UserStats {
    fn for_task(&mut self, task: Task) -> &mut TaskStats {
        match task {
            Task::LoadMain => &mut self.main,
            Task::PredictImageFile => &mut self.predict,
        }
    }
}

async fn run_task(
    client: &reqwest::Client,
    host: &str,
    image: &[u8],
    task: Task,
) -> anyhow::Result<StatusCode> {
    let response = match task {
        Task::LoadMain => client.get(format!("{}/", host)).send().await?,
        Task::PredictImageFile => {
            let part = Part::bytes(image.to_vec())
                .file_name("test_image.jpeg")
                .mime_str("image/jpeg")?;
            client
                .post(format!("{}/prediction", host))
                .multipart(Form::new().part("file", part))
                .send()
                .await?
        }
    };
    Ok(response.status())
}

async fn virtual_user(
    id: usize,
    client: reqwest::Client,
    host: String,
    image: std::sync::Arc<Vec<u8>>,
    deadline: Instant,
    wait: (u64, u64),
) -> UserStats {
    let mut rng = StdRng::from_entropy();
    let mut stats = UserStats::default();

    while Instant::now() < deadline {
        let task = Task::pick(&mut rng);
        let started = Instant::now();
        let ok = match run_task(&client, &host, &image, task).await {
            Ok(status) if status == StatusCode::OK => true,
            Ok(status) => {
                tracing::warn!("user {}: {} got status code {}", id, task.name(), status);
                false
            }
            Err(e) => {
                tracing::warn!("user {}: {} failed: {}", id, task.name(), e);
                false
            }
        };
        stats.for_task(task).record(started.elapsed(), ok);

        let pause = Duration::from_millis(rng.gen_range(wait.0..=wait.1));
        tokio::time::sleep(pause).await;
    }

    stats
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if args.min_wait_ms > args.max_wait_ms {
        bail!("--min-wait-ms must not exceed --max-wait-ms");
    }
    if !args.image.exists() {
        bail!("Test image not found at {:?}. Please check the test_images folder.", args.image);
    }
    let image = std::fs::read(&args.image)
        .with_context(|| format!("reading {:?}", args.image))?;
    let image = std::sync::Arc::new(image);

    let client = reqwest::Client::new();
    let host = args.host.trim_end_matches('/').to_string();
    let deadline = Instant::now() + Duration::from_secs(args.duration);

    tracing::info!(
        "Starting {} users against {} for {}s",
        args.users,
        host,
        args.duration
    );

    let mut users = JoinSet::new();
    for id in 0..args.users {
        users.spawn(virtual_user(
            id,
            client.clone(),
            host.clone(),
            image.clone(),
            deadline,
            (args.min_wait_ms, args.max_wait_ms),
        ));
    }

    let mut totals = UserStats::default();
    while let Some(result) = users.join_next().await {
        let stats = result.context("virtual user panicked")?;
        totals.main.merge(&stats.main);
        totals.predict.merge(&stats.predict);
    }

    for task in Task::ALL {
        let stats = totals.for_task(task);
        println!(
            "{:<18} requests={:<6} failures={:<6} mean={:.1}ms",
            task.name(),
            stats.requests,
            stats.failures,
            stats.mean_latency_ms()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_task_is_picked_twice_as_often() {
        let mut rng = StdRng::seed_from_u64(7);
        let picks = 30_000;
        let predicts = (0..picks)
            .filter(|_| Task::pick(&mut rng) == Task::PredictImageFile)
            .count();
        let ratio = predicts as f64 / picks as f64;
        assert!((ratio - 2.0 / 3.0).abs() < 0.02, "ratio was {}", ratio);
    }

    #[test]
    fn test_stats_merge_and_mean() {
        let mut a = TaskStats::default();
        a.record(Duration::from_millis(10), true);
        let mut b = TaskStats::default();
        b.record(Duration::from_millis(30), false);

        a.merge(&b);
        assert_eq!(a.requests, 2);
        assert_eq!(a.failures, 1);
        assert!((a.mean_latency_ms() - 20.0).abs() < 1e-9);
    }
}
