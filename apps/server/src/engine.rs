//! Wires the checker components into a single-process deployment.

use std::sync::Arc;

use checker::heart::Heart;
use checker::scheduler::DUE_QUEUE_DEPTH;
use checker::slate::SlateClient;
use checker::transport::HEARTBEAT_TOPIC;
use checker::workers::{HttpClientConfig, UnavailableMetricSource};
use checker::{
    CheckResult, Checker, CheckerStats, Dispatcher, InventoryResolver, MemoryBus, Resolver, Runner, RunnerService,
    Scheduler, WorkerRegistry,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;

const PROCESS_NAME: &str = "checker";
const RESULT_BACKLOG: usize = 64;

pub struct Engine {
    checker: Arc<Checker>,
    scheduler: Arc<Scheduler>,
    stop: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    pub fn start(config: &Config) -> Result<Self, AppError> {
        let bus = MemoryBus::new();
        let stats = Arc::new(CheckerStats::default());
        let resolver: Arc<dyn Resolver> = Arc::new(InventoryResolver::new(config.inventory.clone()));

        let http = HttpClientConfig::default().with_max_content_length(config.checker.max_content_length);
        let registry = WorkerRegistry::with_defaults(http, Arc::new(UnavailableMetricSource));
        let dispatcher = Dispatcher::new(&registry, config.checker.max_workers_per_type).with_stats(stats.clone());

        let mut runner = Runner::new(dispatcher);
        if let Some(url) = &config.checker.slate_url {
            info!("Evaluating assertions with slate at {url}");
            runner = runner.with_evaluator(Arc::new(SlateClient::new(url.as_str())?));
        }
        let runner = Arc::new(runner);

        let runner_messages = bus.subscribe(&config.checker.runner_topic, DUE_QUEUE_DEPTH);
        let results = bus.subscribe(&config.checker.results_topic, RESULT_BACKLOG);
        let heartbeats = bus.subscribe(HEARTBEAT_TOPIC, 1);

        let scheduler = Arc::new(
            Scheduler::new(resolver.clone(), Arc::new(bus.clone()))
                .with_topic(config.checker.runner_topic.as_str())
                .with_stats(stats.clone()),
        );
        let service = Arc::new(
            RunnerService::new(runner.clone(), Arc::new(bus.clone()), config.checker.customer_id.as_str())
                .with_results_topic(config.checker.results_topic.as_str())
                .with_stats(stats.clone()),
        );

        let stop = CancellationToken::new();
        let heart = Heart::new(PROCESS_NAME, Arc::new(bus), stats).with_rate(config.heartbeat.interval());

        let tasks = vec![
            scheduler.start()?,
            service.spawn(runner_messages),
            heart.spawn(stop.clone()),
            spawn_result_log(results),
            spawn_heartbeat_log(heartbeats),
        ];

        let checker = Arc::new(
            Checker::new(scheduler.clone(), runner, resolver).with_max_test_targets(config.checker.max_test_targets),
        );

        Ok(Self { checker, scheduler, stop, tasks })
    }

    pub fn checker(&self) -> Arc<Checker> {
        self.checker.clone()
    }

    /// Stop the scheduler (which closes the bus) and wait for every
    /// background task to wind down.
    pub async fn shutdown(self) {
        info!("Shutting down checker engine");
        self.stop.cancel();
        self.scheduler.stop();
        for task in self.tasks {
            if let Err(error) = task.await {
                warn!("Background task ended abnormally: {error}");
            }
        }
    }
}

/// Log every published check result.
fn spawn_result_log(mut results: mpsc::Receiver<Vec<u8>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(raw) = results.recv().await {
            match serde_json::from_slice::<CheckResult>(&raw) {
                Ok(result) => info!(
                    check_id = %result.check_id,
                    passing = result.passing,
                    responses = result.responses.len(),
                    "check result"
                ),
                Err(error) => warn!("Undecodable check result: {error}"),
            }
        }
    })
}

fn spawn_heartbeat_log(mut heartbeats: mpsc::Receiver<Vec<u8>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(raw) = heartbeats.recv().await {
            debug!("heartbeat: {}", String::from_utf8_lossy(&raw));
        }
    })
}
