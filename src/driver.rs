//! Wiring the pieces together: load the inputs, then drain them with a
//! fixed-size worker pool.

use std::cmp;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel;
use failure::{Error, Fail, ResultExt};
use num_cpus;

use analyzer::{Analyzer, OutputLayout};
use config::Config;
use input::{self, WorkItem};

#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    config: Config,
}

impl Driver {
    pub fn with_config(config: Config) -> Driver {
        Driver { config }
    }

    /// Run the whole batch: one pipeline per repository, spread over at most
    /// `min(cpu count, repository count)` workers.
    ///
    /// Individual repositories failing is normal operation and doesn't make
    /// the batch fail; only setup problems (unreadable input files, output
    /// directories that can't be created) are reported as errors.
    pub fn run(&self, input_files: &[PathBuf]) -> Result<(), Error> {
        let items = input::load_identifiers(input_files)?;
        info!("Loaded {} repositories", items.len());

        let layout = OutputLayout::default();
        layout.create_dirs()?;

        let analyzer = Analyzer::with_layout(&self.config.github.token, layout);

        let spawned = run_pool(items, num_cpus::get(), move |item: WorkItem| {
            if let Err(e) = analyzer.analyze(&item) {
                warn!("Skipping {}: {}", item.raw, e);
                for cause in Fail::iter_causes(&e) {
                    warn!("\tCaused by: {}", cause);
                }
            }
        })?;

        debug!("All {} workers finished", spawned);
        Ok(())
    }
}

/// Feed `items` through a single shared channel drained by a fixed pool of
/// worker threads, returning how many workers were spawned.
///
/// Workers compete for items, so each item is claimed by exactly one worker;
/// with no items, no threads are spawned at all.
fn run_pool<T, F>(items: Vec<T>, max_workers: usize, worker: F) -> Result<usize, Error>
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    let worker_count = cmp::min(max_workers, items.len());
    if worker_count == 0 {
        return Ok(0);
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let worker = Arc::new(worker);

    let mut handles = Vec::with_capacity(worker_count);
    for idx in 0..worker_count {
        let rx = rx.clone();
        let worker = Arc::clone(&worker);

        let handle = thread::Builder::new()
            .name(format!("analyzer-{}", idx))
            .spawn(move || {
                for item in rx.iter() {
                    worker(item);
                }
            })
            .context("Couldn't spawn a worker thread")?;
        handles.push(handle);
    }

    // Only the workers hold receivers now, so dropping the sender below is
    // what eventually shuts them down.
    drop(rx);

    for item in items {
        if tx.send(item).is_err() {
            break;
        }
    }
    drop(tx);

    // Wait for every worker, even after a panic, so nothing is still writing
    // artifacts once we return.
    let mut panicked = 0;
    for handle in handles {
        if handle.join().is_err() {
            panicked += 1;
        }
    }

    if panicked > 0 {
        return Err(format_err!("{} worker thread(s) panicked", panicked));
    }

    Ok(worker_count)
}
