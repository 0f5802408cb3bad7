use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use comms::{WireReceiver, WireSender};
use log::{error, info};
use machine_learning::{FeedDict, Model, ParamMap};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    task::{self, JoinSet},
};

use super::{GlobalParams, session::Session};
use crate::{
    config::DownpourConfig,
    error::{MasterErr, Result},
};

/// The coordinator of a distributed run.
///
/// Each worker is driven by its own task, workers never wait for each other and every
/// returned parameter vector is folded into the global one as soon as it arrives.
pub struct Master {
    config: DownpourConfig,
    model: Model,
    global: Arc<GlobalParams>,
    tasks: JoinSet<Result<()>>,
    sessions: HashMap<task::Id, usize>,
    workers: usize,
}

impl Master {
    /// Creates a new `Master`.
    ///
    /// # Arguments
    /// * `config` - The run configuration.
    /// * `model` - The model to optimize, its variable values seed the global vector.
    ///
    /// # Returns
    /// The master or `InvalidConfig` if the configuration can't drive a run.
    pub fn new(config: DownpourConfig, model: Model) -> Result<Self> {
        config.validate()?;

        let global = Arc::new(GlobalParams::new(model.variable_vec()));

        Ok(Self {
            config,
            model,
            global,
            tasks: JoinSet::new(),
            sessions: HashMap::new(),
            workers: 0,
        })
    }

    /// Returns the model, its variables are updated once `run` succeeds.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Consumes the master returning its model.
    pub fn into_model(self) -> Model {
        self.model
    }

    /// Returns the state shared by the worker sessions.
    pub fn global(&self) -> &Arc<GlobalParams> {
        &self.global
    }

    /// Runs a whole distributed optimization over TCP.
    ///
    /// The dataset is split in as many partitions as workers, every partition must have at
    /// least one row. Every check happens before connecting to any worker.
    ///
    /// # Arguments
    /// * `feed` - The whole dataset.
    ///
    /// # Returns
    /// The final global value of every variable.
    pub async fn optimize(&mut self, feed: &FeedDict) -> Result<ParamMap> {
        let addrs = self.config.worker_addrs.clone();
        let partitions = self.partition(feed, addrs.len())?;

        let mut channels = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|source| MasterErr::ConnectionFailed {
                    addr: addr.clone(),
                    source,
                })?;

            info!("connected to worker at {addr}");
            let (rx, tx) = stream.into_split();
            channels.push(comms::channel(rx, tx));
        }

        for ((rx, tx), partition) in channels.into_iter().zip(partitions) {
            self.spawn(rx, tx, partition);
        }

        self.run().await
    }

    /// Binds a new worker to this master and spawns the task that drives it.
    ///
    /// The worker counts as active from this point on, before its task first runs.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the worker's connection.
    /// * `tx` - The sending end of the worker's connection.
    /// * `partition` - The worker's exclusive share of the dataset.
    pub fn spawn<R, W>(&mut self, rx: WireReceiver<R>, tx: WireSender<W>, partition: FeedDict)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let worker_id = self.workers;
        self.workers += 1;

        let optimizer = self.config.optimizer_spec();
        let spec = self.model.to_spec(worker_id, optimizer, &partition);

        let session = Session {
            worker_id,
            rx,
            tx,
            global: Arc::clone(&self.global),
            steps: self.config.steps,
            max_iterations: self.config.max_iterations,
        };

        self.global.connect(worker_id);

        let global = Arc::clone(&self.global);
        self.track(worker_id, async move {
            let ret = session.run(spec).await;
            if ret.is_err() {
                global.disconnect(worker_id);
            }

            ret
        });
    }

    /// Waits until every spawned worker is released.
    ///
    /// A failing session doesn't stop the others, its error is returned once they all end.
    ///
    /// # Returns
    /// The final global value of every variable, or the first session failure.
    pub async fn run(&mut self) -> Result<ParamMap> {
        let mut failure = None;

        while let Some(joined) = self.tasks.join_next_with_id().await {
            let ret = match joined {
                Ok((id, ret)) => {
                    self.sessions.remove(&id);
                    ret
                }
                Err(e) => {
                    // The task never got to disconnect its worker.
                    let worker_id = self.sessions.remove(&e.id());
                    if let Some(worker_id) = worker_id {
                        self.global.disconnect(worker_id);
                    }

                    Err(MasterErr::SessionAborted { worker_id, source: e })
                }
            };

            if let Err(e) = ret {
                error!("worker session failed: {e}");
                failure.get_or_insert(e);
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        let values: ParamMap = self
            .model
            .variable_ids()
            .iter()
            .copied()
            .zip(self.global.snapshot())
            .collect();

        self.model.set_variables(&values);
        info!(
            "run finished: iterations={} variables={values:?}",
            self.global.iterations()
        );

        Ok(values)
    }

    fn track<F>(&mut self, worker_id: usize, session: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = self.tasks.spawn(session);
        self.sessions.insert(handle.id(), worker_id);
    }

    fn partition(&self, feed: &FeedDict, workers: usize) -> Result<Vec<FeedDict>> {
        let workers = NonZeroUsize::new(workers)
            .ok_or_else(|| MasterErr::InvalidConfig("there are no workers".into()))?;

        let partitions = feed.partitions(workers);
        if let Some(i) = partitions.iter().position(FeedDict::is_empty) {
            return Err(MasterErr::InvalidConfig(format!(
                "the dataset has {} rows, not enough for {workers} workers: partition {i} is empty",
                feed.len()
            )));
        }

        Ok(partitions)
    }
}
