use std::{borrow::Cow, io};

use comms::{
    NodeId, WireReceiver, WireSender,
    msg::{Command, Msg, Payload},
    specs::model::ModelSpec,
};
use log::{debug, info, warn};
use machine_learning::{
    FeedDict, MlErr, Model, ParamMap,
    backend::{ForwardAccumulation, GradientBackend},
    graph::Op,
    optimization::{IterativeOptimizer, MiniBatchSgd, OptimizerBuilder},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task,
};

use crate::{
    error::{Result, WorkerErr},
    state::WorkerState,
};

/// The model bound by the last `set:model`.
struct Session<B: GradientBackend> {
    worker_id: usize,
    variable_ids: Vec<NodeId>,
    // Taken while a step runs on the blocking pool.
    optimizer: Option<MiniBatchSgd<B>>,
}

/// Worker runtime, serves a single master connection.
///
/// The worker never stops on its own: it answers every `run:optimize` with exactly one
/// `run:optimize-ack` until the master sends `set:release`.
pub struct Worker<B: GradientBackend = ForwardAccumulation> {
    backend: B,
    state: WorkerState,
    session: Option<Session<B>>,
}

impl Worker {
    /// Creates a new idle `Worker` computing gradients with forward accumulation.
    pub fn new() -> Self {
        Self::with_backend(ForwardAccumulation::new())
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Worker<B>
where
    B: GradientBackend + Clone + 'static,
{
    /// Creates a new idle `Worker`.
    ///
    /// # Arguments
    /// * `backend` - The gradient backend handed to every optimizer this worker builds.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            state: WorkerState::Idle,
            session: None,
        }
    }

    /// The current state of the worker.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Serves the master until it releases this worker.
    ///
    /// On a failure the worker makes a best effort to tell the master with an `err`
    /// message before giving up on the connection.
    ///
    /// # Arguments
    /// * `rx` - Receiving end of the master channel.
    /// * `tx` - Sending end of the master channel.
    ///
    /// # Returns
    /// `Ok(())` once the release handshake completes.
    ///
    /// # Errors
    /// Returns `WorkerErr` on I/O failures, invalid models or protocol violations.
    pub async fn run<R, W>(
        &mut self,
        mut rx: WireReceiver<R>,
        mut tx: WireSender<W>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut rx_buf: Vec<u32> = Vec::new();

        while self.state != WorkerState::Released {
            let msg: Msg = rx.recv_into(&mut rx_buf).await?;

            if let Err(e) = self.handle(msg, &mut tx).await {
                let msg = Msg::Err(Cow::Owned(e.to_string()));
                if let Err(send_err) = tx.send(&msg).await {
                    warn!("could not report the failure to the master: {send_err}");
                }

                self.state = WorkerState::Closed;
                return Err(e);
            }
        }

        tx.shutdown().await?;
        self.state = WorkerState::Closed;

        info!(worker_id = self.worker_id(); "released by the master");
        Ok(())
    }

    async fn handle<W>(&mut self, msg: Msg<'_>, tx: &mut WireSender<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match msg {
            Msg::Control(Command::SetModel(spec)) if self.state.accepts_model() => {
                self.set_model(*spec)?;
                tx.send(&Msg::Control(Command::SetModelAck)).await?;
                self.state = WorkerState::ModelReceived;
            }
            Msg::Data(Payload::Optimize { steps, params }) if self.state.has_model() => {
                let values = self.optimize(params, steps).await?;
                tx.send(&Msg::Data(Payload::OptimizeAck(&values))).await?;
                self.state = WorkerState::Optimizing;
            }
            Msg::Control(Command::SetRelease) if self.state.has_model() => {
                tx.send(&Msg::Control(Command::SetReleaseAck)).await?;
                self.state = WorkerState::Released;
            }
            other => {
                warn!(
                    "unexpected message from master: state={} got={}",
                    self.state,
                    other.kind()
                );

                return Err(WorkerErr::UnexpectedMessage {
                    state: self.state,
                    got: other.kind(),
                });
            }
        }

        Ok(())
    }

    fn set_model(&mut self, spec: ModelSpec) -> Result<()> {
        let model = Model::from_spec(&spec)?;
        let feed = FeedDict::from(spec.feeds.as_slice());
        let rows = feed.len();

        let backend = self.backend.clone();
        let mut optimizer = OptimizerBuilder::new().build_with(spec.optimizer, backend);
        optimizer.init_optimizer(
            model.graph_arc(),
            feed,
            model.constants().clone(),
            model.variable_ids().to_vec(),
            model.loss_id(),
        )?;

        info!(worker_id = spec.worker_id, rows = rows; "model received");

        self.session = Some(Session {
            worker_id: spec.worker_id,
            variable_ids: spec.variable_ids,
            optimizer: Some(optimizer),
        });

        Ok(())
    }

    /// Runs `steps` local steps starting from `params`, on the blocking pool.
    async fn optimize(&mut self, params: &[f32], steps: usize) -> Result<Vec<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or(WorkerErr::Ml(MlErr::OptimizerNotInitialized))?;

        let expected = session.variable_ids.len();
        if params.len() != expected {
            return Err(WorkerErr::ParamsLengthMismatch {
                got: params.len(),
                expected,
            });
        }

        let variables: ParamMap = session
            .variable_ids
            .iter()
            .copied()
            .zip(params.iter().copied())
            .collect();

        let mut optimizer = session
            .optimizer
            .take()
            .ok_or(WorkerErr::Ml(MlErr::OptimizerNotInitialized))?;

        debug!(worker_id = session.worker_id, steps = steps; "running local steps");

        let (optimizer, values) = task::spawn_blocking(move || {
            let values = optimizer.optimize_step(&variables, steps);
            (optimizer, values)
        })
        .await
        .map_err(io::Error::other)?;

        session.optimizer = Some(optimizer);
        let values = values?;

        session
            .variable_ids
            .iter()
            .map(|id| {
                values.get(id).copied().ok_or(WorkerErr::Ml(MlErr::MissingValue {
                    node: *id,
                    op: Op::Variable,
                }))
            })
            .collect()
    }

    fn worker_id(&self) -> usize {
        self.session.as_ref().map_or(0, |session| session.worker_id)
    }
}
