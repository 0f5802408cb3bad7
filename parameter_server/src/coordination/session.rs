use std::{num::NonZeroUsize, sync::Arc};

use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg, Payload},
    specs::model::ModelSpec,
};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::GlobalParams;
use crate::error::{MasterErr, Result};

/// Drives a single worker from `set:model` to `set:release-ack`.
pub(super) struct Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub worker_id: usize,
    pub rx: WireReceiver<R>,
    pub tx: WireSender<W>,
    pub global: Arc<GlobalParams>,
    pub steps: NonZeroUsize,
    pub max_iterations: usize,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub async fn run(mut self, spec: ModelSpec) -> Result<()> {
        let worker_id = self.worker_id;
        let mut rx_buf: Vec<u32> = Vec::new();

        let msg = Msg::Control(Command::SetModel(Box::new(spec)));
        self.tx.send(&msg).await?;

        match self.rx.recv_into(&mut rx_buf).await? {
            Msg::Control(Command::SetModelAck) => {}
            other => return Err(self.unexpected("set:model-ack", other)),
        }

        info!(worker_id = worker_id; "model set");

        loop {
            let params = self.global.snapshot();
            let steps = self.steps.get();

            let msg = Msg::Data(Payload::Optimize {
                steps,
                params: &params,
            });
            self.tx.send(&msg).await?;

            let iterations = match self.rx.recv_into(&mut rx_buf).await? {
                Msg::Data(Payload::OptimizeAck(values)) => {
                    self.global.fold(worker_id, values, steps)?
                }
                other => return Err(self.unexpected("run:optimize-ack", other)),
            };

            debug!(worker_id = worker_id, iterations = iterations; "folded round");

            if iterations > self.max_iterations {
                break;
            }
        }

        self.tx.send(&Msg::Control(Command::SetRelease)).await?;

        match self.rx.recv_into(&mut rx_buf).await? {
            Msg::Control(Command::SetReleaseAck) => {}
            other => return Err(self.unexpected("set:release-ack", other)),
        }

        self.global.release(worker_id);
        info!(worker_id = worker_id; "worker released");

        Ok(())
    }

    fn unexpected(&self, expected: &'static str, got: Msg<'_>) -> MasterErr {
        let worker_id = self.worker_id;

        if let Msg::Err(msg) = got {
            return MasterErr::WorkerError {
                worker_id,
                msg: msg.into_owned(),
            };
        }

        warn!(
            "unexpected message from worker: worker_id={worker_id} expected={expected} got={}",
            got.kind()
        );

        MasterErr::UnexpectedMessage {
            worker_id,
            expected,
            got: got.kind(),
        }
    }
}
