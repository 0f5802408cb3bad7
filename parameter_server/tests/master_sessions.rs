use std::{borrow::Cow, num::NonZeroUsize, time::Duration};

use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg, Payload},
};
use machine_learning::{FeedDict, Model, graph::GraphBuilder};
use parameter_server::{DownpourConfig, Master, MasterErr};
use tokio::{
    io::{self, DuplexStream, ReadHalf, WriteHalf},
    net::TcpListener,
    task::JoinHandle,
    time,
};
use worker::Worker;

type Rx = WireReceiver<ReadHalf<DuplexStream>>;
type Tx = WireSender<WriteHalf<DuplexStream>>;

struct Linear {
    model: Model,
    x: usize,
    y: usize,
    theta: usize,
}

// loss = (x * theta - y)^2, theta starts at 5.
fn linear() -> Linear {
    let mut gb = GraphBuilder::new();
    let x = gb.feeder();
    let y = gb.feeder();
    let theta = gb.variable(5.);
    let prediction = gb.mul(x, theta);
    let diff = gb.sub(prediction, y);
    let square = gb.mul(diff, diff);
    gb.loss(square).unwrap();

    Linear {
        model: gb.build().unwrap(),
        x,
        y,
        theta,
    }
}

fn feed(x: usize, y: usize, xs: &[f32]) -> FeedDict {
    let ys = xs.iter().map(|v| 2. * v).collect();
    FeedDict::from_iter([(x, xs.to_vec()), (y, ys)])
}

fn config(worker_addrs: Vec<String>, max_iterations: usize) -> DownpourConfig {
    let mut config = DownpourConfig::new(worker_addrs, 0.01, 0.0001);
    config.batch_size = NonZeroUsize::new(3).unwrap();
    config.max_iterations = max_iterations;
    config
}

/// Returns the master's and the worker's ends of an in-memory connection.
fn link() -> ((Rx, Tx), (Rx, Tx)) {
    let (master, worker) = io::duplex(1 << 16);
    let (rx1, tx1) = io::split(master);
    let (rx2, tx2) = io::split(worker);
    (comms::channel(rx1, tx1), comms::channel(rx2, tx2))
}

fn spawn_worker((rx, tx): (Rx, Tx)) -> JoinHandle<worker::Result<()>> {
    tokio::spawn(async move { Worker::new().run(rx, tx).await })
}

async fn ack_model(rx: &mut Rx, tx: &mut Tx) -> io::Result<()> {
    let mut buf: Vec<u32> = Vec::new();
    let msg: Msg = rx.recv_into(&mut buf).await?;
    assert!(matches!(msg, Msg::Control(Command::SetModel(_))));

    tx.send(&Msg::Control(Command::SetModelAck)).await
}

#[tokio::test]
async fn two_workers_over_tcp_reach_the_optimum() -> io::Result<()> {
    let Linear { model, x, y, theta } = linear();

    let mut addrs = Vec::new();
    let mut workers = Vec::new();
    for _ in 0..2 {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        addrs.push(listener.local_addr()?.to_string());

        workers.push(tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let (rx, tx) = stream.into_split();
            let (rx, tx) = comms::channel(rx, tx);
            Worker::new().run(rx, tx).await
        }));
    }

    let feed = feed(x, y, &[1., 2., 3., 4., 5., 6.]);
    let mut master = Master::new(config(addrs, 100), model).unwrap();
    let values = master.optimize(&feed).await.unwrap();

    assert!((values[&theta] - 2.).abs() < 0.05, "theta = {}", values[&theta]);
    assert_eq!(master.model().variables()[&theta], values[&theta]);
    assert!(master.global().iterations() > 100);

    for worker in workers {
        worker.await?.unwrap();
    }

    Ok(())
}

#[tokio::test]
async fn single_worker_fold_overwrites_the_global_vector() -> io::Result<()> {
    let Linear { model, x, y, theta } = linear();
    let (master_end, (mut rx, mut tx)) = link();

    let mut master = Master::new(config(vec!["fake".into()], 0), model).unwrap();
    master.spawn(master_end.0, master_end.1, feed(x, y, &[1., 2., 3.]));

    let fake = tokio::spawn(async move {
        let mut buf: Vec<u32> = Vec::new();
        ack_model(&mut rx, &mut tx).await?;

        let msg: Msg = rx.recv_into(&mut buf).await?;
        let Msg::Data(Payload::Optimize { steps, params }) = msg else {
            panic!("expected run:optimize, got {msg:?}");
        };
        assert_eq!(steps, 5);
        assert_eq!(params, &[5.]);

        tx.send(&Msg::Data(Payload::OptimizeAck(&[7.]))).await?;

        let msg: Msg = rx.recv_into(&mut buf).await?;
        assert!(matches!(msg, Msg::Control(Command::SetRelease)));
        tx.send(&Msg::Control(Command::SetReleaseAck)).await
    });

    let values = master.run().await.unwrap();
    assert_eq!(values[&theta], 7.);
    assert!(master.global().is_released(0));

    fake.await?
}

#[tokio::test]
async fn spawned_workers_are_active_before_their_first_round() -> io::Result<()> {
    let Linear { model, x, y, .. } = linear();
    let feed = feed(x, y, &[1., 2., 3., 4., 5., 6.]);
    let parts = feed.partitions(NonZeroUsize::new(2).unwrap());

    let mut master = Master::new(config(vec!["a".into(), "b".into()], 20), model).unwrap();

    let (master_end, first) = link();
    master.spawn(master_end.0, master_end.1, parts[0].clone());
    assert_eq!(master.global().active(), 1);

    let (master_end, second) = link();
    master.spawn(master_end.0, master_end.1, parts[1].clone());
    assert_eq!(master.global().active(), 2);

    let workers = [spawn_worker(first), spawn_worker(second)];
    master.run().await.unwrap();

    for worker in workers {
        worker.await?.unwrap();
    }

    assert_eq!(master.global().active(), 0);
    Ok(())
}

#[tokio::test]
async fn a_silent_worker_stalls_the_run() -> io::Result<()> {
    let Linear { model, x, y, .. } = linear();
    let feed = feed(x, y, &[1., 2., 3., 1., 2., 3.]);
    let parts = feed.partitions(NonZeroUsize::new(2).unwrap());

    let mut master = Master::new(config(vec!["a".into(), "b".into()], 20), model).unwrap();

    let (master_end, worker_end) = link();
    master.spawn(master_end.0, master_end.1, parts[0].clone());
    let responsive = spawn_worker(worker_end);

    let (master_end, (mut rx, mut tx)) = link();
    master.spawn(master_end.0, master_end.1, parts[1].clone());
    let silent = tokio::spawn(async move {
        let mut buf: Vec<u32> = Vec::new();
        ack_model(&mut rx, &mut tx).await?;

        let msg: Msg = rx.recv_into(&mut buf).await?;
        assert!(matches!(msg, Msg::Data(Payload::Optimize { .. })));

        // Keep the connection open without ever answering.
        std::future::pending::<()>().await;
        Ok::<_, io::Error>(())
    });

    let stalled = time::timeout(Duration::from_millis(500), master.run()).await;
    assert!(stalled.is_err());

    responsive.await?.unwrap();
    assert!(master.global().is_released(0));
    assert!(!master.global().is_released(1));

    silent.abort();
    Ok(())
}

#[tokio::test]
async fn worker_failures_are_reported_after_the_others_finish() -> io::Result<()> {
    let Linear { model, x, y, theta } = linear();
    let feed = feed(x, y, &[1., 2., 3., 4., 5., 6.]);
    let parts = feed.partitions(NonZeroUsize::new(2).unwrap());

    let mut master = Master::new(config(vec!["a".into(), "b".into()], 20), model).unwrap();

    let (master_end, (mut rx, mut tx)) = link();
    master.spawn(master_end.0, master_end.1, parts[0].clone());
    let failing = tokio::spawn(async move {
        let mut buf: Vec<u32> = Vec::new();
        let _: Msg = rx.recv_into(&mut buf).await?;
        tx.send(&Msg::Err(Cow::Borrowed("boom"))).await
    });

    let (master_end, worker_end) = link();
    master.spawn(master_end.0, master_end.1, parts[1].clone());
    let healthy = spawn_worker(worker_end);

    match master.run().await {
        Err(MasterErr::WorkerError { worker_id, msg }) => {
            assert_eq!(worker_id, 0);
            assert_eq!(msg, "boom");
        }
        other => panic!("expected a worker error, got {other:?}"),
    }

    healthy.await?.unwrap();
    assert!(master.global().is_released(1));
    assert_eq!(master.model().variables()[&theta], 5.);

    failing.await?
}

#[tokio::test]
async fn protocol_violations_end_the_session() -> io::Result<()> {
    let Linear { model, x, y, .. } = linear();
    let (master_end, (mut rx, mut tx)) = link();

    let mut master = Master::new(config(vec!["fake".into()], 20), model).unwrap();
    master.spawn(master_end.0, master_end.1, feed(x, y, &[1., 2., 3.]));

    let fake = tokio::spawn(async move {
        let mut buf: Vec<u32> = Vec::new();
        let _: Msg = rx.recv_into(&mut buf).await?;
        tx.send(&Msg::Control(Command::SetReleaseAck)).await
    });

    match master.run().await {
        Err(MasterErr::UnexpectedMessage { expected, got, .. }) => {
            assert_eq!(expected, "set:model-ack");
            assert_eq!(got, "set:release-ack");
        }
        other => panic!("expected a protocol violation, got {other:?}"),
    }

    assert_eq!(master.global().active(), 0);
    fake.await?
}

#[tokio::test]
async fn data_is_checked_before_connecting() {
    let Linear { model, x, y, .. } = linear();

    // Nothing listens on these addresses, reaching the network would fail differently.
    let addrs = vec!["127.0.0.1:1".into(), "127.0.0.1:2".into()];
    let mut master = Master::new(config(addrs, 20), model).unwrap();

    let err = master.optimize(&feed(x, y, &[1.])).await.unwrap_err();
    assert!(matches!(err, MasterErr::InvalidConfig(_)));
}
