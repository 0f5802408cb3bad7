use std::{env, io};

use log::info;
use machine_learning::{FeedDict, graph::GraphBuilder};
use parameter_server::{DownpourConfig, Master};
use tokio::signal;

const DEFAULT_CONFIG: &str = "downpour.json";
const SAMPLES: usize = 1000;

/// Fits `y = theta * x` on a synthetic dataset where `theta` is 2, distributing the work
/// across the workers listed in the configuration file.
#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = DownpourConfig::from_path(&path)?;
    info!("loaded config from {path}: {config:?}");

    let mut gb = GraphBuilder::new();
    let x = gb.feeder();
    let y = gb.feeder();
    let theta = gb.variable(5.);
    let prediction = gb.mul(x, theta);
    let diff = gb.sub(prediction, y);
    let square = gb.mul(diff, diff);
    gb.loss(square).map_err(io::Error::other)?;
    let model = gb.build().map_err(io::Error::other)?;

    let xs: Vec<f32> = (0..SAMPLES).map(|i| i as f32 / SAMPLES as f32).collect();
    let ys = xs.iter().map(|x| 2. * x).collect();
    let feed = FeedDict::from_iter([(x, xs), (y, ys)]);

    let mut master = Master::new(config, model)?;

    tokio::select! {
        ret = master.optimize(&feed) => {
            let values = ret?;
            info!("theta = {:?}", values.get(&theta));
        }
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}
