#![cfg(test)]

use std::num::NonZeroUsize;

use comms::{NodeId, specs::optimizer::OptimizerSpec};

use crate::{
    FeedDict, Model, ParamMap,
    backend::ForwardAccumulation,
    graph::GraphBuilder,
    optimization::{IterativeOptimizer, OptimizerBuilder},
};

struct Linear {
    model: Model,
    x: NodeId,
    y: NodeId,
    theta: NodeId,
    prediction: NodeId,
}

// prediction = x * theta, loss = (prediction - y)^2
fn linear(init: f32) -> Linear {
    let mut gb = GraphBuilder::new();
    let x = gb.feeder();
    let y = gb.feeder();
    let theta = gb.variable(init);
    let prediction = gb.mul(x, theta);
    let diff = gb.sub(prediction, y);
    let square = gb.mul(diff, diff);
    gb.loss(square).unwrap();

    Linear {
        model: gb.build().unwrap(),
        x,
        y,
        theta,
        prediction,
    }
}

fn sgd(
    learning_rate: f32,
    epsilon: f32,
    batch_size: usize,
    max_iterations: usize,
) -> OptimizerSpec {
    OptimizerSpec::MiniBatchSgd {
        learning_rate,
        epsilon,
        batch_size: NonZeroUsize::new(batch_size).unwrap(),
        max_iterations,
    }
}

#[test]
fn test_linear_regression_converges() {
    let Linear {
        mut model, x, y, theta, ..
    } = linear(5.);

    let feed = FeedDict::from_iter([(x, vec![1., 2., 3.]), (y, vec![2., 4., 6.])]);
    let mut optimizer = OptimizerBuilder::new().build(sgd(0.1, 0.001, 3, 400));

    model.optimize(&mut optimizer, feed).unwrap();

    assert!(optimizer.has_converged());
    let value = model.variables()[&theta];
    assert!((value - 2.).abs() < 0.01, "theta = {value}");
}

#[test]
fn test_eval_prediction_without_targets() {
    let Linear {
        mut model,
        x,
        theta,
        prediction,
        ..
    } = linear(5.);

    model.set_variables(&ParamMap::from([(theta, 2.)]));
    let feed = FeedDict::from_iter([(x, vec![10., 20., 30., 40.])]);

    let values = model.eval(&ForwardAccumulation, prediction, &feed).unwrap();
    assert_eq!(values, vec![20., 40., 60., 80.]);
}

#[test]
fn test_mini_batches_reach_the_same_optimum() {
    let Linear {
        mut model, x, y, theta, ..
    } = linear(-3.);

    let xs: Vec<f32> = (1..=10).map(|i| i as f32 / 10.).collect();
    let ys: Vec<f32> = xs.iter().map(|x| 3. * x).collect();
    let feed = FeedDict::from_iter([(x, xs), (y, ys)]);

    let mut optimizer = OptimizerBuilder::new().build(sgd(0.5, 1e-5, 4, 2000));
    model.optimize(&mut optimizer, feed).unwrap();

    let value = model.variables()[&theta];
    assert!((value - 3.).abs() < 0.01, "theta = {value}");
}

#[test]
fn test_logistic_regression_separates_classes() {
    // p = logistic(w * x + b), loss = (p - y)^2
    let mut gb = GraphBuilder::new();
    let x = gb.feeder();
    let y = gb.feeder();
    let w = gb.variable(0.);
    let b = gb.variable(0.);
    let wx = gb.mul(w, x);
    let z = gb.add(wx, b);
    let p = gb.logistic(z);
    let diff = gb.sub(p, y);
    let square = gb.mul(diff, diff);
    gb.loss(square).unwrap();
    let mut model = gb.build().unwrap();

    let feed = FeedDict::from_iter([
        (x, vec![-2., -1., 1., 2.]),
        (y, vec![0., 0., 1., 1.]),
    ]);

    let mut optimizer = OptimizerBuilder::new().build(sgd(1., 0., 4, 500));
    model.optimize(&mut optimizer, feed.clone()).unwrap();

    let predictions = model.eval(&ForwardAccumulation, p, &feed).unwrap();
    assert!(predictions[0] < 0.5 && predictions[1] < 0.5);
    assert!(predictions[2] > 0.5 && predictions[3] > 0.5);
}
