//! Stores MNIST-shaped data in the recommended layout and trains over it
//! with noisy minibatches.
//!
//! Run with: `cargo run --example mnist_layout`

use ndarray::{ArrayD, IxDyn};
use seqfeed::iterators::{AddGaussianNoise, DataIterator, Minibatches};
use seqfeed::randomness::RandomState;
use seqfeed::storage::{DataFile, DataFileWriter};

const TRAIN: usize = 600;
const VALID: usize = 100;
const PIXELS: usize = 784;

fn fake_digits(
    rnd: &mut RandomState,
    samples: usize,
) -> Result<(ArrayD<f32>, ArrayD<f32>), ndarray::ShapeError> {
    let pixels = (0..samples * PIXELS).map(|_| rnd.uniform() as f32).collect();
    let labels = (0..samples).map(|_| rnd.below_or_equal(9) as f32).collect();
    Ok((
        ArrayD::from_shape_vec(IxDyn(&[1, samples, PIXELS]), pixels)?,
        ArrayD::from_shape_vec(IxDyn(&[1, samples, 1]), labels)?,
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut rnd = RandomState::new(2024);
    let path = std::env::temp_dir().join("seqfeed_mnist_layout.safetensors");

    // Non-sequential data: T = 1, B = number of samples.
    let mut writer = DataFileWriter::new().with_metadata("source", "random digits");
    for (group, samples) in [("training", TRAIN), ("validation", VALID)] {
        let (inputs, targets) = fake_digits(&mut rnd, samples)?;
        writer.add_dataset(group, "default", inputs)?;
        writer.add_dataset(group, "targets", targets)?;
    }
    writer.write(&path)?;

    let file = DataFile::open(&path)?;
    for report in file.check_conventions() {
        println!("{report}");
    }

    let training = file.group("training")?.load()?;
    let source = Minibatches::new(training, 100)?.seed(1);
    let mut iterator = AddGaussianNoise::new(Box::new(source), [("default", 0.1)], [("default", 0.0)])?
        .seed(2);

    for epoch in 0..2 {
        let mut total = 0.0f32;
        for batch in iterator.epoch() {
            if let Some(x) = batch.get("default") {
                total += x.sum();
            }
        }
        println!("epoch {epoch}: pixel sum {total:.1}");
    }

    std::fs::remove_file(&path).ok();
    Ok(())
}
