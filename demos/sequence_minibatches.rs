//! Variable length sequences: minibatches cut to the longest masked
//! sequence, prefetched on a background thread.
//!
//! Run with: `cargo run --example sequence_minibatches`

use ndarray::{ArrayD, IxDyn};
use seqfeed::iterators::{DataIterator, Minibatches, Threaded};
use seqfeed::randomness::RandomState;
use seqfeed::data::NamedData;

const MAX_TIME: usize = 20;
const SEQUENCES: usize = 64;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut rnd = RandomState::new(7);
    let mut mask = ArrayD::<f32>::zeros(IxDyn(&[MAX_TIME, SEQUENCES, 1]));
    let mut input_data = ArrayD::<f32>::zeros(IxDyn(&[MAX_TIME, SEQUENCES, 2]));
    for b in 0..SEQUENCES {
        let len = 1 + rnd.below_or_equal(MAX_TIME - 1);
        for t in 0..len {
            mask[[t, b, 0]] = 1.0;
            input_data[[t, b, 0]] = t as f32;
            input_data[[t, b, 1]] = b as f32;
        }
    }

    let data = NamedData::new([
        ("input_data", input_data),
        ("mask", mask),
        // T = 1: not cut along with the sequences.
        ("static_data", ArrayD::ones(IxDyn(&[1, SEQUENCES, 3]))),
    ])?;

    let source = Minibatches::new(data, 16)?
        .cut_according_to("mask")?
        .seed(3);
    let mut iterator = Threaded::new(Box::new(source), Threaded::DEFAULT_BUFFER_SIZE)?;

    println!("declared shapes: {:?}", iterator.data_shapes());
    for batch in iterator.epoch() {
        println!(
            "sequences {:?}: input_data T={:?}, static_data T={:?}",
            batch.indices(),
            batch.time_steps("input_data"),
            batch.time_steps("static_data")
        );
    }
    Ok(())
}
