//! Contract tests shared by all data iterators.

use ndarray::{s, ArrayD, IxDyn};
use seqfeed::data::{DataError, NamedData};
use seqfeed::iterators::{
    crop_images, AddGaussianNoise, DataIterator, Flip, IteratorValidationError, Minibatches,
    Online, Pad, RandomCrop, Threaded, Undivided,
};
use seqfeed::randomness::RandomState;
use std::collections::BTreeSet;

fn random_array(rnd: &mut RandomState, shape: &[usize]) -> ArrayD<f32> {
    let n: usize = shape.iter().product();
    let values = (0..n).map(|_| rnd.uniform() as f32 * 2.0 - 1.0).collect();
    ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()
}

/// Builds each source iterator over the same entries.
fn build_all(entries: Vec<(&str, ArrayD<f32>)>) -> Vec<Result<Box<dyn DataIterator>, IteratorValidationError>> {
    vec![
        Undivided::from_arrays(entries.clone()).map(|it| Box::new(it) as Box<dyn DataIterator>),
        Online::from_arrays(entries.clone()).map(|it| Box::new(it) as Box<dyn DataIterator>),
        Minibatches::from_arrays(entries, Minibatches::DEFAULT_BATCH_SIZE)
            .map(|it| Box::new(it) as Box<dyn DataIterator>),
    ]
}

fn image_inner() -> Box<dyn DataIterator> {
    let mut rnd = RandomState::new(0);
    Box::new(Undivided::from_arrays([("default", random_array(&mut rnd, &[2, 3, 2, 2, 1]))]).unwrap())
}

// Common validation

#[test]
fn wrong_input_dim_raises() {
    for result in build_all(vec![
        ("my_data", ArrayD::zeros(IxDyn(&[2, 3]))),
        ("my_targets", ArrayD::ones(IxDyn(&[2, 3, 1]))),
    ]) {
        assert!(matches!(
            result,
            Err(IteratorValidationError::Data(DataError::Layout { .. }))
        ));
    }
}

#[test]
fn input_target_shape_mismatch_raises() {
    for result in build_all(vec![
        ("my_data", ArrayD::zeros(IxDyn(&[2, 5, 7]))),
        ("my_targets", ArrayD::ones(IxDyn(&[2, 3, 1]))),
    ]) {
        assert!(matches!(
            result,
            Err(IteratorValidationError::Data(DataError::BatchMismatch { .. }))
        ));
    }
}

#[test]
fn shape_mismatch_among_targets_raises() {
    for data_batch in [3, 5] {
        for result in build_all(vec![
            ("my_data", ArrayD::zeros(IxDyn(&[2, data_batch, 7]))),
            ("targets1", ArrayD::ones(IxDyn(&[2, 3, 1]))),
            ("targets2", ArrayD::ones(IxDyn(&[2, 5, 1]))),
        ]) {
            assert!(result.is_err());
        }
    }
}

#[test]
fn no_data_raises() {
    for result in build_all(Vec::new()) {
        assert!(matches!(
            result,
            Err(IteratorValidationError::Data(DataError::NoData))
        ));
    }
}

#[test]
fn names_of_batches_match_data_shapes() {
    for result in build_all(vec![
        ("input_data", ArrayD::zeros(IxDyn(&[3, 4, 2]))),
        ("static_data", ArrayD::zeros(IxDyn(&[1, 4, 5]))),
    ]) {
        let mut it = result.unwrap();
        let declared: BTreeSet<String> = it.data_shapes().keys().cloned().collect();
        let count = it.num_batches().unwrap();
        let batches: Vec<_> = it.epoch().collect();
        assert_eq!(batches.len(), count);
        for batch in batches {
            let names: BTreeSet<String> = batch.names().map(String::from).collect();
            assert_eq!(names, declared);
        }
    }
}

#[test]
fn documented_shapes_follow_convention() {
    let data = NamedData::new([
        ("input_data", ArrayD::zeros(IxDyn(&[1, 600, 784]))),
        ("targets", ArrayD::zeros(IxDyn(&[1, 600, 1]))),
    ])
    .unwrap();
    assert_eq!(data.num_sequences(), 600);
    assert!(!data.layout("input_data").unwrap().is_sequential());
}

// Undivided

#[test]
fn undivided_named_targets() {
    let input_data = ArrayD::zeros(IxDyn(&[2, 3, 5]));
    let targets1 = ArrayD::ones(IxDyn(&[2, 3, 1]));
    let targets2 = ArrayD::ones(IxDyn(&[2, 3, 1]));
    let mut it = Undivided::from_arrays([
        ("my_data", input_data.clone()),
        ("targets1", targets1.clone()),
        ("targets2", targets2.clone()),
    ])
    .unwrap();

    let mut epoch = it.epoch();
    let x = epoch.next().unwrap();
    assert_eq!(x.get("my_data"), Some(&input_data));
    assert_eq!(x.get("targets1"), Some(&targets1));
    assert_eq!(x.get("targets2"), Some(&targets2));
    assert!(epoch.next().is_none());
}

// Online

#[test]
fn online_default() {
    let mut it = Online::from_arrays([
        ("my_data", ArrayD::zeros(IxDyn(&[4, 5, 3]))),
        ("my_targets", ArrayD::ones(IxDyn(&[4, 5, 1]))),
    ])
    .unwrap()
    .shuffle(false);

    let mut epoch = it.epoch();
    for _ in 0..5 {
        let x = epoch.next().unwrap();
        assert_eq!(x.names().collect::<Vec<_>>(), vec!["my_data", "my_targets"]);
        assert_eq!(x.get("my_data").unwrap().shape(), &[4, 1, 3]);
        assert_eq!(x.get("my_targets").unwrap().shape(), &[4, 1, 1]);
    }
    assert!(epoch.next().is_none());
}

#[test]
fn online_shuffle_changes_between_epochs() {
    let mut it = Online::from_arrays([("x", ArrayD::zeros(IxDyn(&[1, 50, 1])))])
        .unwrap()
        .seed(5);
    let first: Vec<usize> = it.epoch().map(|b| b.indices()[0]).collect();
    let second: Vec<usize> = it.epoch().map(|b| b.indices()[0]).collect();
    assert_ne!(first, second);
}

// Minibatches

#[test]
fn minibatches_default_batch_size() {
    let mut it = Minibatches::from_arrays(
        [
            ("my_data", ArrayD::zeros(IxDyn(&[2, 25, 3]))),
            ("my_targets", ArrayD::ones(IxDyn(&[2, 25, 1]))),
        ],
        Minibatches::DEFAULT_BATCH_SIZE,
    )
    .unwrap();
    let sizes: Vec<usize> = it.epoch().map(|b| b.batch_size()).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
}

#[test]
fn minibatches_same_seed_same_order() {
    let make = || {
        Minibatches::from_arrays([("x", ArrayD::zeros(IxDyn(&[1, 30, 1])))], 4)
            .unwrap()
            .seed(9)
    };
    let a: Vec<Vec<usize>> = make().epoch().map(|b| b.indices().to_vec()).collect();
    let b: Vec<Vec<usize>> = make().epoch().map(|b| b.indices().to_vec()).collect();
    assert_eq!(a, b);
}

// Nested iterators

#[test]
fn flip_dict_mismatch_raises() {
    assert!(matches!(
        Flip::new(image_inner(), [("images", 1.0)]),
        Err(IteratorValidationError::UnknownName { .. })
    ));
    assert!(matches!(
        Flip::new(image_inner(), [("default", 10.0)]),
        Err(IteratorValidationError::InvalidParameter { .. })
    ));
}

#[test]
fn flip() {
    let mut rnd = RandomState::new(1);
    let a = random_array(&mut rnd, &[2, 3, 5, 5, 4]);
    let b = random_array(&mut rnd, &[2, 3, 4, 4, 1]);
    let c = random_array(&mut rnd, &[2, 3, 1]);
    let inner = Undivided::from_arrays([
        ("default", a.clone()),
        ("secondary", b.clone()),
        ("targets", c.clone()),
    ])
    .unwrap();
    let mut it = Flip::new(Box::new(inner), [("default", 1.0)]).unwrap();

    let x = it.epoch().next().unwrap();
    assert_eq!(x.names().count(), 3);
    assert_eq!(x.get("default").unwrap().shape(), &[2, 3, 5, 5, 4]);
    assert_eq!(
        x.get("default").unwrap().slice(s![.., .., .., ..;-1, ..]).into_dyn(),
        a.view()
    );
    assert_eq!(x.get("secondary"), Some(&b));
    assert_eq!(x.get("targets"), Some(&c));
}

#[test]
fn pad_dict_mismatch_raises() {
    let empty: [(&str, f32); 0] = [];
    assert!(matches!(
        Pad::new(image_inner(), [("images", 1)], empty),
        Err(IteratorValidationError::UnknownName { .. })
    ));
    assert!(matches!(
        Pad::new(image_inner(), [("default", 1)], [("images", 0.0)]),
        Err(IteratorValidationError::DictMismatch { .. })
    ));
}

#[test]
fn pad_oversized_size_raises() {
    let empty: [(&str, f32); 0] = [];
    assert!(matches!(
        Pad::new(image_inner(), [("default", usize::MAX / 2 + 1)], empty),
        Err(IteratorValidationError::InvalidParameter { parameter: "size", .. })
    ));
}

#[test]
fn pad() {
    let mut rnd = RandomState::new(2);
    let a = random_array(&mut rnd, &[2, 3, 5, 5, 4]);
    let b = random_array(&mut rnd, &[2, 3, 4, 4, 1]);
    let c = random_array(&mut rnd, &[2, 3, 1]);
    let inner = Undivided::from_arrays([
        ("default", a.clone()),
        ("secondary", b.clone()),
        ("targets", c.clone()),
    ])
    .unwrap();
    let empty: [(&str, f32); 0] = [];
    let mut it = Pad::new(Box::new(inner), [("default", 1)], empty).unwrap();
    assert_eq!(it.data_shapes()["default"], vec![2, 3, 7, 7, 4]);

    let x = it.epoch().next().unwrap();
    let padded = x.get("default").unwrap();
    assert_eq!(padded.shape(), &[2, 3, 7, 7, 4]);
    assert_eq!(padded.slice(s![.., .., 1..-1, 1..-1, ..]).into_dyn(), a.view());
    assert_eq!(padded.slice(s![.., .., 0, .., ..]).sum(), 0.0);
    assert_eq!(x.get("secondary"), Some(&b));
    assert_eq!(x.get("targets"), Some(&c));
}

#[test]
fn random_crop_dict_mismatch_raises() {
    assert!(matches!(
        RandomCrop::new(image_inner(), [("images", (1, 1))]),
        Err(IteratorValidationError::UnknownName { .. })
    ));
    assert!(matches!(
        RandomCrop::new(image_inner(), [("default", (10, 10))]),
        Err(IteratorValidationError::InvalidParameter { .. })
    ));
    assert!(matches!(
        RandomCrop::new(image_inner(), [("default", (0, 1))]),
        Err(IteratorValidationError::InvalidParameter { .. })
    ));
}

#[test]
fn random_crop() {
    let mut rnd = RandomState::new(3);
    let a = random_array(&mut rnd, &[1, 3, 5, 5, 4]);
    let b = random_array(&mut rnd, &[1, 3, 4, 4, 1]);
    let c = random_array(&mut rnd, &[1, 3, 1]);
    let inner = Undivided::from_arrays([("default", a), ("secondary", b), ("targets", c.clone())])
        .unwrap();
    let mut it = RandomCrop::new(Box::new(inner), [("default", (3, 3)), ("secondary", (2, 2))])
        .unwrap()
        .seed(4);

    let x = it.epoch().next().unwrap();
    assert_eq!(x.get("default").unwrap().shape(), &[1, 3, 3, 3, 4]);
    assert_eq!(x.get("secondary").unwrap().shape(), &[1, 3, 2, 2, 1]);
    assert_eq!(x.get("targets"), Some(&c));
}

#[test]
fn crop_images_operation() {
    let mut rnd = RandomState::new(4);
    let a = random_array(&mut rnd, &[3, 2, 5, 5, 4]);
    let out = crop_images(&a, 3, 3, &[0, 1], &[0, 2]).unwrap();
    assert_eq!(out.slice(s![.., 0, .., .., ..]), a.slice(s![.., 0, 0..3, 0..3, ..]));
    assert_eq!(out.slice(s![.., 1, .., .., ..]), a.slice(s![.., 1, 1..4, 2..5, ..]));
}

#[test]
fn non_image_data_raises() {
    let non_image = || -> Box<dyn DataIterator> {
        Box::new(Undivided::from_arrays([("default", ArrayD::zeros(IxDyn(&[2, 3, 1, 2])))]).unwrap())
    };
    let empty: [(&str, f32); 0] = [];
    assert!(matches!(
        Flip::new(non_image(), [("default", 1.0)]),
        Err(IteratorValidationError::Layout { .. })
    ));
    assert!(matches!(
        Pad::new(non_image(), [("default", 1)], empty),
        Err(IteratorValidationError::Layout { .. })
    ));
    assert!(matches!(
        RandomCrop::new(non_image(), [("default", (1, 1))]),
        Err(IteratorValidationError::Layout { .. })
    ));
}

#[test]
fn noise_on_threaded_minibatches() {
    let source = Minibatches::from_arrays([("x", ArrayD::zeros(IxDyn(&[1, 20, 2])))], 8).unwrap();
    let noisy = AddGaussianNoise::new(Box::new(source), [("x", 1.0)], [("x", 0.0)]).unwrap();
    let mut it = Threaded::new(Box::new(noisy), 2).unwrap();
    it.set_seed(13);

    let batches: Vec<_> = it.epoch().collect();
    assert_eq!(batches.iter().map(|b| b.batch_size()).sum::<usize>(), 20);
    assert!(batches
        .iter()
        .any(|b| b.get("x").unwrap().iter().any(|&v| v != 0.0)));
}

#[test]
fn seeding_the_outer_iterator_reproduces_the_pipeline() {
    let make = || {
        let source = Minibatches::from_arrays([("x", ArrayD::zeros(IxDyn(&[1, 12, 3])))], 5).unwrap();
        let mut it = AddGaussianNoise::new(Box::new(source), [("x", 1.0)], [("x", 0.0)]).unwrap();
        it.set_seed(21);
        it
    };
    let a: Vec<_> = make().epoch().collect();
    let b: Vec<_> = make().epoch().collect();
    assert_eq!(a, b);
}
