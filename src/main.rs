//! `seqfeed` command line tool: inspect, validate and iterate container files.

use clap::{Parser, Subcommand, ValueEnum};
use ndarray::{ArrayD, IxDyn};
use rand_distr::{Distribution, Normal};
use seqfeed::config::{IteratorConfig, PipelineConfig};
use seqfeed::iterators::DataIterator;
use seqfeed::layout::ShapeTemplate;
use seqfeed::randomness::RandomState;
use seqfeed::storage::{DataFile, DataFileWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "seqfeed: (T, B, ...) datasets and batch iterators", long_about = None)]
struct Args {
    /// Log filter, overrides RUST_LOG (e.g. "debug", "seqfeed=trace")
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List groups, datasets, shapes and layouts of a file
    Inspect { file: PathBuf },

    /// Check that groups follow the (T, B, ...) convention
    Validate {
        file: PathBuf,
        /// Only check this group
        #[arg(long)]
        group: Option<String>,
        /// Additionally require every dataset to match a template, e.g. "T,B,H,W,C"
        #[arg(long)]
        template: Option<ShapeTemplate>,
    },

    /// Run epochs over a group and report batch shapes
    Iterate {
        /// JSON pipeline description; the remaining options are ignored if given
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, required_unless_present = "config")]
        file: Option<PathBuf>,
        #[arg(long, default_value = "training")]
        group: String,
        #[arg(long, value_enum, default_value_t = Kind::Minibatches)]
        kind: Kind,
        #[arg(long, default_value_t = 10)]
        batch_size: usize,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        no_shuffle: bool,
        /// Prefetch this many batches on a background thread
        #[arg(long)]
        prefetch: Option<usize>,
        #[arg(long, default_value_t = 1)]
        epochs: usize,
    },

    /// Write a small example file with `training` and `validation` groups
    Demo {
        out: PathBuf,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Undivided,
    Online,
    Minibatches,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = match &args.log {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Inspect { file } => inspect(&file),
        Command::Validate {
            file,
            group,
            template,
        } => validate(&file, group.as_deref(), template.as_ref()),
        Command::Iterate {
            config,
            file,
            group,
            kind,
            batch_size,
            seed,
            no_shuffle,
            prefetch,
            epochs,
        } => {
            let config = match (config, file) {
                (Some(path), _) => PipelineConfig::from_file(path)?,
                (None, Some(file)) => {
                    let shuffle = !no_shuffle;
                    let iterator = match kind {
                        Kind::Undivided => IteratorConfig::Undivided,
                        Kind::Online => IteratorConfig::Online { shuffle },
                        Kind::Minibatches => IteratorConfig::Minibatches {
                            batch_size,
                            shuffle,
                            drop_last: false,
                            cut_according_to: None,
                        },
                    };
                    let mut config = PipelineConfig::new(file)
                        .with_group(&group)
                        .with_iterator(iterator);
                    config.seed = seed;
                    config.prefetch = prefetch;
                    config
                }
                (None, None) => return Err("either --config or --file is required".into()),
            };
            iterate(&config, epochs)
        }
        Command::Demo { out, seed } => demo(&out, seed),
    }
}

fn inspect(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = DataFile::open(path)?;
    println!("{}", path.display());
    for (key, value) in file.metadata() {
        println!("  @{key} = {value}");
    }
    for name in file.groups() {
        let group = file.group(name)?;
        println!("  group '{}'", if name.is_empty() { "/" } else { name });
        for dataset in group.dataset_names() {
            let info = group.info(dataset)?;
            let layout = match info.layout() {
                Ok(layout) => layout.to_string(),
                Err(e) => format!("invalid: {e}"),
            };
            println!(
                "    {:<20} {:?} {:?} {}",
                dataset, info.shape, info.dtype, layout
            );
        }
    }
    Ok(())
}

fn validate(
    path: &Path,
    group: Option<&str>,
    template: Option<&ShapeTemplate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = DataFile::open(path)?;
    let reports = match group {
        Some(name) => vec![file.group(name)?.report()],
        None => file.check_conventions(),
    };

    let mut failures = 0;
    for report in &reports {
        println!("{report}");
        if !report.is_valid() {
            failures += 1;
        }
        if let Some(template) = template {
            let group = file.group(&report.group)?;
            for name in group.dataset_names() {
                if let Err(e) = template.check(name, group.shape(name)?) {
                    println!("  {e}");
                    failures += 1;
                }
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} convention violation(s) in {}", path.display()).into());
    }
    println!("{}: all {} group(s) valid", path.display(), reports.len());
    Ok(())
}

fn iterate(config: &PipelineConfig, epochs: usize) -> Result<(), Box<dyn std::error::Error>> {
    let mut iterator = config.build()?;
    info!(
        "Iterator ready: {:?} batches per epoch, shapes {:?}",
        iterator.num_batches(),
        iterator.data_shapes()
    );

    for epoch in 0..epochs {
        let start = Instant::now();
        let mut batches = 0;
        let mut sequences = 0;
        for batch in iterator.epoch() {
            batches += 1;
            sequences += batch.batch_size();
            info!("epoch {epoch} batch {batches}: {:?}", batch.shapes());
        }
        println!(
            "epoch {epoch}: {batches} batches, {sequences} sequences in {:.2?}",
            start.elapsed()
        );
    }
    Ok(())
}

/// Writes sequence data with masks of random length: `input_data`
/// `(T, B, 3)`, `targets` `(T, B, 2)`, `mask` `(T, B, 1)` and a
/// non-sequential `static_data` `(1, B, 4)`.
fn demo(out: &Path, seed: u64) -> Result<(), Box<dyn std::error::Error>> {
    const MAX_TIME: usize = 12;
    let mut rnd = RandomState::new(seed);
    let normal = Normal::new(0.0f32, 1.0)?;
    let mut writer = DataFileWriter::new().with_metadata("description", "seqfeed demo data");

    for (group, sequences) in [("training", 40), ("validation", 10)] {
        let mut random = |shape: &[usize]| -> Result<ArrayD<f32>, ndarray::ShapeError> {
            let n: usize = shape.iter().product();
            let values = (0..n).map(|_| normal.sample(rnd.rng())).collect();
            ArrayD::from_shape_vec(IxDyn(shape), values)
        };
        let input_data = random(&[MAX_TIME, sequences, 3])?;
        let targets = random(&[MAX_TIME, sequences, 2])?;
        let static_data = random(&[1, sequences, 4])?;

        let mut mask = ArrayD::<f32>::zeros(IxDyn(&[MAX_TIME, sequences, 1]));
        for b in 0..sequences {
            let len = 1 + rnd.below_or_equal(MAX_TIME - 1);
            for t in 0..len {
                mask[[t, b, 0]] = 1.0;
            }
        }

        let mut group = writer.group(group)?;
        group
            .create_dataset("input_data", input_data)?
            .create_dataset("targets", targets)?
            .create_dataset("mask", mask)?
            .create_dataset("static_data", static_data)?;
    }

    writer.write(out)?;
    println!("wrote {}", out.display());
    Ok(())
}
