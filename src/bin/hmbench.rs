//! Radius-sweep driver: load keys and queries, build the index per
//! bucket class, and report per-query timing and candidate statistics.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use hmsearch::{bvecs, proper_buckets, Error, HmIndex, LinearScan, Result, VerifyMode};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Vertical,
    Plain,
}

impl From<ModeArg> for VerifyMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Vertical => VerifyMode::Vertical,
            ModeArg::Plain => VerifyMode::Plain,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "hmbench")]
#[command(about = "Sweep Hamming radii over a bvecs workload and report query statistics")]
struct Args {
    /// bvecs file holding the keys to index
    #[arg(short, long)]
    keys: PathBuf,

    /// bvecs file holding the query workload
    #[arg(short, long)]
    queries: PathBuf,

    /// Symbols per key; longer records are truncated
    #[arg(short, long, default_value_t = 64)]
    length: u32,

    /// Alphabet size; symbols are reduced modulo this value
    #[arg(short, long, default_value_t = 256)]
    alphabet_size: u32,

    /// Radius sweep as min:max:step (also max or min:max)
    #[arg(short, long, default_value = "0:10:2")]
    ranges: String,

    /// Cross-check every result set against an exhaustive scan
    #[arg(long, default_value_t = false)]
    check: bool,

    /// Candidate verification layout
    #[arg(long, value_enum, default_value_t = ModeArg::Vertical)]
    mode: ModeArg,
}

fn parse_ranges(s: &str) -> Result<(u32, u32, u32)> {
    let parse = |f: &str| -> Result<u32> {
        f.parse()
            .map_err(|_| Error::InvalidInput(format!("invalid range string: {s}")))
    };
    let fields: Vec<&str> = s.split(':').filter(|f| !f.is_empty()).collect();
    let (min, max, step) = match fields.as_slice() {
        [max] => (0, parse(max)?, 1),
        [min, max] => (parse(min)?, parse(max)?, 1),
        [min, max, step] => (parse(min)?, parse(max)?, parse(step)?),
        _ => {
            return Err(Error::InvalidInput(format!(
                "invalid range string: {s}"
            )))
        }
    };
    if step == 0 {
        return Err(Error::InvalidInput("range step must not be 0".to_string()));
    }
    Ok((min, max, step))
}

fn check_against_scan(
    index: &HmIndex,
    scan: &LinearScan,
    queries: &[u32],
    length: u32,
    range: u32,
) -> Result<()> {
    for (j, q) in queries.chunks_exact(length as usize).enumerate() {
        let mut solutions = Vec::new();
        index.search(q, range, |id| solutions.push(id))?;
        solutions.sort_unstable();

        let mut truth = Vec::new();
        scan.search(q, range, |id| truth.push(id));

        if solutions != truth {
            return Err(Error::InvalidInput(format!(
                "query {j}: index returned {} ids, scan returned {}",
                solutions.len(),
                truth.len()
            )));
        }
    }
    println!("--> all result sets match the exhaustive scan");
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    println!("Loading keys from {}", args.keys.display());
    let (keys, num_keys) = bvecs::read_file(&args.keys, args.length, args.alphabet_size)?;
    println!("--> {num_keys} keys");

    println!("Loading queries from {}", args.queries.display());
    let (queries, num_queries) =
        bvecs::read_file(&args.queries, args.length, args.alphabet_size)?;
    println!("--> {num_queries} queries");

    if num_queries == 0 {
        return Err(Error::InvalidInput("query workload is empty".to_string()));
    }

    let (min_range, max_range, step) = parse_ranges(&args.ranges)?;
    let scan = if args.check {
        Some(LinearScan::new(&keys, args.length)?)
    } else {
        None
    };

    let mut index: Option<HmIndex> = None;

    let mut range = min_range;
    while range <= max_range {
        let buckets = proper_buckets(range);
        println!();
        println!("[analyzing] radius {range}; {buckets} buckets");

        if index.as_ref().map(HmIndex::buckets) != Some(buckets) {
            println!("Constructing index...");
            let start = Instant::now();
            let built = HmIndex::build_with_mode(
                &keys,
                args.length,
                args.alphabet_size,
                buckets,
                args.mode.into(),
            )?;
            println!("--> construction time: {:.3} sec", start.elapsed().as_secs_f64());
            let bytes = built.heap_bytes();
            println!(
                "--> memory usage: {bytes} bytes; {:.3} MiB",
                bytes as f64 / (1024.0 * 1024.0)
            );
            index = Some(built);
        }
        let index = index.as_ref().unwrap();

        if let Some(scan) = &scan {
            check_against_scan(index, scan, &queries, args.length, range)?;
        }

        println!("Searching queries...");
        let mut solutions = 0u64;
        let mut candidates = 0u64;
        let start = Instant::now();
        for q in queries.chunks_exact(args.length as usize) {
            candidates += index.search(q, range, |_| solutions += 1)?;
        }
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0 / num_queries as f64;
        println!("--> {elapsed_ms:.4} ms_per_query");
        println!(
            "--> {:.2} solutions_per_query",
            solutions as f64 / num_queries as f64
        );
        println!(
            "--> {:.2} candidates_per_query",
            candidates as f64 / num_queries as f64
        );

        range += step;
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
