use clap::Parser;
use flint_arb::{
    Arf, ConstantCache, DEFAULT_PARAMS, ExpEvaluator, ExpParams, strategy::choose_strategy,
};
use log::info;

#[derive(Parser)]
struct Args {
    /// The argument: a decimal, an integer, `m*2^e`, `inf`, `-inf` or `nan`.
    x: Arf,

    /// Precision in bits.
    #[arg(long, default_value_t = 53)]
    prec: u64,

    /// Compute `exp(x) - 1`.
    #[arg(long)]
    minus_one: bool,

    /// Arguments with `|x| >= 2^maglim` overflow. Defaults to `max(128, 2 prec)`.
    #[arg(long)]
    maglim: Option<i64>,

    /// Number of workers for binary splitting.
    #[arg(long)]
    threads: Option<usize>,

    /// Never reduce by log 2 and log 3.
    #[arg(long)]
    no_log_reduction: bool,

    /// Print the engine thresholds as JSON.
    #[arg(long)]
    show_params: bool,
}

/// Example command:
/// cargo run --bin exp_eval -- 1 --prec 200
fn main() {
    env_logger::init();

    let args = Args::parse();

    let mut params = ExpParams {
        threads: args.threads,
        ..DEFAULT_PARAMS
    };

    if args.no_log_reduction {
        params = params.without_log_reduction();
    }

    if args.show_params {
        println!(
            "{}",
            serde_json::to_string_pretty(&params).expect("Failed to serialize params")
        );
    }

    let cache = ConstantCache::new();
    let ev = match ExpEvaluator::try_new(&cache, params) {
        Ok(ev) => ev,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let maglim = args.maglim.unwrap_or((2 * args.prec as i64).max(128));
    let strategy = choose_strategy(&args.x, args.prec, args.minus_one, maglim, &params);

    info!("strategy: {strategy:?}");

    let y = ev.exp_arf(&args.x, args.prec, args.minus_one, maglim);

    println!("{y}");
    println!("~ {:e}", y.mid().to_f64());
    println!("accurate bits: {}", y.rel_accuracy_bits());
}
