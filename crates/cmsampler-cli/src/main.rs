use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use cmsampler_core::{CmError, ErrorInfo, NodeId};
use cmsampler_graph::{GraphState, LabelIndex, LabelRecord};
use cmsampler_mcmc::{
    chain_seed, run_chains, Algorithm, ChainJob, ChainOutcome, OutputConfig, RunConfig,
    SamplerVariant, TerminationMode,
};
use serde::Serialize;

mod io;

use io::{read_graph_tsv, read_labels_tsv, write_edges_tsv};

#[derive(Parser, Debug)]
#[command(name = "cmsampler", about = "Configuration Model graph sampler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs D independent chains and writes one sampled edge list per chain.
    Sample(SampleArgs),
    /// Runs a convergence telemetry sweep and writes the four telemetry files.
    Converge(ConvergeArgs),
    /// Repeats a sampling run across a list of label files.
    LabelScalability(LabelScalabilityArgs),
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AlgorithmArg {
    Cm,
    La,
    Lw,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(value: AlgorithmArg) -> Self {
        match value {
            AlgorithmArg::Cm => Algorithm::Cm,
            AlgorithmArg::La => Algorithm::La,
            AlgorithmArg::Lw => Algorithm::Lw,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct CommonArgs {
    /// Base name of the graph, e.g. `<data-dir>/<graph-name>.tsv`.
    #[arg(long = "graph-name")]
    graph_name: String,
    /// Directory containing the graph and label TSVs.
    #[arg(long = "data-dir")]
    data_dir: PathBuf,
    /// Root path artefacts are written under (`<base-path>/out/`).
    #[arg(long = "base-path")]
    base_path: PathBuf,
    /// Optional YAML configuration, layered under CLI flag overrides.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sampler variant.
    #[arg(long)]
    algorithm: Option<AlgorithmArg>,
    /// Maximum number of OS threads used by the parallel driver.
    #[arg(long = "num-workers")]
    num_workers: Option<usize>,
    /// Whether the swap budget counts accepted swaps rather than proposals.
    #[arg(long = "actual-swaps")]
    actual_swaps: Option<bool>,
    /// Master seed; chain seeds are derived deterministically from it.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct SampleArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Number of independent chains, `D`.
    #[arg(long = "num-samples")]
    num_samples: Option<usize>,
    /// Swap budget per chain; `-1` means `floor(m * ln(m))`.
    #[arg(long = "num-swaps")]
    num_swaps: Option<i64>,
}

#[derive(ClapArgs, Debug)]
struct ConvergeArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Number of parallel chains for the convergence sweep.
    #[arg(long = "D")]
    d: Option<usize>,
    /// Convergence-run multiplier: `num_swaps = floor(mul_fact * m)`.
    #[arg(long = "mul-fact")]
    mul_fact: Option<f64>,
    /// Telemetry snapshot interval as a fraction of `m`.
    #[arg(long)]
    perc: Option<f64>,
}

#[derive(ClapArgs, Debug)]
struct LabelScalabilityArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Number of independent chains, `D`.
    #[arg(long = "num-samples")]
    num_samples: Option<usize>,
    /// Swap budget per chain; `-1` means `floor(m * ln(m))`.
    #[arg(long = "num-swaps")]
    num_swaps: Option<i64>,
    /// Comma-separated label identifiers, each sweeping
    /// `<graph-name>_<Li>_labels.tsv`.
    #[arg(long = "label-list", value_delimiter = ',')]
    label_list: Vec<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Sample(args) => run_sample(args),
        Command::Converge(args) => run_converge(args),
        Command::LabelScalability(args) => run_label_scalability(args),
    }
}

fn load_config(common: &CommonArgs) -> Result<RunConfig, Box<dyn Error>> {
    let mut config = match &common.config {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)?
        }
        None => RunConfig::default(),
    };
    if let Some(algorithm) = common.algorithm {
        config.algorithm = algorithm.into();
    }
    if let Some(num_workers) = common.num_workers {
        config.num_workers = num_workers;
    }
    if let Some(actual_swaps) = common.actual_swaps {
        config.actual_swaps = actual_swaps;
    }
    if let Some(seed) = common.seed {
        config.seed = seed;
    }
    config.output = OutputConfig {
        base_path: Some(common.base_path.clone()),
        data_dir: Some(common.data_dir.clone()),
    };
    if config.num_workers == 0 {
        return Err(config_error("num-workers must be positive", "num_workers"));
    }
    Ok(config)
}

fn config_error(message: &str, field: &str) -> Box<dyn Error> {
    Box::new(CmError::Config(
        ErrorInfo::new("invalid-config", message).with_context("field", field),
    ))
}

fn graph_path(data_dir: &Path, graph_name: &str) -> PathBuf {
    data_dir.join(format!("{graph_name}.tsv"))
}

fn labels_path(data_dir: &Path, graph_name: &str) -> PathBuf {
    data_dir.join(format!("{graph_name}_labels.tsv"))
}

fn scoped_labels_path(data_dir: &Path, graph_name: &str, label_id: &str) -> PathBuf {
    data_dir.join(format!("{graph_name}_{label_id}_labels.tsv"))
}

fn load_graph_and_labels(
    data_dir: &Path,
    graph_name: &str,
    labels_file: &Path,
) -> Result<(Vec<(NodeId, NodeId)>, Vec<u32>, Vec<LabelRecord>), Box<dyn Error>> {
    let (edges, degrees) = read_graph_tsv(&graph_path(data_dir, graph_name))?;
    let records = read_labels_tsv(labels_file, degrees.len())?;
    Ok((edges, degrees, records))
}

fn build_variant(algorithm: Algorithm, labels: &LabelIndex) -> SamplerVariant {
    match algorithm {
        Algorithm::Cm => SamplerVariant::Cm,
        Algorithm::La => SamplerVariant::La,
        Algorithm::Lw => SamplerVariant::lw_from_observed(labels),
    }
}

fn mode_from(actual_swaps: bool) -> TerminationMode {
    if actual_swaps {
        TerminationMode::ActualSwaps
    } else {
        TerminationMode::ProposalCount
    }
}

fn build_jobs(
    config: &RunConfig,
    state: &GraphState,
    labels: &LabelIndex,
    variant: &SamplerVariant,
    swaps_budget: usize,
    snapshot_interval: usize,
) -> Vec<ChainJob> {
    (0..config.num_samples)
        .map(|chain_id| ChainJob {
            chain_id,
            state: state.clone(),
            labels: labels.clone(),
            variant: variant.clone(),
            swaps_budget,
            mode: mode_from(config.actual_swaps),
            snapshot_interval,
            seed: chain_seed(config.seed, chain_id),
        })
        .collect()
}

fn edge_list_filename(
    graph_name: &str,
    algorithm: Algorithm,
    swaps_budget: usize,
    runtime_ns: u128,
    seed: u64,
    actual_swaps: bool,
) -> String {
    format!(
        "{graph_name}__sampler_{algorithm}__swaps_{swaps_budget}__runtime_{runtime_ns}__seed_{seed}__actualswaps_{actual_swaps}.tsv"
    )
}

fn out_dir(base_path: &Path) -> PathBuf {
    base_path.join("out")
}

fn write_sample_outputs(
    out_dir: &Path,
    graph_name: &str,
    algorithm: Algorithm,
    swaps_budget: usize,
    master_seed: u64,
    actual_swaps: bool,
    outcomes: &[ChainOutcome],
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(out_dir)?;
    for outcome in outcomes {
        let seed = chain_seed(master_seed, outcome.chain_id);
        let filename = edge_list_filename(
            graph_name,
            algorithm,
            swaps_budget,
            outcome.telemetry.stats.total_ns,
            seed,
            actual_swaps,
        );
        write_edges_tsv(&out_dir.join(filename), outcome.final_state.edges())?;
        println!(
            "chain {}: {} swaps accepted, acceptance ratio {:.4}",
            outcome.chain_id,
            outcome.telemetry.stats.num_swaps,
            outcome.telemetry.stats.acceptance_ratio,
        );
    }
    Ok(())
}

fn run_sample(args: SampleArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(&args.common)?;
    if let Some(num_samples) = args.num_samples {
        config.num_samples = num_samples;
    }
    if let Some(num_swaps) = args.num_swaps {
        config.num_swaps = num_swaps;
    }
    if config.num_samples == 0 {
        return Err(config_error("num-samples must be positive", "num_samples"));
    }

    let labels_file = labels_path(&args.common.data_dir, &args.common.graph_name);
    let (edges, degrees, records) =
        load_graph_and_labels(&args.common.data_dir, &args.common.graph_name, &labels_file)?;
    let state = GraphState::new(edges.clone(), degrees)?;
    let labels = LabelIndex::new(records, &edges)?;
    let variant = build_variant(config.algorithm, &labels);

    let swaps_budget = config.resolve_swaps_budget(state.num_edges());
    let snapshot_interval = config.resolve_snapshot_interval(state.num_edges());
    let jobs = build_jobs(&config, &state, &labels, &variant, swaps_budget, snapshot_interval);

    println!(
        "sampling {} chain(s) of {} via {} on {} nodes / {} edges",
        config.num_samples,
        swaps_budget,
        config.algorithm,
        state.num_nodes(),
        state.num_edges(),
    );
    let outcomes = run_chains(jobs, config.num_workers);
    write_sample_outputs(
        &out_dir(&args.common.base_path),
        &args.common.graph_name,
        config.algorithm,
        swaps_budget,
        config.seed,
        config.actual_swaps,
        &outcomes,
    )?;
    println!("wrote {} sampled edge list(s)", outcomes.len());
    Ok(())
}

fn run_converge(args: ConvergeArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(&args.common)?;
    if let Some(d) = args.d {
        config.num_samples = d;
    }
    if let Some(mul_fact) = args.mul_fact {
        config.mul_fact = mul_fact;
    }
    if let Some(perc) = args.perc {
        config.perc = perc;
    }
    if config.num_samples == 0 {
        return Err(config_error("D must be positive", "num_samples"));
    }

    let labels_file = labels_path(&args.common.data_dir, &args.common.graph_name);
    let (edges, degrees, records) =
        load_graph_and_labels(&args.common.data_dir, &args.common.graph_name, &labels_file)?;
    let state = GraphState::new(edges.clone(), degrees)?;
    let labels = LabelIndex::new(records, &edges)?;
    let variant = build_variant(config.algorithm, &labels);

    let swaps_budget = config.resolve_convergence_swaps(state.num_edges());
    let snapshot_interval = config.resolve_snapshot_interval(state.num_edges());
    let jobs = build_jobs(&config, &state, &labels, &variant, swaps_budget, snapshot_interval);

    println!(
        "convergence run: {} chain(s) of {} via {}",
        config.num_samples, swaps_budget, config.algorithm
    );
    let outcomes = run_chains(jobs, config.num_workers);

    let base = format!(
        "{}__sampler_{}__swaps_{}__seed_{}__actualswaps_{}",
        args.common.graph_name, config.algorithm, swaps_budget, config.seed, config.actual_swaps
    );
    write_telemetry(&out_dir(&args.common.base_path), &base, &outcomes)?;
    println!("wrote telemetry for {} chain(s)", outcomes.len());
    Ok(())
}

fn run_label_scalability(args: LabelScalabilityArgs) -> Result<(), Box<dyn Error>> {
    if args.label_list.is_empty() {
        return Err(config_error(
            "label-list must name at least one label file",
            "label_list",
        ));
    }
    let mut config = load_config(&args.common)?;
    if let Some(num_samples) = args.num_samples {
        config.num_samples = num_samples;
    }
    if let Some(num_swaps) = args.num_swaps {
        config.num_swaps = num_swaps;
    }

    let (edges, degrees) =
        read_graph_tsv(&graph_path(&args.common.data_dir, &args.common.graph_name))?;
    let out = out_dir(&args.common.base_path);
    fs::create_dir_all(&out)?;

    for label_id in &args.label_list {
        let labels_file =
            scoped_labels_path(&args.common.data_dir, &args.common.graph_name, label_id);
        let records = read_labels_tsv(&labels_file, degrees.len())?;
        let state = GraphState::new(edges.clone(), degrees.clone())?;
        let labels = LabelIndex::new(records, &edges)?;
        let variant = build_variant(config.algorithm, &labels);

        let swaps_budget = config.resolve_swaps_budget(state.num_edges());
        let snapshot_interval = config.resolve_snapshot_interval(state.num_edges());
        let jobs = build_jobs(&config, &state, &labels, &variant, swaps_budget, snapshot_interval);

        println!(
            "label-scalability[{label_id}]: {} chain(s) of {}",
            config.num_samples, swaps_budget
        );
        let outcomes = run_chains(jobs, config.num_workers);
        let graph_name = format!("{}__label_{}", args.common.graph_name, label_id);
        write_sample_outputs(
            &out,
            &graph_name,
            config.algorithm,
            swaps_budget,
            config.seed,
            config.actual_swaps,
            &outcomes,
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct ChainVecRecord<'a> {
    chain_id: usize,
    values: &'a [f64],
}

#[derive(Serialize)]
struct ChainBucketsRecord<'a> {
    chain_id: usize,
    accepted: &'a BTreeMap<String, u64>,
    rejected: &'a BTreeMap<String, u64>,
}

fn write_jsonl<T: Serialize>(
    path: &Path,
    records: impl Iterator<Item = T>,
) -> Result<(), Box<dyn Error>> {
    use std::io::Write;
    let mut file = fs::File::create(path)?;
    for record in records {
        serde_json::to_writer(&mut file, &record)?;
        writeln!(file)?;
    }
    Ok(())
}

fn write_telemetry(
    out_dir: &Path,
    base: &str,
    outcomes: &[ChainOutcome],
) -> Result<(), Box<dyn Error>> {
    write_jsonl(
        &out_dir.join(format!("assortativities__{base}")),
        outcomes.iter().map(|o| ChainVecRecord {
            chain_id: o.chain_id,
            values: &o.telemetry.assortativities,
        }),
    )?;
    write_jsonl(
        &out_dir.join(format!("perturbations__{base}")),
        outcomes.iter().map(|o| ChainVecRecord {
            chain_id: o.chain_id,
            values: &o.telemetry.perturbations,
        }),
    )?;
    write_jsonl(
        &out_dir.join(format!("acceptance__{base}")),
        outcomes.iter().map(|o| ChainBucketsRecord {
            chain_id: o.chain_id,
            accepted: &o.telemetry.prob_buckets.accepted,
            rejected: &o.telemetry.prob_buckets.rejected,
        }),
    )?;
    write_jsonl(
        &out_dir.join(format!("stats__{base}")),
        outcomes.iter().map(|o| &o.telemetry.stats),
    )?;
    Ok(())
}
