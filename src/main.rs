use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

use a3mfold::config::SearchConfig;
use a3mfold::fold_input::AssemblerConfig;
use a3mfold::pipeline::{self, RunOptions};
use a3mfold::search::ColabFoldSearch;

/// a3mfold - Turn ColabFold MSA search output into fold-input documents
///
/// Runs the MSA search for every protein chain of a fold-input JSON, splits
/// each alignment into pairable and non-pairable hits, and writes the
/// document back with pairedMsa/unpairedMsa filled in.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[clap(long = "quiet", global = true)]
    quiet: bool,

    /// Number of threads for per-file processing
    #[clap(short = 't', long = "threads", default_value = "8", global = true)]
    threads: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search, partition and assemble in one go
    Run {
        /// Fold-input JSON document
        #[clap(long = "input-json")]
        input_json: PathBuf,

        /// Directory for the assembled document
        #[clap(long = "output-json-dir")]
        output_json_dir: PathBuf,

        /// Directory for search output and per-query partitions
        #[clap(long = "output-msa-dir")]
        output_msa_dir: PathBuf,

        /// Search configuration (YAML)
        #[clap(long = "msa-config", default_value = "scripts/msa_config.yaml")]
        msa_config: PathBuf,

        /// Inject taxonomy IDs into primary-database hits (forced on for multimers)
        #[clap(long = "add-toxid")]
        add_toxid: bool,

        #[clap(flatten)]
        subsets: SubsetArgs,
    },

    /// Partition an existing search output directory
    Partition {
        /// Directory holding the search output (*.a3m, uniref_tax.m8)
        #[clap(long = "msa-dir")]
        msa_dir: PathBuf,

        /// Inject taxonomy IDs from uniref_tax.m8 before partitioning
        #[clap(long = "add-toxid")]
        add_toxid: bool,
    },

    /// Assemble the fold-input document from a partitioned directory
    Assemble {
        /// Fold-input JSON document
        #[clap(long = "input-json")]
        input_json: PathBuf,

        /// Partitioned directory containing msa_chain_seq.json
        #[clap(long = "msa-dir")]
        msa_dir: PathBuf,

        /// Directory for the assembled document
        #[clap(long = "output-json-dir")]
        output_json_dir: PathBuf,

        #[clap(flatten)]
        subsets: SubsetArgs,
    },
}

#[derive(clap::Args, Debug)]
struct SubsetArgs {
    /// Subsets concatenated into unpairedMsa [default: uniref100,mmseqs_other]
    #[clap(long = "unpaired-db", value_delimiter = ',')]
    unpaired_db: Option<Vec<String>>,

    /// Subsets concatenated into pairedMsa [default: uniref100]
    #[clap(long = "paired-db", value_delimiter = ',')]
    paired_db: Option<Vec<String>>,
}

impl SubsetArgs {
    fn into_config(self) -> AssemblerConfig {
        let defaults = AssemblerConfig::default();
        AssemblerConfig {
            unpaired_subsets: self.unpaired_db.unwrap_or(defaults.unpaired_subsets),
            paired_subsets: self.paired_db.unwrap_or(defaults.paired_subsets),
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    // Set up rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    match args.command {
        Commands::Run {
            input_json,
            output_json_dir,
            output_msa_dir,
            msa_config,
            add_toxid,
            subsets,
        } => {
            let config = SearchConfig::load(&msa_config)?;
            let search = ColabFoldSearch::new(config);
            let options = RunOptions {
                input_json,
                output_json_dir,
                output_msa_dir,
                add_toxid,
                assembler: subsets.into_config(),
            };
            pipeline::run(&options, &search)?;
        }
        Commands::Partition { msa_dir, add_toxid } => {
            pipeline::partition_search_output(&msa_dir, add_toxid)?;
        }
        Commands::Assemble {
            input_json,
            msa_dir,
            output_json_dir,
            subsets,
        } => {
            pipeline::assemble_document(
                &input_json,
                &msa_dir,
                &output_json_dir,
                &subsets.into_config(),
            )?;
        }
    }

    Ok(())
}
