use anyhow::Context;
use clap::{Parser, Subcommand};
use dnadec::io::fasta::{read_fasta, write_fasta, FastaRecord};
use dnadec::machine::Machine;
use dnadec::mutator::MutatorParams;
use dnadec::viterbi::decode_records;
use log::info;
use std::path::{Path, PathBuf};

/// Maximum-likelihood decoder for DNA-encoded messages
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Opts {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode observed DNA sequences back into message symbols
    Decode {
        /// Transducer definition (JSON)
        #[clap(short, long)]
        machine: PathBuf,
        /// Mutation model parameters (JSON); error-free model if omitted
        #[clap(short = 'u', long)]
        mutator: Option<PathBuf>,
        /// Start and end the path at any machine state
        #[clap(short, long)]
        local: bool,
        /// Observed DNA FASTA filename
        fasta: PathBuf,
    },
    /// Run the transducer forward over message symbols
    Encode {
        /// Transducer definition (JSON)
        #[clap(short, long)]
        machine: PathBuf,
        /// Message symbol FASTA filename
        fasta: PathBuf,
    },
    /// Print a summary of a transducer definition
    Stat {
        /// Transducer definition (JSON)
        #[clap(short, long)]
        machine: PathBuf,
    },
}

fn load_machine(path: &Path) -> anyhow::Result<Machine> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading machine {}", path.display()))?;
    Machine::from_json(&text).with_context(|| format!("parsing machine {}", path.display()))
}

fn load_mutator(path: &Path) -> anyhow::Result<MutatorParams> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading mutator params {}", path.display()))?;
    MutatorParams::from_json(&text)
        .with_context(|| format!("parsing mutator params {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    match opts.command {
        Commands::Decode {
            machine,
            mutator,
            local,
            fasta,
        } => {
            let machine = load_machine(&machine)?;
            let mut params = match mutator {
                Some(path) => load_mutator(&path)?,
                None => MutatorParams::zero_error(),
            };
            if local {
                params.local = true;
            }
            let records = read_fasta(&fasta)
                .with_context(|| format!("reading FASTA {}", fasta.display()))?;
            info!("decoding {} sequences", records.len());
            let decoded = decode_records(&machine, &params, &records)?;
            write_fasta(std::io::stdout().lock(), &decoded)?;
        }
        Commands::Encode { machine, fasta } => {
            let machine = load_machine(&machine)?;
            machine.verify_contexts()?;
            let records = read_fasta(&fasta)
                .with_context(|| format!("reading FASTA {}", fasta.display()))?;
            let mut encoded = Vec::with_capacity(records.len());
            for record in &records {
                let symbols = std::str::from_utf8(&record.seq)
                    .with_context(|| format!("non-ASCII symbols in {}", record.name))?;
                let dna = machine
                    .transduce(symbols)
                    .with_context(|| format!("encoding {}", record.name))?;
                encoded.push(FastaRecord {
                    name: record.name.clone(),
                    seq: dna.into_bytes(),
                });
            }
            write_fasta(std::io::stdout().lock(), &encoded)?;
        }
        Commands::Stat { machine } => {
            let machine = load_machine(&machine)?;
            machine.verify_contexts()?;
            println!("states: {}", machine.n_states());
            println!(
                "transitions: {}",
                machine.states.iter().map(|s| s.trans.len()).sum::<usize>()
            );
            println!("input alphabet: {}", machine.input_alphabet(true, true, true));
            println!("output alphabet: {}", machine.output_alphabet());
            println!("controls: {}", machine.controls);
            println!("max left context: {}", machine.max_left_context());
        }
    }
    Ok(())
}
