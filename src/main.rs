use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use serde_json::json;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use merkle_audit::{verify_trail, Audit, AuditNode, HashAlgorithm, MerkleTree};

const RANDOM_BLOCK_SIZE: usize = 16;

#[derive(Parser)]
#[command(name = "merkle-audit")]
#[command(author, version, about = "Build a Merkle tree over data blocks and produce or check audit trails")]
struct Args {
    /// Hash function for leaves and branches
    #[arg(long, value_enum, default_value_t = Algorithm::Sha3_256, global = true)]
    hash: Algorithm,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    #[value(name = "sha3-256")]
    Sha3_256,
    #[value(name = "sha3-512")]
    Sha3_512,
    Keccak256,
}

impl From<Algorithm> for HashAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha3_256 => HashAlgorithm::Sha3_256,
            Algorithm::Sha3_512 => HashAlgorithm::Sha3_512,
            Algorithm::Keccak256 => HashAlgorithm::Keccak256,
        }
    }
}

#[derive(clap::Args)]
struct Blocks {
    /// Data blocks, one leaf each, in order
    blocks: Vec<String>,

    /// Append this many random blocks after the given ones
    #[arg(short, long, default_value_t = 0)]
    random: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Print the root digest
    Root(Blocks),
    /// Print the tree sideways
    Show(Blocks),
    /// Print the audit trail of a leaf digest as JSON
    Prove {
        leaf: String,
        #[command(flatten)]
        blocks: Blocks,
    },
    /// Print the audit trail of the leaf at INDEX as JSON
    ProveIndex {
        index: usize,
        #[command(flatten)]
        blocks: Blocks,
    },
    /// Check a JSON audit trail against a root digest
    Verify {
        #[arg(long)]
        root: String,
        #[arg(long)]
        leaf: String,
        /// JSON array as printed by `prove`
        #[arg(long)]
        trail: String,
    },
}

fn main() -> Result<()> {
    // RUST_LOG=merkle_audit=debug for rebuild and audit details
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("merkle_audit=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let algorithm = HashAlgorithm::from(args.hash);

    match args.command {
        Command::Root(blocks) => {
            let tree = build_tree(algorithm, blocks)?;
            println!("{}", tree.root_hash()?);
        }
        Command::Show(blocks) => {
            let tree = build_tree(algorithm, blocks)?;
            print!("{tree}");
        }
        Command::Prove { leaf, blocks } => {
            let tree = build_tree(algorithm, blocks)?;
            print_audit(&tree, &leaf)?;
        }
        Command::ProveIndex { index, blocks } => {
            let tree = build_tree(algorithm, blocks)?;
            let leaf = match tree.leaves().get(index) {
                Some(leaf) => leaf.digest().to_owned(),
                None => bail!("No leaf at index {} (tree has {} leaves)", index, tree.len()),
            };
            print_audit(&tree, &leaf)?;
        }
        Command::Verify { root, leaf, trail } => {
            let trail: Vec<AuditNode> =
                serde_json::from_str(&trail).context("Audit trail is not a JSON array of steps")?;
            if verify_trail(&algorithm, &trail, &leaf, &root)? {
                println!("OK");
            } else {
                println!("MISMATCH");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn build_tree(algorithm: HashAlgorithm, blocks: Blocks) -> Result<MerkleTree<HashAlgorithm>> {
    let mut data: Vec<Vec<u8>> = blocks.blocks.into_iter().map(String::into_bytes).collect();

    let mut rng = rand::thread_rng();
    for _ in 0..blocks.random {
        let block: [u8; RANDOM_BLOCK_SIZE] = rng.gen();
        data.push(block.to_vec());
    }
    debug!(blocks = data.len(), random = blocks.random, "collected data blocks");

    if data.is_empty() {
        bail!("No data blocks given");
    }
    Ok(MerkleTree::from_data(algorithm, data)?)
}

fn print_audit(tree: &MerkleTree<HashAlgorithm>, leaf: &str) -> Result<()> {
    let trail = match tree.audit(leaf)? {
        Audit::Trail(trail) => trail,
        Audit::Root => {
            warn!("{} is the only leaf, its digest is the root", leaf);
            Vec::new()
        }
        Audit::NotFound => bail!("Leaf {} is not in the tree", leaf),
    };

    let out = json!({
        "root": tree.root_hash()?,
        "leaf": leaf,
        "trail": trail,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
