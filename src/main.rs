//! semrel CLI: build, query, and serve the relatedness graph.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;

use semrel::centrality::CentralityKind;
use semrel::clustering::{self, RecursiveBisection};
use semrel::disambiguation::PipelineConfig;
use semrel::graph::snapshot;
use semrel::graph::store::StoreConfig;
use semrel::graph::GraphStore;
use semrel::ingest::{self, RdfFormat};
use semrel::relatedness::AlgorithmKind;
use semrel::server::{Server, ServerConfig};
use semrel::weights;

#[derive(Parser)]
#[command(name = "semrel", version, about = "Semantic relatedness and disambiguation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph snapshot from RDF files.
    Create {
        /// RDF input files (Turtle or N-Triples).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Snapshot path prefix to write.
        #[arg(long, short)]
        output: PathBuf,

        /// Input format; guessed from the file extension when omitted.
        #[arg(long)]
        format: Option<Format>,

        /// Skip the information-content weighting pass.
        #[arg(long)]
        no_weights: bool,

        /// Hierarchical clustering levels to compute (0 disables clustering).
        #[arg(long, default_value = "0")]
        cluster_levels: usize,
    },

    /// Compute the relatedness between two entity URIs.
    Query {
        /// Snapshot path prefix to load.
        #[arg(long, short)]
        graph: PathBuf,

        from: String,
        to: String,

        #[arg(long, value_enum, default_value = "shortest-path")]
        algorithm: AlgorithmKind,

        /// Maximum path length in edges.
        #[arg(long, default_value = "2")]
        max_dist: usize,
    },

    /// Serve disambiguation requests over TCP.
    Serve {
        /// Snapshot path prefix to load.
        #[arg(long, short)]
        graph: PathBuf,

        #[arg(long, default_value = "127.0.0.1:8382")]
        addr: String,

        /// Worker threads per connection.
        #[arg(long, default_value = "4")]
        threads: usize,

        /// Default term window and hop bound.
        #[arg(long, default_value = "2")]
        max_dist: usize,

        #[arg(long, value_enum, default_value = "shortest-path")]
        algorithm: AlgorithmKind,

        #[arg(long, value_enum, default_value = "degree")]
        centrality: CentralityKind,
    },

    /// Show snapshot statistics.
    Info {
        /// Snapshot path prefix to load.
        #[arg(long, short)]
        graph: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Format {
    Turtle,
    Ntriples,
}

impl From<Format> for RdfFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Turtle => RdfFormat::Turtle,
            Format::Ntriples => RdfFormat::NTriples,
        }
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            files,
            output,
            format,
            no_weights,
            cluster_levels,
        } => {
            let store = GraphStore::new(StoreConfig::default());
            let stats = ingest::ingest_files(&store, &files, format.map(Into::into))
                .map_err(semrel::SemrelError::from)?;
            println!(
                "Parsed {} triples into {} vertices and {} edges ({} skipped)",
                stats.triples,
                store.vertex_count(),
                store.edge_count(),
                stats.skipped
            );

            if !no_weights {
                let w = weights::compute_combi_weights(&store)
                    .map_err(semrel::SemrelError::from)?;
                println!("Weighted {} of {} edges", w.weighted, w.edges);
            }
            if cluster_levels > 0 {
                let c = clustering::compute_clusters(&store, &RecursiveBisection, cluster_levels);
                println!("Clustered {} vertices into {} levels", c.vertices, c.levels);
            }

            snapshot::dump(&store, &output)?;
            println!("Snapshot written to {}", output.display());
        }

        Commands::Query {
            graph,
            from,
            to,
            algorithm,
            max_dist,
        } => {
            let store = Arc::new(snapshot::restore(&graph)?);
            if algorithm == AlgorithmKind::Cluster {
                store
                    .topology()
                    .require_clusters()
                    .map(|_| ())
                    .map_err(semrel::SemrelError::from)?;
            }
            let mut alg = algorithm.instantiate(store, max_dist);
            let score = alg.relatedness(&from, &to);
            println!("{score}");
        }

        Commands::Serve {
            graph,
            addr,
            threads,
            max_dist,
            algorithm,
            centrality,
        } => {
            let store = Arc::new(snapshot::restore(&graph)?);
            if algorithm == AlgorithmKind::Cluster {
                store
                    .topology()
                    .require_clusters()
                    .map(|_| ())
                    .map_err(semrel::SemrelError::from)?;
            }
            let config = ServerConfig {
                addr,
                pool_threads: threads,
                pipeline: PipelineConfig {
                    max_dist,
                    relatedness: algorithm,
                    centrality,
                },
                ..ServerConfig::default()
            };
            let server = Server::bind(store, config).map_err(semrel::SemrelError::from)?;
            server.run().map_err(semrel::SemrelError::from)?;
        }

        Commands::Info { graph } => {
            let store = snapshot::restore(&graph)?;
            let topo = store.topology();
            println!("vertices: {}", store.vertex_count());
            println!("edges:    {}", topo.edge_count());
            println!("weights:  {}", if topo.has_weights() { "yes" } else { "no" });
            match topo.clusters() {
                Some(table) => println!("clusters: {} levels", table.levels()),
                None => println!("clusters: no"),
            }
        }
    }

    Ok(())
}
