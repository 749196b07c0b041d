use clap::{Parser, Subcommand};
use olapcube::core::digest::file_sha256;
use olapcube::{
    execute_query, CategoryMapping, ConnectorRegistry, Cube, CubeConfig, DimensionHierarchy,
    Operation, PipelineSpec, ProofInput, QueryOptions,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "olapcube")]
#[command(version)]
#[command(about = "OLAP filter/slice/roll-up over categorical-encoded matrices", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./olapcube.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline over a dataset and write the decoded result
    Query {
        /// Dataset file (CSV)
        #[arg(long)]
        data: PathBuf,
        /// Dimension hierarchy descriptor (JSON)
        #[arg(long)]
        hierarchy: PathBuf,
        /// Pipeline specification (JSON array of steps)
        #[arg(long)]
        pipeline: PathBuf,
        /// Result file; defaults to <output dir>/<prefix><data file name>
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write the proof-generator input document
        #[arg(long)]
        witness: bool,
        /// Keep rows zeroed by filters in the result
        #[arg(long)]
        keep_zero_rows: bool,
    },
    /// Encode a dataset and write its category mapping
    Encode {
        #[arg(long)]
        data: PathBuf,
        /// Reuse an existing mapping instead of computing one
        #[arg(long)]
        mapping: Option<PathBuf>,
        /// Where to write the encoded table
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Decode an encoded dataset back to labels
    Decode {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        mapping: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the SHA-256 fingerprint of a dataset file
    Hash {
        #[arg(long)]
        data: PathBuf,
    },
    /// Print the column indices a slice or roll-up would remove
    Resolve {
        #[arg(long)]
        hierarchy: PathBuf,
        /// Hierarchies to slice away
        #[arg(long = "slice")]
        slices: Vec<String>,
        /// Roll-up targets as HIERARCHY:LEVEL
        #[arg(long = "rollup")]
        rollups: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CubeConfig::load_from(path),
        None => CubeConfig::load(),
    };
    let connectors = ConnectorRegistry::with_defaults(config.query.infer_rows);

    match cli.command {
        Commands::Query {
            data,
            hierarchy,
            pipeline,
            output,
            witness,
            keep_zero_rows,
        } => {
            let hierarchy = DimensionHierarchy::load(&hierarchy)?;
            let spec = PipelineSpec::load(&pipeline)?;

            let mut table = connectors.find_connector(&data)?.read_table(&data)?;
            let dropped = table.drop_null_rows();
            if dropped > 0 {
                info!(dropped, "dropped rows with missing values");
            }

            let cube = Cube::new(table)?;
            let mut options = QueryOptions::from(&config.query);
            if keep_zero_rows {
                options.drop_zero_rows = false;
            }
            let result = execute_query(&cube, &hierarchy, &spec, &options)?;

            fs::create_dir_all(&config.output.dir)?;
            cube.mapping().save(config.mapping_path())?;
            if witness {
                ProofInput::new(&result.input, &result.output).save(config.witness_path())?;
                info!(path = %config.witness_path().display(), "wrote witness");
            }

            let output = output.unwrap_or_else(|| config.result_path(&data));
            write_result(&connectors, &output, &result.table)?;
            println!(
                "Query result saved to {} ({} rows, columns: {})",
                output.display(),
                result.table.row_count(),
                result.kept_column_names().join(", ")
            );
            println!("Input matrix hash:  {}", result.input.data_hash());
            println!("Output matrix hash: {}", result.output.data_hash());
        }
        Commands::Encode {
            data,
            mapping,
            output,
        } => {
            let mut table = connectors.find_connector(&data)?.read_table(&data)?;
            table.drop_null_rows();
            let cube = match mapping {
                Some(path) => Cube::with_mapping(table, CategoryMapping::load(path)?)?,
                None => Cube::new(table)?,
            };
            let matrix = cube.to_matrix()?;

            fs::create_dir_all(&config.output.dir)?;
            cube.mapping().save(config.mapping_path())?;
            println!("Category mapping saved to {}", config.mapping_path().display());

            if let Some(output) = output {
                write_result(&connectors, &output, &cube.encoded_table()?)?;
                println!("Encoded table saved to {}", output.display());
            }
            info!(
                rows = matrix.row_count(),
                columns = matrix.column_count(),
                hash = matrix.data_hash(),
                "encoded dataset"
            );
        }
        Commands::Decode {
            data,
            mapping,
            output,
        } => {
            let table = connectors.find_connector(&data)?.read_table(&data)?;
            let names: Vec<String> = table.schema().names().iter().map(|n| n.to_string()).collect();
            let mapping = CategoryMapping::load(mapping)?.restrict(&names);
            let cube = Cube::with_mapping(table, mapping)?;
            let decoded = cube.decode(&cube.to_matrix()?)?;
            write_result(&connectors, &output, &decoded)?;
            println!("Decoded table saved to {}", output.display());
        }
        Commands::Hash { data } => {
            println!("{}", file_sha256(&data)?);
        }
        Commands::Resolve {
            hierarchy,
            slices,
            rollups,
        } => {
            let hierarchy = DimensionHierarchy::load(&hierarchy)?;
            let pairs = rollups
                .iter()
                .map(|r| {
                    r.split_once(':')
                        .map(|(h, l)| (h.trim().to_string(), l.trim().to_string()))
                        .ok_or_else(|| format!("Expected HIERARCHY:LEVEL, got '{}'", r))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let removal = olapcube::union_indices([
                hierarchy.slice_by_hierarchy(&slices)?,
                hierarchy.roll_up_to_level(&pairs)?,
            ]);
            println!("{}", Operation::slice(removal));
        }
    }

    Ok(())
}

fn write_result(
    connectors: &ConnectorRegistry,
    path: &Path,
    table: &olapcube::Table,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    connectors.find_connector(path)?.write_table(path, table)?;
    Ok(())
}
