use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use diffexpr::{
    ChromId, CollectorConfig, CountMatrixBuilder, CoverageCollector, Feature, FeatureKind,
    Mapping, MappingBatch, Strand, TrackId,
};

#[derive(Parser, Debug)]
#[command(
    name = "diffexpr",
    about = "Coverage counting over annotated features for differential-expression prep"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count per-feature coverage for one or more tracks and print the
    /// feature×track matrix as TSV.
    Count {
        /// Feature table: `<chrom>\t<locus>\t<start>\t<stop>\t<strand>\t<kind>` per line.
        features: PathBuf,
        /// One mapping table per track: `<chrom>\t<start>\t<stop>\t<strand>\t<replicates>` per line.
        #[arg(required = true)]
        tracks: Vec<PathBuf>,
        /// Bases the counting window extends upstream of each feature start.
        #[arg(long, default_value_t = 0)]
        upstream: u64,
        /// Bases the counting window extends downstream of each feature stop.
        #[arg(long, default_value_t = 0)]
        downstream: u64,
        /// Count mappings regardless of strand.
        #[arg(long)]
        ignore_strand: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Count {
            features,
            tracks,
            upstream,
            downstream,
            ignore_strand,
        } => run_count(features, tracks, upstream, downstream, ignore_strand),
    }
}

fn run_count(
    features_path: PathBuf,
    track_paths: Vec<PathBuf>,
    upstream: u64,
    downstream: u64,
    ignore_strand: bool,
) -> Result<()> {
    let features = read_features(&features_path)
        .with_context(|| format!("failed to read features from {}", features_path.display()))?;
    let config = CollectorConfig {
        upstream_offset: upstream,
        downstream_offset: downstream,
        require_strand_match: !ignore_strand,
    };

    let mut builder = CountMatrixBuilder::new(&features);
    for (idx, path) in track_paths.iter().enumerate() {
        let batches = read_mappings(path)
            .with_context(|| format!("failed to read mappings from {}", path.display()))?;
        let mut collector = CoverageCollector::new(&features, config);
        for batch in batches {
            collector.accept(batch);
        }
        builder
            .add_track(TrackId(idx as u32 + 1), &collector.into_counts())
            .context("matrix assembly failed")?;
    }

    print!("{}", builder.build().to_tsv());
    Ok(())
}

fn read_features(path: &PathBuf) -> Result<Vec<Feature>> {
    let reader = BufReader::new(File::open(path)?);
    let mut features = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 6 {
            bail!("feature line {} has {} fields, expected 6", idx + 1, fields.len());
        }
        features.push(Feature::new(
            idx as u64 + 1,
            fields[1],
            parse_coord(fields[2], idx)?,
            parse_coord(fields[3], idx)?,
            parse_strand(fields[4], idx)?,
            parse_chrom(fields[0], idx)?,
            parse_kind(fields[5], idx)?,
        ));
    }
    Ok(features)
}

fn read_mappings(path: &PathBuf) -> Result<Vec<MappingBatch>> {
    let reader = BufReader::new(File::open(path)?);
    let mut per_chrom: BTreeMap<u32, Vec<Mapping>> = BTreeMap::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 5 {
            bail!("mapping line {} has {} fields, expected 5", idx + 1, fields.len());
        }
        let chrom = parse_chrom(fields[0], idx)?;
        per_chrom.entry(chrom.0).or_default().push(Mapping::new(
            parse_coord(fields[1], idx)?,
            parse_coord(fields[2], idx)?,
            parse_strand(fields[3], idx)?,
            fields[4]
                .parse()
                .with_context(|| format!("bad replicate count on line {}", idx + 1))?,
        ));
    }
    Ok(per_chrom
        .into_iter()
        .map(|(chrom, mappings)| MappingBatch::new(ChromId(chrom), mappings))
        .collect())
}

fn parse_coord(field: &str, idx: usize) -> Result<u64> {
    field
        .parse()
        .with_context(|| format!("bad coordinate '{}' on line {}", field, idx + 1))
}

fn parse_chrom(field: &str, idx: usize) -> Result<ChromId> {
    let digits = field.trim_start_matches(|c: char| !c.is_ascii_digit());
    let number: u32 = digits
        .parse()
        .with_context(|| format!("bad chromosome '{}' on line {}", field, idx + 1))?;
    Ok(ChromId(number))
}

fn parse_strand(field: &str, idx: usize) -> Result<Strand> {
    match field {
        "+" => Ok(Strand::Forward),
        "-" => Ok(Strand::Reverse),
        other => bail!("bad strand '{}' on line {}", other, idx + 1),
    }
}

fn parse_kind(field: &str, idx: usize) -> Result<FeatureKind> {
    match field.to_ascii_lowercase().as_str() {
        "gene" => Ok(FeatureKind::Gene),
        "cds" => Ok(FeatureKind::Cds),
        "mrna" => Ok(FeatureKind::MRna),
        "rrna" => Ok(FeatureKind::RRna),
        "trna" => Ok(FeatureKind::TRna),
        "ncrna" => Ok(FeatureKind::NcRna),
        "other" => Ok(FeatureKind::Other),
        other => bail!("bad feature kind '{}' on line {}", other, idx + 1),
    }
}
