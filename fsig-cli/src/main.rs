use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::collections::hash_map::{Entry, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use fsig_core::algorithm::HashAlgorithm;
use fsig_core::hashing::{DigestOptions, DEFAULT_CHUNK_SIZE};
use fsig_core::localize::FluentLoc;
use fsig_core::path_safety::{lexical_key, PathPolicy};
use fsig_core::record::{records_equal_checked, FileRecord};
use fsig_core::search::find_matching;
use fsig_core::store::{load_signature, SidecarConvention, SignatureStore};
use fsig_core::verify::{verify_batch, Status};
use fsig_core::SignatureError;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Convention { Signature, Metadata }

impl From<Convention> for SidecarConvention {
    fn from(c: Convention) -> Self {
        match c { Convention::Signature => SidecarConvention::Signature, Convention::Metadata => SidecarConvention::Metadata }
    }
}

#[derive(Parser)]
#[command(name="fsig", version, about="Create, verify and search file signatures")]
struct Cli {
    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Sidecar layout: <file>.sign or <stem>.json
    #[arg(long, value_enum, default_value_t = Convention::Signature, global = true)]
    convention: Convention,
    #[command(subcommand)] cmd: Cmd,
}

#[derive(Args, Clone, Copy)]
struct ChunkOpts {
    /// Bytes read per step; the whole file is never loaded at once
    #[arg(short = 'b', long = "chunk-size", visible_alias = "batch-size", default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    chunk_size: usize,
}

#[derive(Args, Clone, Copy)]
struct DigestArgs {
    #[command(flatten)] chunk: ChunkOpts,
    /// Hash algorithm: md5, sha1, sha224, sha256, sha384, sha512
    #[arg(short = 't', long = "hash-function", default_value = "md5", value_parser = parse_algorithm)]
    hash_function: HashAlgorithm,
}

impl From<DigestArgs> for DigestOptions {
    fn from(a: DigestArgs) -> Self { DigestOptions { algorithm: a.hash_function, chunk_size: a.chunk.chunk_size } }
}

#[derive(Args, Clone)]
struct FilterOpts {
    /// Glob a walked file must match (directories only; default all)
    #[arg(long)] include: Vec<String>,
    /// Glob that drops a walked file
    #[arg(long)] exclude: Vec<String>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Compute and store a signature next to each file
    Sign {
        #[command(flatten)] digest: DigestArgs,
        #[command(flatten)] filter: FilterOpts,
        #[arg(required = true)] files: Vec<PathBuf>,
    },
    /// Check files (or their sidecars) against stored signatures
    Validate {
        #[command(flatten)] chunk: ChunkOpts,
        #[command(flatten)] filter: FilterOpts,
        /// Allow stored names to resolve through symlinks that stay inside the sidecar's directory
        #[arg(long, default_value_t = false)] follow_symlinks: bool,
        #[arg(required = true)] files: Vec<PathBuf>,
    },
    /// Compare two files by digest
    Compare {
        #[command(flatten)] digest: DigestArgs,
        file_one: PathBuf,
        file_two: PathBuf,
    },
    /// List files whose content matches a stored signature
    Find {
        #[command(flatten)] chunk: ChunkOpts,
        #[command(flatten)] filter: FilterOpts,
        #[arg(short = 's', long)] signature_file: PathBuf,
        #[arg(required = true)] files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let store = SignatureStore::new(cli.convention.into());
    let loc = FluentLoc::default();
    match cli.cmd {
        Cmd::Sign { digest, filter, files } => sign(&store, &loc, digest.into(), &filter, &files)?,
        Cmd::Validate { chunk, filter, follow_symlinks, files } => validate(&store, &loc, chunk.chunk_size, &filter, PathPolicy { follow_symlinks }, &files)?,
        Cmd::Compare { digest, file_one, file_two } => compare(&loc, digest.into(), &file_one, &file_two)?,
        Cmd::Find { chunk, filter, signature_file, files } => find(&store, &loc, chunk.chunk_size, &filter, &signature_file, &files)?,
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose { 0 => "warn", 1 => "info", 2 => "debug", _ => "trace" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).try_init();
}

fn parse_chunk_size(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("chunk size must be greater than zero".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("bad chunk size {s:?}: {e}")),
    }
}

fn parse_algorithm(s: &str) -> Result<HashAlgorithm, String> {
    s.parse::<HashAlgorithm>().map_err(|e| e.to_string())
}

fn build_globset(includes: &[String], excludes: &[String]) -> Result<(GlobSet, GlobSet)> {
    let mut incb = GlobSetBuilder::new();
    let mut excb = GlobSetBuilder::new();
    if includes.is_empty() { incb.add(Glob::new("**/*")?); }
    for g in includes { incb.add(Glob::new(g).with_context(|| format!("bad include glob {g:?}"))?); }
    for g in excludes { excb.add(Glob::new(g).with_context(|| format!("bad exclude glob {g:?}"))?); }
    Ok((incb.build()?, excb.build()?))
}

/// Expand inputs: files are taken as given, directories are walked, filtered by
/// the globs and by `keep`, and sorted. Missing inputs are an error up front.
fn list_files(inputs: &[PathBuf], filter: &FilterOpts, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let (inc, exc) = build_globset(&filter.include, &filter.exclude)?;
    let mut v = vec![];
    for p in inputs {
        let md = fs::metadata(p).with_context(|| format!("{} does not exist", p.display()))?;
        if md.is_dir() {
            let mut walked = vec![];
            for e in WalkDir::new(p).into_iter().filter_map(|e| e.ok()) {
                let path = e.path();
                if !e.file_type().is_file() || !keep(path) { continue; }
                let rp_str = display_rel(path).replace('\\', "/");
                if !inc.is_match(&rp_str) { continue; }
                if !exc.is_match(&rp_str) { walked.push(path.to_path_buf()); }
            }
            walked.sort();
            v.extend(walked);
        } else { v.push(p.clone()); }
    }
    tracing::debug!(inputs = inputs.len(), files = v.len(), "inputs expanded");
    Ok(v)
}

fn display_rel(p: &Path) -> String {
    let rel = std::env::current_dir().ok().and_then(|cwd| pathdiff::diff_paths(p, cwd));
    match rel {
        Some(rp) if !p.is_relative() && !rp.starts_with("..") => rp.display().to_string(),
        _ => p.display().to_string(),
    }
}

fn sign(store: &SignatureStore, loc: &FluentLoc, opts: DigestOptions, filter: &FilterOpts, inputs: &[PathBuf]) -> Result<()> {
    let files: Vec<PathBuf> = list_files(inputs, filter, |p| !store.is_sidecar(p))?
        .into_iter().filter(|p| !store.is_sidecar(p)).collect();

    // One writer per sidecar: under the metadata convention a.txt and a.csv share a.json.
    // The first input listed keeps the sidecar; a source listed twice is signed once.
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut planned: Vec<(PathBuf, Option<SignatureError>)> = vec![];
    for p in files {
        let sidecar = store.sidecar_path(&p);
        match claimed.entry(lexical_key(&sidecar)) {
            Entry::Vacant(slot) => { slot.insert(lexical_key(&p)); planned.push((p, None)); }
            Entry::Occupied(slot) if *slot.get() == lexical_key(&p) => {}
            Entry::Occupied(_) => {
                let clash = SignatureError::UnsafePath { path: sidecar, reason: "sidecar already claimed by another input" };
                planned.push((p, Some(clash)));
            }
        }
    }

    let results: Vec<(PathBuf, fsig_core::Result<PathBuf>)> = planned
        .into_par_iter()
        .map(|(p, clash)| {
            let res = match clash {
                Some(e) => Err(e),
                None => FileRecord::open(&p, opts.algorithm).and_then(|mut rec| {
                    rec.compute_digest(opts.chunk_size)?;
                    store.save(&rec)
                }),
            };
            (p, res)
        })
        .collect();

    let mut created = 0usize;
    for (p, res) in &results {
        match res {
            Ok(_) => created += 1,
            Err(e) => {
                let (path, reason) = (display_rel(p), e.to_string());
                eprintln!("{}", loc.msg("sign-failed", &[("path", path.as_str()), ("reason", reason.as_str())]).red());
            }
        }
    }
    let count = created.to_string();
    println!("{}", loc.msg("signed-count", &[("count", count.as_str())]));
    let failed = results.len() - created;
    if failed > 0 { return Err(anyhow!("{} of {} file(s) could not be signed", failed, results.len())); }
    Ok(())
}

fn validate(store: &SignatureStore, loc: &FluentLoc, chunk_size: usize, filter: &FilterOpts, policy: PathPolicy, inputs: &[PathBuf]) -> Result<()> {
    // Inputs may be sources or sidecars; a missing sidecar is reported per entry, not up front.
    let mut explicit = vec![];
    let mut dirs = vec![];
    for p in inputs { if p.is_dir() { dirs.push(p.clone()); } else { explicit.push(store.sidecar_for_input(p)); } }
    let mut sidecars = explicit;
    sidecars.extend(list_files(&dirs, filter, |p| store.is_sidecar(p))?);

    let report = verify_batch(&sidecars, chunk_size, policy);
    for entry in &report.entries {
        match entry.status {
            Status::Passed => println!("{}", loc.msg("integrity-passed", &[("name", entry.name.as_str())]).green()),
            Status::Failed => {
                let reason = match (&entry.mismatch, &entry.error) {
                    (Some(m), _) => loc.mismatch(m),
                    (None, Some(e)) => e.to_string(),
                    (None, None) => String::new(),
                };
                println!("{}", loc.msg("integrity-failed-reason", &[("name", entry.name.as_str()), ("reason", reason.as_str())]).red());
            }
        }
    }
    println!("{}", loc.msg("summary-header", &[]).bold());
    let (passed, total) = (report.passed().to_string(), report.total().to_string());
    println!("{}", loc.msg("summary-passing", &[("passed", passed.as_str()), ("total", total.as_str())]).bold());
    if !report.all_passed() {
        return Err(anyhow!("{} of {} file(s) failed the integrity test", report.failed(), report.total()));
    }
    Ok(())
}

fn compare(loc: &FluentLoc, opts: DigestOptions, one: &Path, two: &Path) -> Result<()> {
    let mut a = FileRecord::open(one, opts.algorithm)?;
    let mut b = FileRecord::open(two, opts.algorithm)?;
    a.compute_digest(opts.chunk_size)?;
    b.compute_digest(opts.chunk_size)?;
    let (p1, p2) = (display_rel(one), display_rel(two));
    let args = [("one", p1.as_str()), ("two", p2.as_str())];
    if records_equal_checked(&a, &b)? {
        println!("{}", loc.msg("compare-equal", &args).green());
    } else {
        println!("{}", loc.msg("compare-differ", &args).red());
    }
    Ok(())
}

fn find(store: &SignatureStore, loc: &FluentLoc, chunk_size: usize, filter: &FilterOpts, signature_file: &Path, inputs: &[PathBuf]) -> Result<()> {
    let target = load_signature(signature_file).with_context(|| format!("load signature {}", signature_file.display()))?;
    let candidates = list_files(inputs, filter, |p| !store.is_sidecar(p))?;
    let sig = display_rel(signature_file);
    for res in find_matching(&candidates, &target, chunk_size)? {
        match res {
            Ok(rec) => {
                let path = rec.path.as_deref().map(display_rel).unwrap_or_else(|| rec.display_path());
                println!("{}", loc.msg("match-found", &[("path", path.as_str()), ("signature", sig.as_str())]).green());
            }
            Err(e) => {
                let reason = e.to_string();
                eprintln!("{}", loc.msg("search-skipped", &[("kind", e.kind()), ("reason", reason.as_str())]));
            }
        }
    }
    println!("{}", loc.msg("search-done", &[]).bold());
    Ok(())
}
