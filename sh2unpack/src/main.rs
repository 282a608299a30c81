use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser as ClapParser;

use sh2_core::extract::{plan, DirectorySource, Extractor};
use sh2_core::fingerprint::{detect_version, sha1_hex};
use sh2_core::{IndexResolver, VersionProfile, KNOWN_VERSIONS};

#[derive(ClapParser, Debug)]
#[command(version, about = "Extract files from Silent Hill 2 merge files using the index in the game executable")]
struct Args {
    /// Game executable (SLUS_202.28, SLES_503.82, ...)
    #[arg(short, long, required_unless_present = "list_versions")]
    infile: Option<PathBuf>,

    /// Where extracted files are written
    #[arg(required_unless_present_any = ["list_versions", "list"])]
    outdir: Option<PathBuf>,

    /// TOML version profile, for executables that are not recognized
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Directory holding the merge files [default: the executable's directory]
    #[arg(short, long)]
    archive_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Resolve and check every file without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the merge files and binary files in the index, then exit
    #[arg(long)]
    list: bool,

    /// Print the known executables, then exit
    #[arg(long)]
    list_versions: bool,
}

fn init_logger(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(filter));
}

fn list_versions() {
    for version in KNOWN_VERSIONS {
        println!(
            "{}  {:<12} data 0x{:06X} magic 0x{:05X}  {}",
            version.sha1, version.file_name, version.data_offset, version.magic_offset, version.description
        );
    }
}

fn select_profile(executable: &[u8], profile_path: Option<&Path>) -> Result<VersionProfile> {
    if let Some(path) = profile_path {
        return VersionProfile::load(path);
    }
    let version = detect_version(executable).ok_or_else(|| {
        anyhow!(
            "unrecognized executable (sha1 {}), pass a version profile with --profile",
            sha1_hex(executable)
        )
    })?;
    Ok(version.profile())
}

fn list_index(resolver: &IndexResolver) {
    let path = |raw: u32| resolver.resolve_path(raw).unwrap_or("<missing>");

    println!("merge files:");
    for (offset, entry) in resolver.merge_files() {
        println!("  0x{:08X}  {}", offset, path(entry.path_address));
    }
    println!("binary files:");
    for (offset, entry) in resolver.binary_files() {
        println!("  0x{:08X}  {}", offset, path(entry.path_address));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.debug);

    if args.list_versions {
        list_versions();
        return Ok(());
    }

    let Some(infile) = args.infile else {
        bail!("no executable given");
    };
    let executable = fs::read(&infile).with_context(|| format!("can't read {:?}", infile))?;

    let profile = select_profile(&executable, args.profile.as_deref())?;
    log::info!("{} {}", profile.name, profile.description);
    log::debug!(
        "data offset 0x{:X}, magic offset 0x{:X}",
        profile.data_offset,
        profile.magic_offset
    );

    let resolver = IndexResolver::read(Cursor::new(&executable), &profile)
        .with_context(|| format!("can't decode the file index in {:?}", infile))?;

    let stats = resolver.stats();
    log::info!(
        "index: {} files, {} merge files, {} chunks, {} binary files, {} paths",
        stats.path_pairs,
        stats.merge_files,
        stats.data_chunks,
        stats.binary_files,
        stats.paths
    );
    if let Some(guess) = resolver.guess_magic_offset() {
        log::debug!("guessed magic offset 0x{:X}", guess);
    }

    if args.list {
        list_index(&resolver);
        return Ok(());
    }

    let Some(outdir) = args.outdir else {
        bail!("no output directory given");
    };
    let archive_dir = match args.archive_dir {
        Some(dir) => dir,
        None => infile.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let plan = plan(&resolver, profile.data_offset);
    let mut extractor = Extractor::new(DirectorySource::new(&archive_dir), &outdir).dry_run(args.dry_run);
    let summary = extractor.run(&plan)?;

    let verb = if args.dry_run { "would extract" } else { "extracted" };
    println!(
        "{} {} files ({} bytes) from {} merge files, skipped {}",
        verb,
        summary.files,
        summary.bytes,
        extractor.open_merge_files(),
        summary.skipped
    );

    Ok(())
}
