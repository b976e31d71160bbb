use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::cli::Arguments;

// External software
pub const FLYE_TAG: &str = "flye";
pub const BEROKKA_TAG: &str = "berokka";
pub const CIRCLATOR_TAG: &str = "circlator";
pub const MINIMAP2_TAG: &str = "minimap2";
pub const BWA_TAG: &str = "bwa";
pub const RACON_TAG: &str = "racon";
pub const MEDAKA_TAG: &str = "medaka_consensus";
pub const SAMTOOLS_TAG: &str = "samtools";
pub const BEDTOOLS_TAG: &str = "bedtools";
pub const FIX_REPEATS_TAG: &str = "fix_repeats";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tool {
    Flye,
    Berokka,
    Circlator,
    Minimap2,
    Bwa,
    Racon,
    Medaka,
    Samtools,
    Bedtools,
    FixRepeats,
}

impl Tool {
    pub fn tag(self) -> &'static str {
        match self {
            Tool::Flye => FLYE_TAG,
            Tool::Berokka => BEROKKA_TAG,
            Tool::Circlator => CIRCLATOR_TAG,
            Tool::Minimap2 => MINIMAP2_TAG,
            Tool::Bwa => BWA_TAG,
            Tool::Racon => RACON_TAG,
            Tool::Medaka => MEDAKA_TAG,
            Tool::Samtools => SAMTOOLS_TAG,
            Tool::Bedtools => BEDTOOLS_TAG,
            Tool::FixRepeats => FIX_REPEATS_TAG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CirclatorSubcommand {
    Clean,
    Fixstart,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BwaSubcommand {
    Index,
    Mem,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamtoolsSubcommand {
    Sort,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BedtoolsSubcommand {
    Genomecov,
}

// Output directories, one per stage family
pub const ASSEMBLY_DIR: &str = "flye_assembly";
pub const TRIM_DIR: &str = "berokka_results";
pub const LONG_READ_DIR: &str = "longRead_polish_results";
pub const SHORT_READ_DIR: &str = "shortRead_polish_results";
pub const CONSENSUS_DIR: &str = "medaka_results";
pub const REPEAT_SCRATCH_DIR: &str = "tmp";

// Static Filenames
pub const FLYE_DEFAULT_FASTA: &str = "assembly.fasta";
pub const BEROKKA_TRIMMED_FASTA: &str = "02.trimmed.fa";
pub const MEDAKA_CONSENSUS_FASTA: &str = "consensus.fasta";
pub const COVERAGE_PROFILE: &str = "coverage.txt";
pub const DEFAULT_START_GENES: &str = "db/uniprot_dnaA.nucleotides.fa";

// Static Parameters
pub const DEFAULT_SAMPLE_NAME: &str = "SAMPLE";
pub const DEFAULT_MEDAKA_MODEL: &str = "r941_min_high_g360";
pub const DEFAULT_MIN_CONTIG_LENGTH: usize = 500;
pub const DEFAULT_READ_LENGTH: usize = 300;
pub const RACON_LONG_READ_SCORING: &[&str] = &["-m", "8", "-x", "-6", "-g", "-8", "-w", "500"];

pub const FASTA_EXT: &str = "fasta";


#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Output directory already exists: {}", .0.display())]
    OutputDirExists(PathBuf),

    #[error("Missing {what}: {}", .path.display())]
    MissingInput { what: &'static str, path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{tool} executable not found: {}", .executable.display())]
    ToolNotFound { tool: String, executable: PathBuf },

    #[error("Failed to execute {tool}: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("{tool} exited with {status}")]
    ToolFailure { tool: String, status: ExitStatus },

    #[error("{tool} did not finish within {secs} seconds")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("{stage}: expected artifact is missing: {}", .path.display())]
    ArtifactMismatch { stage: String, path: PathBuf },

    #[error("Polishing round must be between 1 and 4, got {0}")]
    InvalidRound(u8),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Unwraps the stage context, if any.
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::IOError(e.to_string())
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    Standard,
    PlasmidMeta,
}

/// Where the draft contigs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblySource {
    DeNovo(AssemblyMode),
    ExistingContigs(PathBuf),
}

/// Gene set used by both start-site rotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSiteReference {
    Bundled(PathBuf),
    UserSupplied(PathBuf),
}

impl StartSiteReference {
    pub fn path(&self) -> &Path {
        match self {
            StartSiteReference::Bundled(path) => path,
            StartSiteReference::UserSupplied(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub flye: PathBuf,
    pub berokka: PathBuf,
    pub circlator: PathBuf,
    pub minimap2: PathBuf,
    pub bwa: PathBuf,
    pub racon: PathBuf,
    pub medaka: PathBuf,
    pub samtools: PathBuf,
    pub bedtools: PathBuf,
    pub fix_repeats: PathBuf,
}

impl ToolPaths {
    pub fn get(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Flye => &self.flye,
            Tool::Berokka => &self.berokka,
            Tool::Circlator => &self.circlator,
            Tool::Minimap2 => &self.minimap2,
            Tool::Bwa => &self.bwa,
            Tool::Racon => &self.racon,
            Tool::Medaka => &self.medaka,
            Tool::Samtools => &self.samtools,
            Tool::Bedtools => &self.bedtools,
            Tool::FixRepeats => &self.fix_repeats,
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            flye: PathBuf::from(FLYE_TAG),
            berokka: PathBuf::from(BEROKKA_TAG),
            circlator: PathBuf::from(CIRCLATOR_TAG),
            minimap2: PathBuf::from(MINIMAP2_TAG),
            bwa: PathBuf::from(BWA_TAG),
            racon: PathBuf::from(RACON_TAG),
            medaka: PathBuf::from(MEDAKA_TAG),
            samtools: PathBuf::from(SAMTOOLS_TAG),
            bedtools: PathBuf::from(BEDTOOLS_TAG),
            fix_repeats: PathBuf::from(FIX_REPEATS_TAG),
        }
    }
}


/// Immutable description of one run, built once from the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub sample_name: String,
    pub long_reads: PathBuf,
    pub pe_reads: PathBuf,
    pub threads: usize,
    pub assembly_source: AssemblySource,
    pub start_site_reference: StartSiteReference,
    pub tools: ToolPaths,
    pub medaka_model: String,
    pub min_contig_length: usize,
    pub read_length: usize,
    pub tool_timeout: Option<Duration>,
    pub dry_run: bool,
}

impl RunConfig {
    /// Resolves the command line against `cwd`. Both branch points (assembly
    /// source and start-site reference) are settled here and never revisited.
    pub fn from_args(args: &Arguments, cwd: &Path) -> Result<Self, PipelineError> {
        let resolve = |p: &str| absolutize(Path::new(p), cwd);

        if args.sample_name.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("sample name must not be empty".to_string()));
        }
        if args.sample_name.contains(std::path::is_separator) {
            return Err(PipelineError::InvalidConfig(format!(
                "sample name must not contain a path separator: {}",
                args.sample_name
            )));
        }

        let assembly_source = if args.existing_contigs {
            let contigs = args.contigs.as_deref().ok_or_else(|| {
                PipelineError::InvalidConfig("--existing_contigs requires --contigs".to_string())
            })?;
            AssemblySource::ExistingContigs(resolve(contigs))
        } else if args.mp {
            AssemblySource::DeNovo(AssemblyMode::PlasmidMeta)
        } else {
            AssemblySource::DeNovo(AssemblyMode::Standard)
        };

        let start_site_reference = match &args.dnaa_file {
            Some(file) => StartSiteReference::UserSupplied(resolve(file)),
            None => StartSiteReference::Bundled(bundled_start_genes()),
        };

        let tools = ToolPaths {
            flye: PathBuf::from(&args.flye_path),
            berokka: PathBuf::from(&args.berokka_path),
            circlator: PathBuf::from(&args.circlator_path),
            minimap2: PathBuf::from(&args.minimap2_path),
            bwa: PathBuf::from(&args.bwa_path),
            racon: PathBuf::from(&args.racon_path),
            medaka: PathBuf::from(&args.medaka_path),
            samtools: PathBuf::from(&args.samtools_path),
            bedtools: PathBuf::from(&args.bedtools_path),
            fix_repeats: PathBuf::from(&args.fix_repeats_path),
        };

        Ok(RunConfig {
            cwd: cwd.to_path_buf(),
            out_dir: resolve(&args.outdir),
            sample_name: args.sample_name.clone(),
            long_reads: resolve(&args.long_reads),
            pe_reads: resolve(&args.pe_reads),
            threads: args.threads,
            assembly_source,
            start_site_reference,
            tools,
            medaka_model: args.medaka_model.clone(),
            min_contig_length: args.min_contig_length,
            read_length: args.read_length,
            tool_timeout: args.tool_timeout_secs.map(Duration::from_secs),
            dry_run: args.dry_run,
        })
    }

    /// Configuration checks that must pass before any stage runs.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.out_dir.exists() {
            return Err(PipelineError::OutputDirExists(self.out_dir.clone()));
        }
        if self.threads == 0 {
            return Err(PipelineError::InvalidConfig("thread count must be at least 1".to_string()));
        }
        if self.read_length == 0 {
            return Err(PipelineError::InvalidConfig("read length must be at least 1".to_string()));
        }
        if self.tool_timeout == Some(Duration::ZERO) {
            return Err(PipelineError::InvalidConfig("tool timeout must be at least 1 second".to_string()));
        }

        require_file("long reads", &self.long_reads)?;
        require_file("paired-end reads", &self.pe_reads)?;
        if let AssemblySource::ExistingContigs(contigs) = &self.assembly_source {
            require_file("existing contigs", contigs)?;
        }
        let what = match &self.start_site_reference {
            StartSiteReference::Bundled(_) => "bundled start-site reference",
            StartSiteReference::UserSupplied(_) => "start-site reference",
        };
        require_file(what, self.start_site_reference.path())?;
        Ok(())
    }

    pub fn threads_arg(&self) -> String {
        self.threads.to_string()
    }
}

fn require_file(what: &'static str, path: &Path) -> Result<(), PipelineError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput { what, path: path.to_path_buf() })
    }
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Locates the dnaA gene set shipped alongside the binary.
///
/// Looks in `<exe dir>/../db`, `<exe dir>/db` and finally the crate root. When
/// none exist the crate-root location is returned so validation can report it.
pub fn bundled_start_genes() -> PathBuf {
    let exe = std::env::current_exe().ok();
    first_existing(start_genes_candidates(exe.as_deref()))
}

fn start_genes_candidates(exe: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = exe.and_then(Path::parent) {
        candidates.push(dir.join("..").join(DEFAULT_START_GENES));
        candidates.push(dir.join(DEFAULT_START_GENES));
    }
    candidates.push(Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_START_GENES));
    candidates
}

// Falls back to the last candidate when nothing is installed.
fn first_existing(mut candidates: Vec<PathBuf>) -> PathBuf {
    match candidates.iter().position(|p| p.is_file()) {
        Some(found) => candidates.swap_remove(found),
        None => candidates.pop().unwrap_or_else(|| PathBuf::from(DEFAULT_START_GENES)),
    }
}
