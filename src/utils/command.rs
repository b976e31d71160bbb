/// Functions and structs for building external tool command lines

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::defs::{PipelineError, RunConfig, Tool};

/// Where a tool's standard output goes.
#[derive(Debug, Clone, PartialEq)]
pub enum StdoutTarget {
    Inherit,
    File(PathBuf),
    Capture,
}

/// Fully resolved command for one tool run.
///
/// `inputs` lists the files the tool reads; they are checked before launch so a
/// missing upstream artifact is reported as such rather than as a tool error.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub tool: Tool,
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub stdin: Option<PathBuf>,
    pub stdout: StdoutTarget,
}

impl Invocation {
    pub fn new(tool: Tool, executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Invocation {
            tool,
            executable: executable.into(),
            args,
            inputs: Vec::new(),
            stdin: None,
            stdout: StdoutTarget::Inherit,
        }
    }

    pub fn command_line(&self) -> String {
        let mut line = self.executable.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        if let Some(stdin) = &self.stdin {
            line.push_str(&format!(" < {}", stdin.display()));
        }
        if let StdoutTarget::File(path) = &self.stdout {
            line.push_str(&format!(" > {}", path.display()));
        }
        line
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())
    }
}

// Every path reaching here has passed `require_arg`, which rejects non-UTF-8.
fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}


mod flye {
    use std::path::PathBuf;
    use crate::config::defs::{AssemblyMode, RunConfig};
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct FlyeConfig {
        pub reads: PathBuf,
        pub out_dir: PathBuf,
        pub mode: AssemblyMode,
    }

    pub fn arg_generator(config: &RunConfig, view: &FlyeConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("--nano-raw".to_string());
        args_vec.push(path_arg(&view.reads));
        args_vec.push("-o".to_string());
        args_vec.push(path_arg(&view.out_dir));
        if view.mode == AssemblyMode::PlasmidMeta {
            args_vec.push("--plasmids".to_string());
            args_vec.push("--meta".to_string());
        }
        args_vec.push("--threads".to_string());
        args_vec.push(config.threads_arg());
        args_vec
    }
}

mod berokka {
    use std::path::PathBuf;
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct BerokkaConfig {
        pub input: PathBuf,
        pub out_dir: PathBuf,
    }

    pub fn arg_generator(view: &BerokkaConfig) -> Vec<String> {
        vec![path_arg(&view.input), "--outdir".to_string(), path_arg(&view.out_dir)]
    }
}

mod circlator {
    use std::path::PathBuf;
    use crate::config::defs::{CirclatorSubcommand, RunConfig};
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct CirclatorConfig {
        pub subcommand: CirclatorSubcommand,
        pub input: PathBuf,
        pub out_prefix: PathBuf,
        pub genes: Option<PathBuf>,
    }

    pub fn arg_generator(config: &RunConfig, view: &CirclatorConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        match view.subcommand {
            CirclatorSubcommand::Clean => {
                args_vec.push("clean".to_string());
                args_vec.push("--min_contig_length".to_string());
                args_vec.push(config.min_contig_length.to_string());
                args_vec.push("--verbose".to_string());
                args_vec.push(path_arg(&view.input));
                args_vec.push(path_arg(&view.out_prefix));
            }
            CirclatorSubcommand::Fixstart => {
                args_vec.push("fixstart".to_string());
                if let Some(genes) = &view.genes {
                    args_vec.push("--genes_fa".to_string());
                    args_vec.push(path_arg(genes));
                }
                args_vec.push(path_arg(&view.input));
                args_vec.push(path_arg(&view.out_prefix));
                args_vec.push("--verbose".to_string());
            }
        }
        args_vec
    }
}

mod minimap2 {
    use std::path::PathBuf;
    use crate::config::defs::RunConfig;
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct Minimap2Config {
        pub reference: PathBuf,
        pub reads: PathBuf,
        pub output: PathBuf,
    }

    pub fn arg_generator(config: &RunConfig, view: &Minimap2Config) -> Vec<String> {
        vec![
            "-t".to_string(),
            config.threads_arg(),
            "-ax".to_string(),
            "map-ont".to_string(),
            path_arg(&view.reference),
            path_arg(&view.reads),
        ]
    }
}

mod racon {
    use std::path::PathBuf;
    use crate::config::defs::{RunConfig, RACON_LONG_READ_SCORING};
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct RaconConfig {
        pub reads: PathBuf,
        pub overlaps: PathBuf,
        pub target: PathBuf,
        pub output: PathBuf,
        pub long_read_scoring: bool,
    }

    pub fn arg_generator(config: &RunConfig, view: &RaconConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = vec!["-t".to_string(), config.threads_arg()];
        if view.long_read_scoring {
            args_vec.extend(RACON_LONG_READ_SCORING.iter().map(|s| s.to_string()));
        }
        args_vec.push(path_arg(&view.reads));
        args_vec.push(path_arg(&view.overlaps));
        args_vec.push(path_arg(&view.target));
        args_vec
    }
}

mod medaka {
    use std::path::PathBuf;
    use crate::config::defs::RunConfig;
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct MedakaConfig {
        pub reads: PathBuf,
        pub draft: PathBuf,
        pub out_dir: PathBuf,
    }

    // -m must match the basecaller model the reads were called with.
    pub fn arg_generator(config: &RunConfig, view: &MedakaConfig) -> Vec<String> {
        vec![
            "-i".to_string(),
            path_arg(&view.reads),
            "-d".to_string(),
            path_arg(&view.draft),
            "-o".to_string(),
            path_arg(&view.out_dir),
            "-m".to_string(),
            config.medaka_model.clone(),
            "-t".to_string(),
            config.threads_arg(),
        ]
    }
}

mod bwa {
    use std::path::PathBuf;
    use crate::config::defs::{BwaSubcommand, RunConfig};
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct BwaConfig {
        pub subcommand: BwaSubcommand,
        pub reference: PathBuf,
        pub reads: Option<PathBuf>,
        pub output: Option<PathBuf>,
    }

    pub fn arg_generator(config: &RunConfig, view: &BwaConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        match view.subcommand {
            BwaSubcommand::Index => {
                args_vec.push("index".to_string());
                args_vec.push(path_arg(&view.reference));
            }
            BwaSubcommand::Mem => {
                args_vec.push("mem".to_string());
                args_vec.push("-t".to_string());
                args_vec.push(config.threads_arg());
                if let Some(output) = &view.output {
                    args_vec.push("-o".to_string());
                    args_vec.push(path_arg(output));
                }
                args_vec.push(path_arg(&view.reference));
                if let Some(reads) = &view.reads {
                    args_vec.push(path_arg(reads));
                }
            }
        }
        args_vec
    }
}

mod samtools {
    use std::path::PathBuf;
    use crate::config::defs::{RunConfig, SamtoolsSubcommand};
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct SamtoolsConfig {
        pub subcommand: SamtoolsSubcommand,
        pub output: PathBuf,
    }

    // Alignments arrive on stdin, piped from the aligner.
    pub fn arg_generator(config: &RunConfig, view: &SamtoolsConfig) -> Vec<String> {
        match view.subcommand {
            SamtoolsSubcommand::Sort => vec![
                "sort".to_string(),
                "-@".to_string(),
                config.threads_arg(),
                "-o".to_string(),
                path_arg(&view.output),
                "-".to_string(),
            ],
        }
    }
}

mod bedtools {
    use std::path::PathBuf;
    use crate::config::defs::BedtoolsSubcommand;
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct BedtoolsConfig {
        pub subcommand: BedtoolsSubcommand,
        pub bam: PathBuf,
        pub output: PathBuf,
    }

    pub fn arg_generator(view: &BedtoolsConfig) -> Vec<String> {
        match view.subcommand {
            BedtoolsSubcommand::Genomecov => vec![
                "genomecov".to_string(),
                "-d".to_string(),
                "-ibam".to_string(),
                path_arg(&view.bam),
            ],
        }
    }
}

mod fix_repeats {
    use std::path::PathBuf;
    use crate::config::defs::RunConfig;
    use super::path_arg;

    #[derive(Debug, Clone)]
    pub struct FixRepeatsConfig {
        pub assembly: PathBuf,
        pub reads: PathBuf,
        pub coverage: PathBuf,
        pub tmp_dir: PathBuf,
        pub output: PathBuf,
    }

    pub fn arg_generator(config: &RunConfig, view: &FixRepeatsConfig) -> Vec<String> {
        vec![
            "--assembly".to_string(),
            path_arg(&view.assembly),
            "--reads".to_string(),
            path_arg(&view.reads),
            "--coverage".to_string(),
            path_arg(&view.coverage),
            "--tmp-dir".to_string(),
            path_arg(&view.tmp_dir),
            "--output".to_string(),
            path_arg(&view.output),
            "--read-length".to_string(),
            config.read_length.to_string(),
            "--threads".to_string(),
            config.threads_arg(),
        ]
    }
}

pub use berokka::BerokkaConfig;
pub use bedtools::BedtoolsConfig;
pub use bwa::BwaConfig;
pub use circlator::CirclatorConfig;
pub use fix_repeats::FixRepeatsConfig;
pub use flye::FlyeConfig;
pub use medaka::MedakaConfig;
pub use minimap2::Minimap2Config;
pub use racon::RaconConfig;
pub use samtools::SamtoolsConfig;


/// Per-tool settings for one invocation.
#[derive(Debug, Clone)]
pub enum ToolConfig {
    Flye(FlyeConfig),
    Berokka(BerokkaConfig),
    Circlator(CirclatorConfig),
    Minimap2(Minimap2Config),
    Racon(RaconConfig),
    Medaka(MedakaConfig),
    Bwa(BwaConfig),
    Samtools(SamtoolsConfig),
    Bedtools(BedtoolsConfig),
    FixRepeats(FixRepeatsConfig),
}

impl ToolConfig {
    pub fn tool(&self) -> Tool {
        match self {
            ToolConfig::Flye(_) => Tool::Flye,
            ToolConfig::Berokka(_) => Tool::Berokka,
            ToolConfig::Circlator(_) => Tool::Circlator,
            ToolConfig::Minimap2(_) => Tool::Minimap2,
            ToolConfig::Racon(_) => Tool::Racon,
            ToolConfig::Medaka(_) => Tool::Medaka,
            ToolConfig::Bwa(_) => Tool::Bwa,
            ToolConfig::Samtools(_) => Tool::Samtools,
            ToolConfig::Bedtools(_) => Tool::Bedtools,
            ToolConfig::FixRepeats(_) => Tool::FixRepeats,
        }
    }
}


/// Builds and validates the invocation for one tool run. Nothing is launched.
pub fn generate_cli(config: &RunConfig, view: ToolConfig) -> Result<Invocation, PipelineError> {
    use crate::config::defs::{BwaSubcommand, CirclatorSubcommand};

    let tool = view.tool();
    if config.threads == 0 {
        return Err(PipelineError::InvalidConfig(format!("{}: thread count must be at least 1", tool.tag())));
    }
    let executable = config.tools.get(tool).to_path_buf();
    if executable.as_os_str().is_empty() {
        return Err(PipelineError::InvalidConfig(format!("{}: empty executable path", tool.tag())));
    }

    let mut invocation = match &view {
        ToolConfig::Flye(v) => {
            require_arg(tool, "reads", &v.reads)?;
            require_arg(tool, "output directory", &v.out_dir)?;
            let mut inv = Invocation::new(tool, executable, flye::arg_generator(config, v));
            inv.inputs = vec![v.reads.clone()];
            inv
        }
        ToolConfig::Berokka(v) => {
            require_arg(tool, "input", &v.input)?;
            require_arg(tool, "output directory", &v.out_dir)?;
            let mut inv = Invocation::new(tool, executable, berokka::arg_generator(v));
            inv.inputs = vec![v.input.clone()];
            inv
        }
        ToolConfig::Circlator(v) => {
            require_arg(tool, "input", &v.input)?;
            require_arg(tool, "output prefix", &v.out_prefix)?;
            let mut inputs = vec![v.input.clone()];
            if v.subcommand == CirclatorSubcommand::Fixstart {
                let genes = v.genes.as_ref().ok_or_else(|| {
                    PipelineError::InvalidConfig("circlator fixstart requires --genes_fa".to_string())
                })?;
                require_arg(tool, "genes", genes)?;
                inputs.push(genes.clone());
            }
            let mut inv = Invocation::new(tool, executable, circlator::arg_generator(config, v));
            inv.inputs = inputs;
            inv
        }
        ToolConfig::Minimap2(v) => {
            require_arg(tool, "reference", &v.reference)?;
            require_arg(tool, "reads", &v.reads)?;
            require_arg(tool, "output", &v.output)?;
            let mut inv = Invocation::new(tool, executable, minimap2::arg_generator(config, v));
            inv.inputs = vec![v.reference.clone(), v.reads.clone()];
            inv.stdout = StdoutTarget::File(v.output.clone());
            inv
        }
        ToolConfig::Racon(v) => {
            require_arg(tool, "reads", &v.reads)?;
            require_arg(tool, "overlaps", &v.overlaps)?;
            require_arg(tool, "target", &v.target)?;
            require_arg(tool, "output", &v.output)?;
            let mut inv = Invocation::new(tool, executable, racon::arg_generator(config, v));
            inv.inputs = vec![v.reads.clone(), v.overlaps.clone(), v.target.clone()];
            inv.stdout = StdoutTarget::File(v.output.clone());
            inv
        }
        ToolConfig::Medaka(v) => {
            require_arg(tool, "reads", &v.reads)?;
            require_arg(tool, "draft", &v.draft)?;
            require_arg(tool, "output directory", &v.out_dir)?;
            if config.medaka_model.trim().is_empty() {
                return Err(PipelineError::InvalidConfig("medaka model must not be empty".to_string()));
            }
            let mut inv = Invocation::new(tool, executable, medaka::arg_generator(config, v));
            inv.inputs = vec![v.reads.clone(), v.draft.clone()];
            inv
        }
        ToolConfig::Bwa(v) => {
            require_arg(tool, "reference", &v.reference)?;
            let mut inputs = vec![v.reference.clone()];
            if v.subcommand == BwaSubcommand::Mem {
                let reads = v.reads.as_ref().ok_or_else(|| {
                    PipelineError::InvalidConfig("bwa mem requires reads".to_string())
                })?;
                require_arg(tool, "reads", reads)?;
                inputs.push(reads.clone());
            }
            if let Some(output) = &v.output {
                require_arg(tool, "output", output)?;
            }
            let mut inv = Invocation::new(tool, executable, bwa::arg_generator(config, v));
            inv.inputs = inputs;
            inv
        }
        ToolConfig::Samtools(v) => {
            require_arg(tool, "output", &v.output)?;
            Invocation::new(tool, executable, samtools::arg_generator(config, v))
        }
        ToolConfig::Bedtools(v) => {
            require_arg(tool, "bam", &v.bam)?;
            require_arg(tool, "output", &v.output)?;
            let mut inv = Invocation::new(tool, executable, bedtools::arg_generator(v));
            inv.inputs = vec![v.bam.clone()];
            inv.stdout = StdoutTarget::File(v.output.clone());
            inv
        }
        ToolConfig::FixRepeats(v) => {
            require_arg(tool, "assembly", &v.assembly)?;
            require_arg(tool, "reads", &v.reads)?;
            require_arg(tool, "coverage", &v.coverage)?;
            require_arg(tool, "scratch directory", &v.tmp_dir)?;
            require_arg(tool, "output", &v.output)?;
            let mut inv = Invocation::new(tool, executable, fix_repeats::arg_generator(config, v));
            inv.inputs = vec![v.assembly.clone(), v.reads.clone(), v.coverage.clone(), v.tmp_dir.clone()];
            inv
        }
    };

    invocation.inputs.dedup();
    Ok(invocation)
}

fn require_arg(tool: Tool, what: &str, path: &Path) -> Result<(), PipelineError> {
    if path.as_os_str().is_empty() {
        return Err(PipelineError::InvalidConfig(format!("{}: missing {}", tool.tag(), what)));
    }
    if path.to_str().is_none() {
        return Err(PipelineError::InvalidConfig(format!(
            "{}: {} path is not valid UTF-8: {}",
            tool.tag(),
            what,
            path.display()
        )));
    }
    Ok(())
}
