use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

use crate::config::defs::{
    AssemblyMode, BedtoolsSubcommand, BwaSubcommand, CirclatorSubcommand, PipelineError, RunConfig,
    SamtoolsSubcommand, StartSiteReference,
};
use crate::utils::artifacts::{Artifact, ArtifactNamer, ReadFamily, Round, StartSiteOccurrence};
use crate::utils::command::{
    generate_cli, BedtoolsConfig, BerokkaConfig, BwaConfig, CirclatorConfig, FixRepeatsConfig, FlyeConfig,
    Invocation, MedakaConfig, Minimap2Config, RaconConfig, SamtoolsConfig, ToolConfig,
};
use crate::utils::file::{remove_artifact, strip_fasta_descriptions};
use crate::utils::process::{run_pipeline, run_tool};


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Assemble(AssemblyMode),
    CircularizeTrim,
    Clean,
    LongReadPolish(Round),
    StartSiteFix(StartSiteOccurrence, StartSiteReference),
    LongReadConsensus,
    ShortReadPolish(Round),
    RepeatCorrect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Assemble(AssemblyMode::Standard) => write!(f, "Assemble(standard)"),
            Stage::Assemble(AssemblyMode::PlasmidMeta) => write!(f, "Assemble(plasmid-meta)"),
            Stage::CircularizeTrim => write!(f, "Circularize-Trim"),
            Stage::Clean => write!(f, "Clean"),
            Stage::LongReadPolish(round) => write!(f, "Long-Read-Polish({})", round),
            Stage::StartSiteFix(occurrence, StartSiteReference::Bundled(_)) => {
                write!(f, "Start-Site-Fix({}, default ref)", occurrence)
            }
            Stage::StartSiteFix(occurrence, StartSiteReference::UserSupplied(_)) => {
                write!(f, "Start-Site-Fix({}, user ref)", occurrence)
            }
            Stage::LongReadConsensus => write!(f, "Long-Read-Consensus"),
            Stage::ShortReadPolish(round) => write!(f, "Short-Read-Polish({})", round),
            Stage::RepeatCorrect => write!(f, "Repeat-Correct"),
        }
    }
}

/// One step inside a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateDir(PathBuf),
    Invoke(Invocation),
    Pipe { upstream: Invocation, downstream: Invocation },
    Rename { from: PathBuf, to: PathBuf },
    StripHeaders(PathBuf),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateDir(dir) => write!(f, "mkdir -p {}", dir.display()),
            Action::Invoke(invocation) => write!(f, "{}", invocation),
            Action::Pipe { upstream, downstream } => write!(f, "{} | {}", upstream, downstream),
            Action::Rename { from, to } => write!(f, "mv {} {}", from.display(), to.display()),
            Action::StripHeaders(path) => write!(f, "strip FASTA header descriptions in {}", path.display()),
        }
    }
}

/// Everything a stage will do, resolved before the pipeline starts.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecipe {
    pub stage: String,
    pub inputs: Vec<PathBuf>,
    pub actions: Vec<Action>,
    pub output: PathBuf,
    pub transients: Vec<PathBuf>,
}

impl StageRecipe {
    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        self.actions.iter().flat_map(|action| match action {
            Action::Invoke(invocation) => vec![invocation],
            Action::Pipe { upstream, downstream } => vec![upstream, downstream],
            _ => Vec::new(),
        })
    }
}


impl Stage {
    pub fn output_artifact(&self) -> Artifact {
        match self {
            Stage::Assemble(_) => Artifact::AssemblyFasta,
            Stage::CircularizeTrim => Artifact::TrimmedFasta,
            Stage::Clean => Artifact::CleanedFasta,
            Stage::LongReadPolish(round) => Artifact::Polished(*round),
            Stage::StartSiteFix(occurrence, _) => Artifact::StartSiteFasta(*occurrence),
            Stage::LongReadConsensus => Artifact::ConsensusFasta,
            Stage::ShortReadPolish(round) => Artifact::Polished(*round),
            Stage::RepeatCorrect => Artifact::FinalFasta,
        }
    }

    /// Builds the stage's recipe. Every tool descriptor is generated and
    /// validated here, so argument mistakes surface before anything runs.
    ///
    /// # Arguments
    ///
    /// * `config` - Run configuration.
    /// * `namer` - Artifact namer for this run.
    /// * `input` - Output of the previous stage, or the user's contigs.
    pub fn recipe(
        &self,
        config: &RunConfig,
        namer: &ArtifactNamer,
        input: Option<&Path>,
    ) -> Result<StageRecipe, PipelineError> {
        let stage = self.to_string();
        let output = namer.path(self.output_artifact());
        let mut inputs = Vec::new();
        let mut actions = Vec::new();
        let mut transients = Vec::new();

        let draft = || -> Result<PathBuf, PipelineError> {
            input
                .map(Path::to_path_buf)
                .ok_or_else(|| PipelineError::InvalidConfig(format!("{} has no input assembly", stage)))
        };

        match self {
            Stage::Assemble(mode) => {
                inputs.push(config.long_reads.clone());
                actions.push(invoke(config, ToolConfig::Flye(FlyeConfig {
                    reads: config.long_reads.clone(),
                    out_dir: namer.path(Artifact::AssemblyDir),
                    mode: *mode,
                }))?);
                actions.push(Action::Rename {
                    from: namer.path(Artifact::AssemblerDefaultFasta),
                    to: output.clone(),
                });
            }
            Stage::CircularizeTrim => {
                let draft = draft()?;
                inputs.push(draft.clone());
                actions.push(invoke(config, ToolConfig::Berokka(BerokkaConfig {
                    input: draft,
                    out_dir: namer.path(Artifact::TrimDir),
                }))?);
            }
            Stage::Clean => {
                let draft = draft()?;
                inputs.push(draft.clone());
                actions.push(invoke(config, ToolConfig::Circlator(CirclatorConfig {
                    subcommand: CirclatorSubcommand::Clean,
                    input: draft,
                    out_prefix: namer.path(Artifact::CleanPrefix),
                    genes: None,
                }))?);
            }
            Stage::LongReadPolish(round) => {
                require_family(&stage, *round, ReadFamily::Long)?;
                let draft = draft()?;
                let sam = namer.path(Artifact::Alignment(*round));
                inputs.push(draft.clone());
                inputs.push(config.long_reads.clone());
                actions.push(Action::CreateDir(namer.path(Artifact::LongReadDir)));
                actions.push(invoke(config, ToolConfig::Minimap2(Minimap2Config {
                    reference: draft.clone(),
                    reads: config.long_reads.clone(),
                    output: sam.clone(),
                }))?);
                actions.push(invoke(config, ToolConfig::Racon(RaconConfig {
                    reads: config.long_reads.clone(),
                    overlaps: sam.clone(),
                    target: draft,
                    output: output.clone(),
                    long_read_scoring: true,
                }))?);
                transients.push(sam);
            }
            Stage::StartSiteFix(occurrence, reference) => {
                let draft = draft()?;
                let prefix = namer.path(Artifact::StartSitePrefix(*occurrence));
                inputs.push(draft.clone());
                inputs.push(reference.path().to_path_buf());
                if let Some(dir) = prefix.parent() {
                    actions.push(Action::CreateDir(dir.to_path_buf()));
                }
                actions.push(invoke(config, ToolConfig::Circlator(CirclatorConfig {
                    subcommand: CirclatorSubcommand::Fixstart,
                    input: draft,
                    out_prefix: prefix,
                    genes: Some(reference.path().to_path_buf()),
                }))?);
            }
            Stage::LongReadConsensus => {
                let draft = draft()?;
                inputs.push(draft.clone());
                inputs.push(config.long_reads.clone());
                actions.push(invoke(config, ToolConfig::Medaka(MedakaConfig {
                    reads: config.long_reads.clone(),
                    draft,
                    out_dir: namer.path(Artifact::ConsensusDir),
                }))?);
            }
            Stage::ShortReadPolish(round) => {
                require_family(&stage, *round, ReadFamily::Short)?;
                let draft = draft()?;
                let sam = namer.path(Artifact::Alignment(*round));
                inputs.push(draft.clone());
                inputs.push(config.pe_reads.clone());
                actions.push(Action::CreateDir(namer.path(Artifact::ShortReadDir)));
                actions.push(invoke(config, bwa_index(&draft))?);
                actions.push(invoke(config, ToolConfig::Bwa(BwaConfig {
                    subcommand: BwaSubcommand::Mem,
                    reference: draft.clone(),
                    reads: Some(config.pe_reads.clone()),
                    output: Some(sam.clone()),
                }))?);
                actions.push(invoke(config, ToolConfig::Racon(RaconConfig {
                    reads: config.pe_reads.clone(),
                    overlaps: sam.clone(),
                    target: draft,
                    output: output.clone(),
                    long_read_scoring: false,
                }))?);
                transients.push(sam);
            }
            Stage::RepeatCorrect => {
                let draft = draft()?;
                let bam = namer.path(Artifact::CoverageBam);
                let coverage = namer.path(Artifact::CoverageProfile);
                let scratch = namer.path(Artifact::RepeatScratchDir);
                inputs.push(draft.clone());
                inputs.push(config.pe_reads.clone());
                actions.push(Action::StripHeaders(draft.clone()));
                actions.push(invoke(config, bwa_index(&draft))?);
                actions.push(Action::Pipe {
                    upstream: generate_cli(config, ToolConfig::Bwa(BwaConfig {
                        subcommand: BwaSubcommand::Mem,
                        reference: draft.clone(),
                        reads: Some(config.pe_reads.clone()),
                        output: None,
                    }))?,
                    downstream: generate_cli(config, ToolConfig::Samtools(SamtoolsConfig {
                        subcommand: SamtoolsSubcommand::Sort,
                        output: bam.clone(),
                    }))?,
                });
                actions.push(invoke(config, ToolConfig::Bedtools(BedtoolsConfig {
                    subcommand: BedtoolsSubcommand::Genomecov,
                    bam,
                    output: coverage.clone(),
                }))?);
                actions.push(Action::CreateDir(scratch.clone()));
                actions.push(invoke(config, ToolConfig::FixRepeats(FixRepeatsConfig {
                    assembly: draft,
                    reads: config.pe_reads.clone(),
                    coverage,
                    tmp_dir: scratch.clone(),
                    output: output.clone(),
                }))?);
                transients.push(scratch);
            }
        }

        Ok(StageRecipe { stage, inputs, actions, output, transients })
    }
}

fn invoke(config: &RunConfig, view: ToolConfig) -> Result<Action, PipelineError> {
    Ok(Action::Invoke(generate_cli(config, view)?))
}

fn bwa_index(reference: &Path) -> ToolConfig {
    ToolConfig::Bwa(BwaConfig {
        subcommand: BwaSubcommand::Index,
        reference: reference.to_path_buf(),
        reads: None,
        output: None,
    })
}

fn require_family(stage: &str, round: Round, family: ReadFamily) -> Result<(), PipelineError> {
    if round.family() == family {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!("{} cannot run as round {}", stage, round)))
    }
}

fn require_artifact(stage: &str, path: &Path) -> Result<(), PipelineError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::ArtifactMismatch { stage: stage.to_string(), path: path.to_path_buf() })
    }
}


/// Executes a recipe: checks inputs, runs actions in order, confirms the
/// declared output exists, then deletes the stage's transient files.
///
/// Transients are only removed after the output check passes, so a failed stage
/// leaves its intermediate files for inspection.
pub async fn run_recipe(recipe: &StageRecipe, limit: Option<Duration>) -> Result<(), PipelineError> {
    for input in &recipe.inputs {
        require_artifact(&recipe.stage, input)?;
    }

    for action in &recipe.actions {
        debug!("{}: {}", recipe.stage, action);
        match action {
            Action::CreateDir(dir) => {
                tokio::fs::create_dir_all(dir).await?;
            }
            Action::Invoke(invocation) => {
                for input in &invocation.inputs {
                    require_artifact(&recipe.stage, input)?;
                }
                run_tool(invocation, limit).await?;
            }
            Action::Pipe { upstream, downstream } => {
                for input in upstream.inputs.iter().chain(&downstream.inputs) {
                    require_artifact(&recipe.stage, input)?;
                }
                run_pipeline(upstream, downstream, limit).await?;
            }
            Action::Rename { from, to } => {
                require_artifact(&recipe.stage, from)?;
                tokio::fs::rename(from, to).await?;
            }
            Action::StripHeaders(path) => {
                let path = path.clone();
                let records = tokio::task::spawn_blocking(move || strip_fasta_descriptions(&path))
                    .await
                    .map_err(|e| PipelineError::IOError(e.to_string()))??;
                debug!("{}: normalized {} FASTA headers", recipe.stage, records);
            }
        }
    }

    require_artifact(&recipe.stage, &recipe.output)?;

    for transient in &recipe.transients {
        remove_artifact(transient).await?;
        debug!("{}: removed {}", recipe.stage, transient.display());
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defs::{AssemblySource, Tool, ToolPaths, DEFAULT_MEDAKA_MODEL};
    use crate::utils::command::StdoutTarget;

    fn config() -> RunConfig {
        RunConfig {
            cwd: PathBuf::from("/w"),
            out_dir: PathBuf::from("/w/out"),
            sample_name: "S".to_string(),
            long_reads: PathBuf::from("/w/ont.fq"),
            pe_reads: PathBuf::from("/w/pe.fq"),
            threads: 2,
            assembly_source: AssemblySource::DeNovo(AssemblyMode::Standard),
            start_site_reference: StartSiteReference::UserSupplied(PathBuf::from("/w/dnaA.fa")),
            tools: ToolPaths::default(),
            medaka_model: DEFAULT_MEDAKA_MODEL.to_string(),
            min_contig_length: 500,
            read_length: 300,
            tool_timeout: None,
            dry_run: false,
        }
    }

    fn tools(recipe: &StageRecipe) -> Vec<Tool> {
        recipe.invocations().map(|inv| inv.tool).collect()
    }

    #[test]
    fn test_assemble_renames_default_output() {
        let cfg = config();
        let namer = ArtifactNamer::new(&cfg.out_dir, &cfg.sample_name);
        let recipe = Stage::Assemble(AssemblyMode::Standard).recipe(&cfg, &namer, None).unwrap();
        assert_eq!(recipe.output, PathBuf::from("/w/out/flye_assembly/S_assembly.fasta"));
        assert_eq!(
            recipe.actions.last(),
            Some(&Action::Rename {
                from: PathBuf::from("/w/out/flye_assembly/assembly.fasta"),
                to: PathBuf::from("/w/out/flye_assembly/S_assembly.fasta"),
            })
        );
        assert!(recipe.transients.is_empty());
    }

    #[test]
    fn test_long_read_polish_recipe() {
        let cfg = config();
        let namer = ArtifactNamer::new(&cfg.out_dir, &cfg.sample_name);
        let draft = namer.path(Artifact::CleanedFasta);
        let recipe = Stage::LongReadPolish(Round::LONG_READ[0]).recipe(&cfg, &namer, Some(&draft)).unwrap();

        assert_eq!(tools(&recipe), vec![Tool::Minimap2, Tool::Racon]);
        let sam = PathBuf::from("/w/out/longRead_polish_results/align_1.sam");
        let minimap2 = recipe.invocations().next().unwrap();
        assert_eq!(minimap2.stdout, StdoutTarget::File(sam.clone()));
        assert_eq!(recipe.output, PathBuf::from("/w/out/longRead_polish_results/S_racon1.fasta"));
        assert_eq!(recipe.transients, vec![sam]);
        assert_eq!(recipe.inputs, vec![draft, cfg.long_reads.clone()]);
    }

    #[test]
    fn test_short_read_polish_recipe() {
        let cfg = config();
        let namer = ArtifactNamer::new(&cfg.out_dir, &cfg.sample_name);
        let draft = namer.path(Artifact::ConsensusFasta);
        let recipe = Stage::ShortReadPolish(Round::SHORT_READ[0]).recipe(&cfg, &namer, Some(&draft)).unwrap();

        assert_eq!(tools(&recipe), vec![Tool::Bwa, Tool::Bwa, Tool::Racon]);
        assert_eq!(recipe.output, PathBuf::from("/w/out/shortRead_polish_results/S_racon3.fasta"));
        assert_eq!(recipe.transients, vec![PathBuf::from("/w/out/shortRead_polish_results/align_3.sam")]);
    }

    #[test]
    fn test_round_family_is_enforced() {
        let cfg = config();
        let namer = ArtifactNamer::new(&cfg.out_dir, &cfg.sample_name);
        let draft = PathBuf::from("/w/draft.fasta");
        assert!(Stage::LongReadPolish(Round::SHORT_READ[1]).recipe(&cfg, &namer, Some(&draft)).is_err());
        assert!(Stage::ShortReadPolish(Round::LONG_READ[0]).recipe(&cfg, &namer, Some(&draft)).is_err());
    }

    #[test]
    fn test_stage_without_input_is_rejected() {
        let cfg = config();
        let namer = ArtifactNamer::new(&cfg.out_dir, &cfg.sample_name);
        let err = Stage::Clean.recipe(&cfg, &namer, None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_repeat_correct_recipe() {
        let cfg = config();
        let namer = ArtifactNamer::new(&cfg.out_dir, &cfg.sample_name);
        let draft = namer.path(Artifact::Polished(Round::SHORT_READ[1]));
        let recipe = Stage::RepeatCorrect.recipe(&cfg, &namer, Some(&draft)).unwrap();

        assert_eq!(recipe.actions[0], Action::StripHeaders(draft.clone()));
        assert_eq!(
            tools(&recipe),
            vec![Tool::Bwa, Tool::Bwa, Tool::Samtools, Tool::Bedtools, Tool::FixRepeats]
        );
        match &recipe.actions[2] {
            Action::Pipe { upstream, downstream } => {
                assert_eq!(upstream.args, ["mem", "-t", "2", draft.to_str().unwrap(), "/w/pe.fq"]);
                assert_eq!(upstream.stdout, StdoutTarget::Inherit);
                assert_eq!(
                    downstream.command_line(),
                    "samtools sort -@ 2 -o /w/out/shortRead_polish_results/S_racon4_sort.bam -"
                );
            }
            other => panic!("expected the aligner piped into the sorter, got {:?}", other),
        }
        assert_eq!(
            recipe.actions[2].to_string(),
            format!(
                "bwa mem -t 2 {} /w/pe.fq | samtools sort -@ 2 -o /w/out/shortRead_polish_results/S_racon4_sort.bam -",
                draft.display()
            )
        );
        assert_eq!(recipe.output, PathBuf::from("/w/out/shortRead_polish_results/S_final.fasta"));
        assert_eq!(recipe.transients, vec![PathBuf::from("/w/out/shortRead_polish_results/tmp")]);
    }

    #[test]
    fn test_stage_names() {
        let user = StartSiteReference::UserSupplied(PathBuf::from("g.fa"));
        let bundled = StartSiteReference::Bundled(PathBuf::from("g.fa"));
        assert_eq!(Stage::Assemble(AssemblyMode::PlasmidMeta).to_string(), "Assemble(plasmid-meta)");
        assert_eq!(Stage::LongReadPolish(Round::LONG_READ[1]).to_string(), "Long-Read-Polish(2)");
        assert_eq!(
            Stage::StartSiteFix(StartSiteOccurrence::First, bundled).to_string(),
            "Start-Site-Fix(first, default ref)"
        );
        assert_eq!(
            Stage::StartSiteFix(StartSiteOccurrence::Second, user).to_string(),
            "Start-Site-Fix(second, user ref)"
        );
    }

    #[tokio::test]
    async fn test_run_recipe_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let recipe = StageRecipe {
            stage: "Clean".to_string(),
            inputs: vec![dir.path().join("02.trimmed.fa")],
            actions: Vec::new(),
            output: dir.path().join("S_clean.fasta"),
            transients: Vec::new(),
        };
        match run_recipe(&recipe, None).await {
            Err(PipelineError::ArtifactMismatch { stage, path }) => {
                assert_eq!(stage, "Clean");
                assert_eq!(path, dir.path().join("02.trimmed.fa"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_recipe_reports_missing_rename_source() {
        let dir = tempfile::tempdir().unwrap();
        let recipe = StageRecipe {
            stage: "Assemble(standard)".to_string(),
            inputs: Vec::new(),
            actions: vec![Action::Rename {
                from: dir.path().join("assembly.fasta"),
                to: dir.path().join("S_assembly.fasta"),
            }],
            output: dir.path().join("S_assembly.fasta"),
            transients: Vec::new(),
        };
        let err = run_recipe(&recipe, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactMismatch { .. }));
    }

    #[tokio::test]
    async fn test_run_recipe_cleans_transients_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.fasta");
        let transient = dir.path().join("align_1.sam");
        std::fs::write(&output, ">c\nA\n").unwrap();
        std::fs::write(&transient, "@HD\n").unwrap();
        let recipe = StageRecipe {
            stage: "Long-Read-Polish(1)".to_string(),
            inputs: vec![output.clone()],
            actions: vec![Action::CreateDir(dir.path().join("sub"))],
            output: output.clone(),
            transients: vec![transient.clone()],
        };
        run_recipe(&recipe, None).await.unwrap();
        assert!(dir.path().join("sub").is_dir());
        assert!(output.exists());
        assert!(!transient.exists());
    }
}
