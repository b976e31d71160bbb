// Stage ordering and artifact threading for one run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::defs::{AssemblySource, PipelineError, RunConfig, Tool};
use crate::pipelines::stages::{Stage, StageRecipe};
use crate::utils::artifacts::{ArtifactNamer, Round, StartSiteOccurrence};


#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStage {
    pub stage: Stage,
    pub input: Option<PathBuf>,
    pub output: PathBuf,
}


/// Ordered stage list. Each stage reads the previous stage's output; with
/// existing contigs the user's file feeds the first stage directly.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelinePlan {
    stages: Vec<PlannedStage>,
}

impl PipelinePlan {
    pub fn build(config: &RunConfig, namer: &ArtifactNamer) -> Self {
        let reference = config.start_site_reference.clone();
        let [first_long, second_long] = Round::LONG_READ;
        let [first_short, second_short] = Round::SHORT_READ;

        let mut order = Vec::with_capacity(11);
        let mut previous = match &config.assembly_source {
            AssemblySource::DeNovo(mode) => {
                order.push(Stage::Assemble(*mode));
                None
            }
            AssemblySource::ExistingContigs(contigs) => Some(contigs.clone()),
        };
        order.extend([
            Stage::CircularizeTrim,
            Stage::Clean,
            Stage::LongReadPolish(first_long),
            Stage::StartSiteFix(StartSiteOccurrence::First, reference.clone()),
            Stage::LongReadPolish(second_long),
            Stage::LongReadConsensus,
            Stage::ShortReadPolish(first_short),
            Stage::StartSiteFix(StartSiteOccurrence::Second, reference),
            Stage::ShortReadPolish(second_short),
            Stage::RepeatCorrect,
        ]);

        let stages = order
            .into_iter()
            .map(|stage| {
                let output = namer.path(stage.output_artifact());
                let input = previous.replace(output.clone());
                PlannedStage { stage, input, output }
            })
            .collect();
        PipelinePlan { stages }
    }

    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|planned| planned.stage.to_string()).collect()
    }

    pub fn final_output(&self) -> Option<&Path> {
        self.stages.last().map(|planned| planned.output.as_path())
    }

    /// Resolves every stage into its recipe up front.
    pub fn recipes(&self, config: &RunConfig, namer: &ArtifactNamer) -> Result<Vec<StageRecipe>, PipelineError> {
        self.stages
            .iter()
            .map(|planned| planned.stage.recipe(config, namer, planned.input.as_deref()))
            .collect()
    }
}

/// Distinct tools the recipes will launch, with the executable each resolves to.
pub fn required_tools(recipes: &[StageRecipe]) -> Vec<(Tool, PathBuf)> {
    let tools: BTreeSet<(Tool, PathBuf)> = recipes
        .iter()
        .flat_map(|recipe| recipe.invocations())
        .map(|invocation| (invocation.tool, invocation.executable.clone()))
        .collect();
    tools.into_iter().collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defs::{AssemblyMode, StartSiteReference, ToolPaths, DEFAULT_MEDAKA_MODEL};

    fn config(source: AssemblySource) -> RunConfig {
        RunConfig {
            cwd: PathBuf::from("/w"),
            out_dir: PathBuf::from("/w/out"),
            sample_name: "S".to_string(),
            long_reads: PathBuf::from("/w/ont.fq"),
            pe_reads: PathBuf::from("/w/pe.fq"),
            threads: 1,
            assembly_source: source,
            start_site_reference: StartSiteReference::Bundled(PathBuf::from("/opt/db/dnaA.fa")),
            tools: ToolPaths::default(),
            medaka_model: DEFAULT_MEDAKA_MODEL.to_string(),
            min_contig_length: 500,
            read_length: 300,
            tool_timeout: None,
            dry_run: false,
        }
    }

    fn plan_for(source: AssemblySource) -> (RunConfig, ArtifactNamer, PipelinePlan) {
        let cfg = config(source);
        let namer = ArtifactNamer::new(&cfg.out_dir, &cfg.sample_name);
        let plan = PipelinePlan::build(&cfg, &namer);
        (cfg, namer, plan)
    }

    #[test]
    fn test_de_novo_order() {
        let (_, _, plan) = plan_for(AssemblySource::DeNovo(AssemblyMode::Standard));
        assert_eq!(
            plan.stage_names(),
            [
                "Assemble(standard)",
                "Circularize-Trim",
                "Clean",
                "Long-Read-Polish(1)",
                "Start-Site-Fix(first, default ref)",
                "Long-Read-Polish(2)",
                "Long-Read-Consensus",
                "Short-Read-Polish(3)",
                "Start-Site-Fix(second, default ref)",
                "Short-Read-Polish(4)",
                "Repeat-Correct",
            ]
        );
        assert_eq!(plan.stages()[0].input, None);
        assert_eq!(plan.final_output(), Some(Path::new("/w/out/shortRead_polish_results/S_final.fasta")));
    }

    #[test]
    fn test_existing_contigs_skip_assembly() {
        let contigs = PathBuf::from("/w/contigs.fa");
        let (_, _, plan) = plan_for(AssemblySource::ExistingContigs(contigs.clone()));
        assert_eq!(plan.stages().len(), 10);
        assert_eq!(plan.stages()[0].stage, Stage::CircularizeTrim);
        assert_eq!(plan.stages()[0].input, Some(contigs));
    }

    #[test]
    fn test_plasmid_meta_mode_only_changes_assembly() {
        let (_, _, standard) = plan_for(AssemblySource::DeNovo(AssemblyMode::Standard));
        let (_, _, meta) = plan_for(AssemblySource::DeNovo(AssemblyMode::PlasmidMeta));
        assert_eq!(meta.stages()[0].stage, Stage::Assemble(AssemblyMode::PlasmidMeta));
        assert_eq!(standard.stages()[1..], meta.stages()[1..]);
    }

    #[test]
    fn test_each_stage_reads_previous_output() {
        let (_, _, plan) = plan_for(AssemblySource::DeNovo(AssemblyMode::Standard));
        for pair in plan.stages().windows(2) {
            assert_eq!(pair[1].input.as_ref(), Some(&pair[0].output));
        }
    }

    #[test]
    fn test_polish_rounds_are_numbered_in_order() {
        let (_, _, plan) = plan_for(AssemblySource::DeNovo(AssemblyMode::Standard));
        let rounds: Vec<u8> = plan
            .stages()
            .iter()
            .filter_map(|planned| match planned.stage {
                Stage::LongReadPolish(round) | Stage::ShortReadPolish(round) => Some(round.get()),
                _ => None,
            })
            .collect();
        assert_eq!(rounds, [1, 2, 3, 4]);
    }

    #[test]
    fn test_recipes_and_required_tools() {
        let (cfg, namer, plan) = plan_for(AssemblySource::DeNovo(AssemblyMode::Standard));
        let recipes = plan.recipes(&cfg, &namer).unwrap();
        assert_eq!(recipes.len(), plan.stages().len());
        let tools: Vec<Tool> = required_tools(&recipes).into_iter().map(|(tool, _)| tool).collect();
        assert_eq!(tools.len(), 10);

        let (cfg, namer, plan) = plan_for(AssemblySource::ExistingContigs(PathBuf::from("/w/c.fa")));
        let recipes = plan.recipes(&cfg, &namer).unwrap();
        assert!(!required_tools(&recipes).iter().any(|(tool, _)| *tool == Tool::Flye));
    }
}
