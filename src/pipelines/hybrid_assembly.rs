use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::defs::{PipelineError, RunConfig};
use crate::pipelines::plan::{required_tools, PipelinePlan};
use crate::pipelines::stages::{run_recipe, StageRecipe};
use crate::utils::artifacts::ArtifactNamer;
use crate::utils::file::remove_artifact;


/// Looks up every executable the recipes launch. Returns one error per tool
/// that does not resolve.
fn check_executables(recipes: &[StageRecipe]) -> Vec<PipelineError> {
    required_tools(recipes)
        .into_iter()
        .filter_map(|(tool, executable)| match which::which(&executable) {
            Ok(resolved) => {
                debug!("{} -> {}", tool.tag(), resolved.display());
                None
            }
            Err(_) => Some(PipelineError::ToolNotFound { tool: tool.tag().to_string(), executable }),
        })
        .collect()
}


async fn execute_stage(
    position: usize,
    total: usize,
    recipe: &StageRecipe,
    limit: Option<Duration>,
) -> Result<(), PipelineError> {
    info!("[{}/{}] {} started", position, total, recipe.stage);
    let started = Instant::now();

    match run_recipe(recipe, limit).await {
        Ok(()) => {
            info!(
                "[{}/{}] {} finished in {:.1} s: {}",
                position,
                total,
                recipe.stage,
                started.elapsed().as_secs_f64(),
                recipe.output.display()
            );
            Ok(())
        }
        Err(e) => {
            // A failed stage never leaves its declared output behind.
            if let Err(cleanup) = remove_artifact(&recipe.output).await {
                warn!("Could not remove partial output {}: {}", recipe.output.display(), cleanup);
            }
            Err(PipelineError::Stage { stage: recipe.stage.clone(), source: Box::new(e) })
        }
    }
}


/// Runs the hybrid assembly and polishing pipeline.
///
/// Validates the configuration, resolves the stage plan and every tool
/// command, checks that all executables are reachable, then runs the stages
/// in order. The first failure stops the run.
///
/// # Arguments
///
/// * `config` - Run configuration with absolute paths.
///
/// # Returns
/// Path of the final corrected assembly. In dry-run mode this is where it
/// would have been written.
pub async fn run(config: Arc<RunConfig>) -> Result<PathBuf, PipelineError> {
    config.validate()?;

    let namer = ArtifactNamer::new(&config.out_dir, &config.sample_name);
    let plan = PipelinePlan::build(&config, &namer);
    let recipes = plan.recipes(&config, &namer)?;
    let final_output = plan
        .final_output()
        .map(|path| path.to_path_buf())
        .ok_or_else(|| PipelineError::InvalidConfig("pipeline plan is empty".to_string()))?;

    info!("Working directory: {}", config.cwd.display());
    info!("Sample: {}", config.sample_name);
    info!("Output directory: {}", config.out_dir.display());
    info!("Start-site reference: {}", config.start_site_reference.path().display());
    info!("Plan: {}", plan.stage_names().join(" -> "));

    let missing = check_executables(&recipes);

    if config.dry_run {
        for error in &missing {
            warn!("{}", error);
        }
        for (position, recipe) in recipes.iter().enumerate() {
            info!("[{}/{}] {}", position + 1, recipes.len(), recipe.stage);
            for action in &recipe.actions {
                info!("    {}", action);
            }
        }
        info!("Dry run: nothing executed");
        return Ok(final_output);
    }

    if let Some(error) = missing.into_iter().next() {
        return Err(error);
    }

    tokio::fs::create_dir_all(&config.out_dir).await?;

    let total = recipes.len();
    for (position, recipe) in recipes.iter().enumerate() {
        execute_stage(position + 1, total, recipe, config.tool_timeout).await?;
    }

    info!("Final assembly: {}", final_output.display());
    Ok(final_output)
}
