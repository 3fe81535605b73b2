//! `npmmvn deploy`: Publish the dependency tree and write .npmmvn.json.

use crate::output::StyledOutput;
use npmmvn::{deploy_project, Config, DeployOptions, ExistingArtifactPolicy, HttpStore};
use std::path::PathBuf;
use tracing::debug;

pub async fn execute(
    out: &mut StyledOutput,
    project_dir: PathBuf,
    repository: Option<String>,
    verify_existing: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    debug!(?config, "Loaded configuration");
    let store = HttpStore::new(&config.http)?;

    let options = DeployOptions {
        project_dir,
        repository,
        existing: verify_existing.then_some(ExistingArtifactPolicy::Verify),
    };
    let result = deploy_project(&store, &config, &options).await?;

    out.success("Deployed");
    out.plain(&format!(
        " {} packages to {} ({} uploaded, {} already present)",
        result.scanned, result.repository, result.uploaded, result.existing
    ));
    out.newline();
    out.info(&format!("Wrote {}", result.manifest_path.display()));
    out.newline();
    Ok(())
}
