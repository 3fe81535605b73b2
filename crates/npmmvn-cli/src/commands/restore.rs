//! `npmmvn restore`: Fetch missing packages listed in .npmmvn.json.

use crate::output::StyledOutput;
use npmmvn::{restore_project, CommandRebuild, Config, HttpStore, RestoreOptions, RestoreOutcome};
use std::path::PathBuf;
use tracing::debug;

pub async fn execute(
    out: &mut StyledOutput,
    project_dir: PathBuf,
    repository: Option<String>,
    rebuild: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    debug!(?config, "Loaded configuration");
    let store = HttpStore::new(&config.http)?;
    let rebuilder = CommandRebuild::new(config.restore.rebuild_command.clone());

    let options = RestoreOptions {
        project_dir,
        repository,
        rebuild,
    };

    match restore_project(&store, &rebuilder, &config, &options).await? {
        RestoreOutcome::NothingToDo => {
            out.plain("Nothing to do.");
            out.newline();
        }
        RestoreOutcome::Done { fetched, rebuilt } => {
            if !rebuilt {
                out.info(&format!("Fetched {} packages, rebuild skipped", fetched));
                out.newline();
            }
            out.success("Done.");
            out.newline();
        }
    }
    Ok(())
}
