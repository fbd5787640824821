mod bootstrap;
mod report;

use anyhow::{Context, Result};
use taskboard_core::columns::ColumnAliases;
use taskboard_core::settings::Settings;
use taskboard_runtime::data_manager::DatasetManager;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("taskboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(
        "View: {}, Format: {}, Timezone: {}",
        settings.view,
        settings.format,
        settings.timezone
    );

    if settings.clear {
        tracing::info!("Saved configuration cleared");
        if settings.input.is_none() {
            return Ok(());
        }
    }

    let Some(input) = settings.input.clone() else {
        anyhow::bail!("No input file given; pass one with --input");
    };

    let aliases = match settings.aliases.as_deref() {
        Some(path) => ColumnAliases::with_overrides_from(path)
            .with_context(|| format!("loading column aliases from {}", path.display()))?,
        None => ColumnAliases::default(),
    };

    let manager = DatasetManager::new(aliases);
    match manager.load(&input).await {
        Ok(metadata) => {
            tracing::info!(
                "{} rows read ({} unscored, {} without week labels)",
                metadata.rows_read,
                metadata.unscored,
                metadata.unlabelled
            );
        }
        // Raw headers stay inspectable through the columns view.
        Err(e) if settings.view == "columns" && e.keeps_raw_records() => {
            tracing::warn!("{e}");
        }
        Err(e) => return Err(e).with_context(|| format!("loading {}", input.display())),
    }

    let text = report::render(&manager, &settings)?;
    report::deliver(&text, settings.output.as_deref())?;

    Ok(())
}
