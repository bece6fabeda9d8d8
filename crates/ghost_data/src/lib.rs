pub mod api;
pub mod assemble;
pub mod backlink;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod paginate;
pub mod reading;
pub mod snapshot;
pub mod xref;

use reqwest::Client;
use tracing::{info, warn};

use api::GhostClient;
use assemble::{Assembler, AssemblyOptions};
use config::{AppConfig, CliArgs};
use dimensions::HttpImageProbe;
use error::GhostDataError;
use logging::{LoggingDestination, init_logging};
use snapshot::{materialize_snapshot, write_snapshot};

pub async fn run(cli: CliArgs) -> Result<(), GhostDataError> {
    let AppConfig { paths, tunables } = cli.resolve()?;

    let destination = match &paths.log_dir {
        Some(dir) => LoggingDestination::FileAndStderr(dir.clone()),
        None => LoggingDestination::StderrOnly,
    };
    init_logging(destination)?;

    let client = Client::builder()
        .user_agent("ghost-data/0.1")
        .timeout(tunables.http_timeout)
        .build()?;

    let api = GhostClient::new(client.clone(), tunables.api.clone());
    let backlink_api = GhostClient::new(client.clone(), tunables.backlink_api.clone());
    let probe = HttpImageProbe::new(client);

    info!(
        api = %api.endpoint().url,
        posts_per_page = tunables.posts_per_page.get(),
        fetch_mode = ?tunables.fetch_mode,
        "Assembling site data"
    );

    let assembly = Assembler::new(
        &api,
        &backlink_api,
        &probe,
        AssemblyOptions::from_tunables(&tunables),
    )
    .assemble()
    .await;

    if !assembly.report.is_clean() {
        warn!(
            page_failures = assembly.report.page_failures.len(),
            backlink_failures = assembly.report.backlink_failures.len(),
            image_failures = assembly.report.image_failures.len(),
            settings_failed = assembly.report.settings_error.is_some(),
            "Site data is incomplete; see the report section of the output"
        );
    }

    let snapshot = materialize_snapshot(&assembly);
    write_snapshot(&paths.out, &snapshot)?;

    info!(
        path = %paths.out.display(),
        schema_version = snapshot.schema_version,
        "Site data written"
    );

    Ok(())
}
