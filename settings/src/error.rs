use snafu::Snafu;

/// Errors that can occur while loading settings data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SettingsError {
    #[snafu(display("invalid settings JSON: {source}"))]
    Json { source: serde_json::Error },
}
