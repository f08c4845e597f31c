/// `load_config` module: reads the static YAML config into the core [`Config`].
///
/// This is the only place where the config file is parsed. It contains no secrets: the
/// export credential is supplied per invocation via `--token` or `VOUCHER_SHEET_TOKEN`.
///
/// Accepted YAML:
///
/// ```yaml
/// output_dir: ./out
/// layout:            # optional, A4 defaults
///   items_per_row: 4
///   rows_per_page: 6
/// policy:            # optional
///   max_skipped: 3
/// export:            # required by the `export` command only
///   base_url: https://shop.example.com/api/
/// ```
///
/// # Errors
/// Failures are `anyhow::Error` and surface at the CLI boundary.
use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use voucher_sheet_core::config::Config;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: Config = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Err(reason) = config.layout.validate() {
        error!(config_path = ?path_ref, %reason, "Config layout is invalid");
        return Err(anyhow::anyhow!("Invalid layout in config: {reason}"));
    }

    config.trace_loaded();
    Ok(config)
}
