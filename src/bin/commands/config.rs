use anyhow::Result;
use serde::Serialize;
use snowcli::lens::utils::OutputFormat;
use snowcli::SnowcliConfig;

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    config_file: String,
    token_configured: bool,
    #[serde(flatten)]
    settings: &'a SnowcliConfig,
}

pub fn run(config: &SnowcliConfig, output_format: OutputFormat) -> Result<()> {
    let info = ConfigInfo {
        config_file: SnowcliConfig::config_file_path(),
        token_configured: config.token.is_some(),
        settings: config,
    };

    match output_format {
        OutputFormat::Json | OutputFormat::JsonLine => println!("{}", serde_json::to_string(&info)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&info)?),
        _ => println!("{}", config.summary()),
    }
    Ok(())
}
