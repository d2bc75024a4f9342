pub mod app;
pub mod config;
pub mod git;
pub mod package;

use anyhow::Result;
use snowcli::lens::utils::{format_message, format_query_result, OutputFormat};
use snowcli::{QueryResult, SnowcliConfig, SqlApiConnection};

/// Open the SQL API connection described by the configuration
pub(crate) fn connect(config: &SnowcliConfig) -> Result<SqlApiConnection> {
    SqlApiConnection::open(config.connection_settings()?)
}

pub(crate) fn print_result(result: &QueryResult, output_format: OutputFormat) -> Result<()> {
    println!("{}", format_query_result(result, output_format)?);
    Ok(())
}

pub(crate) fn print_message(message: &str, output_format: OutputFormat) -> Result<()> {
    println!("{}", format_message(message, output_format)?);
    Ok(())
}
