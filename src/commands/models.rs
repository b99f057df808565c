//! Model catalog listing

use prettytable::{row, Table};

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::error::{NymvalError, Result};

/// List the models in the catalog
///
/// # Arguments
///
/// * `catalog` - Catalog from configuration
/// * `json` - Print JSON instead of a table
///
/// # Errors
///
/// Returns `NymvalError::Serialization` if JSON output fails
pub fn list_models(catalog: &ModelCatalog, json: bool) -> Result<()> {
    tracing::debug!("models::list_models flags - json: {}", json);

    let models: Vec<&ModelDescriptor> = catalog.iter().collect();

    if models.is_empty() {
        if json {
            println!("[]");
        } else {
            println!("No models configured.");
        }
        return Ok(());
    }

    if json {
        println!("{}", models_json(&models)?);
    } else {
        output_models_table(&models);
    }
    Ok(())
}

/// Pretty JSON for a list of models
pub fn models_json(models: &[&ModelDescriptor]) -> Result<String> {
    Ok(serde_json::to_string_pretty(models).map_err(NymvalError::Serialization)?)
}

fn output_models_table(models: &[&ModelDescriptor]) {
    let mut table = Table::new();
    table.add_row(row!["ID", "Name", "Provider", "Max Tokens", "Description"]);

    for model in models {
        table.add_row(row![
            model.id,
            model.name,
            model.provider,
            format!("{} tokens", model.max_tokens),
            model.description.as_deref().unwrap_or("-")
        ]);
    }

    println!("\nAvailable models:\n");
    table.printstd();
    println!();
}
