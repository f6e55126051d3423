//! Output formatting

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        println!("{}", self.render(data)?);
        Ok(())
    }

    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        Ok(match self {
            OutputFormat::Json => serde_json::to_string_pretty(data)?,
            OutputFormat::Yaml => serde_yaml::to_string(data)?,
            OutputFormat::Table => table(&serde_json::to_value(data)?),
        })
    }
}

// Arrays of objects become one row per element, objects become field/value pairs
fn table(value: &Value) -> String {
    let mut builder = Builder::default();
    match value {
        Value::Array(rows) if rows.is_empty() => return "(none)".into(),
        Value::Array(rows) => {
            let columns: Vec<String> = rows
                .first()
                .and_then(Value::as_object)
                .map(|o| o.keys().cloned().collect())
                .unwrap_or_default();
            builder.push_record(columns.clone());
            for row in rows {
                builder.push_record(columns.iter().map(|c| cell(&row[c.as_str()])));
            }
        }
        Value::Object(fields) => {
            builder.push_record(["field".to_string(), "value".to_string()]);
            for (k, v) in fields {
                builder.push_record([k.clone(), cell(v)]);
            }
        }
        other => return cell(other),
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".into(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
