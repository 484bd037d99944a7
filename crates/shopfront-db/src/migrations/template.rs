use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use shopfront_common::{Error, Result};
use tracing::info;

use super::naming::{self, pascal_case};
use super::sql_unit::{DOWN_MARKER, SQL_EXTENSION, UP_MARKER};

/// Write a new empty SQL unit to `dir` and return its file name.
pub fn create_unit(dir: &Path, name: &str) -> Result<String> {
    create_unit_at(dir, name, Utc::now())
}

pub fn create_unit_at(dir: &Path, name: &str, now: DateTime<Utc>) -> Result<String> {
    naming::validate_unit_name(name)?;
    std::fs::create_dir_all(dir)?;

    let identifier = naming::identifier(now, name);
    let file_name = format!("{identifier}.{SQL_EXTENSION}");
    let path = dir.join(&file_name);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                Error::Conflict(format!("{} already exists", path.display()))
            }
            _ => Error::Io(e),
        })?;
    file.write_all(render(name, now).as_bytes())?;

    info!("created migration {}", path.display());
    Ok(file_name)
}

fn render(name: &str, now: DateTime<Utc>) -> String {
    format!(
        "-- Unit: {type_name}\n\
         -- Created: {created} UTC\n\
         -- Each section runs in its own transaction unless it starts with BEGIN.\n\
         \n\
         {UP_MARKER}\n\
         \n\
         \n\
         {DOWN_MARKER}\n\
         \n",
        type_name = pascal_case(name),
        created = now.format("%Y-%m-%d %H:%M:%S"),
    )
}
