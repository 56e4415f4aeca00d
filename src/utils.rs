use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Reads a yaml file, returning `None` if it doesn't exist yet.
pub async fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(anyhow!(
                "Could not read `{}`: {}",
                path.to_string_lossy(),
                e
            ))
        }
    };

    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|e| anyhow!("Could not parse `{}`: {}", path.to_string_lossy(), e))
}

/// Serializes `value` next to `path` and atomically moves it into place.
pub async fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents =
        serde_yaml::to_string(value).map_err(|e| anyhow!("Could not serialize: {}", e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            anyhow!(
                "Could not create directory `{}`: {}",
                parent.to_string_lossy(),
                e
            )
        })?;
    }

    let tmp_path = path.with_extension("yaml.new");

    tokio::fs::write(&tmp_path, contents).await.map_err(|e| {
        anyhow!(
            "Could not write temporary file `{}`: {}",
            tmp_path.to_string_lossy(),
            e
        )
    })?;

    tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
        anyhow!(
            "Could not rename `{}` to `{}`: {}",
            tmp_path.to_string_lossy(),
            path.to_string_lossy(),
            e
        )
    })?;

    Ok(())
}
