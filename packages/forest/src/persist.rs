//! `MessagePack` persistence for fitted forests.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::Path;

use crate::{ForestError, RandomForestRegressor};

impl RandomForestRegressor {
    /// Writes the forest to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::Io`] if the file cannot be written or
    /// [`ForestError::Encode`] if serialization fails.
    pub fn save(&self, path: &Path) -> Result<(), ForestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        rmp_serde::encode::write_named(&mut writer, self)?;
        writer.flush()?;

        log::info!(
            "Saved {} trees to {}",
            self.tree_count(),
            path.display()
        );
        Ok(())
    }

    /// Reads a forest previously written by [`RandomForestRegressor::save`].
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::Io`] if the file cannot be read,
    /// [`ForestError::Decode`] if it is not a valid encoding, or
    /// [`ForestError::InvalidModel`] if it decodes to a structurally broken
    /// forest.
    pub fn load(path: &Path) -> Result<Self, ForestError> {
        let reader = BufReader::new(File::open(path)?);
        let forest: Self = rmp_serde::decode::from_read(reader)?;
        forest.validate_structure()?;

        log::info!(
            "Loaded {} trees from {}",
            forest.tree_count(),
            path.display()
        );
        Ok(forest)
    }
}
