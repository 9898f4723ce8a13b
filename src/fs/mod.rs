//! This module contains utilities to read & write option presets to files. The file format is
//! just a JSON array of `SnowOptions`.

use std::path::PathBuf;

pub mod options;

pub use options::SnowOptions;

fn write_presets(mut w: impl std::io::Write, presets: &[SnowOptions]) -> std::io::Result<()> {
    let mut buf = Vec::<u8>::with_capacity(std::mem::size_of_val(presets));
    facet_json::to_writer(&presets, &mut buf)
        .map_err(|err| std::io::Error::other(format!("{:?}", err)))?;
    w.write_all(&buf)
}

fn read_presets(mut r: impl std::io::Read) -> std::io::Result<Vec<SnowOptions>> {
    let mut buf = Vec::<u8>::new();
    r.read_to_end(&mut buf)?;
    let presets: Vec<SnowOptions> =
        facet_json::from_slice(&buf).map_err(|err| std::io::Error::other(format!("{}", err)))?;
    if presets.is_empty() {
        return Err(std::io::Error::other("presets file contains no presets"));
    }
    Ok(presets)
}

/// All option presets that can be loaded into memory at once. Only `presets` is ever persisted
/// to disk.
pub struct OptionPresets {
    /// Where we should persist our presets to disk.
    pub filename: Option<PathBuf>,
    /// The options we are currently acting on. Needs to be manually written to presets.
    options: SnowOptions,
    /// The list of pre-made options that we can pull from.
    presets: Vec<SnowOptions>,
    /// The preset we last pulled from.
    /// MUST be in the range 0..presets.len()
    index: usize,
    /// Whether `options != presets[index]`, cached.
    dirty: bool,
}

impl OptionPresets {
    /// `presets` MUST NOT be empty.
    fn from_presets(presets: Vec<SnowOptions>) -> Self {
        Self {
            filename: None,
            options: presets[0].clone(),
            presets,
            index: 0,
            dirty: false,
        }
    }

    fn write(&self) -> std::io::Result<()> {
        let filename = match self.filename.as_ref() {
            Some(filename) => filename,
            None => return Ok(()),
        };

        let file = std::fs::File::create(filename)?;
        write_presets(file, &self.presets)
    }

    fn read(path: PathBuf) -> std::io::Result<Self> {
        let file = std::fs::File::open(&path)?;
        let presets = read_presets(file)?;

        let mut out = Self::from_presets(presets);
        out.filename = Some(path);
        Ok(out)
    }

    /// Reads presets from `path`, falling back to the built-in presets on any error. The path is
    /// kept either way so that saving creates the file.
    pub fn read_or_default(path: PathBuf) -> Self {
        Self::read(path.clone()).unwrap_or_else(|e| {
            log::warn!("Error loading presets from {}: {e}", path.display());
            log::warn!("Falling back to built-in presets...");
            let mut out = Self::default();
            out.filename = Some(path);
            out
        })
    }
}

impl Default for OptionPresets {
    fn default() -> Self {
        Self::from_presets(SnowOptions::builtin_presets())
    }
}

impl OptionPresets {
    pub fn options(&self) -> &SnowOptions {
        &self.options
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Mutates the live options. The preset itself is left alone until `save`.
    pub fn edit(&mut self, f: impl FnOnce(&mut SnowOptions)) -> &SnowOptions {
        f(&mut self.options);
        self.dirty = self.options != self.presets[self.index];
        &self.options
    }

    pub fn next(&mut self) -> &SnowOptions {
        let next_index = if self.index == self.presets.len() - 1 {
            0
        } else {
            self.index + 1
        };
        self.set_index(next_index)
    }

    pub fn previous(&mut self) -> &SnowOptions {
        let next_index = if self.index == 0 {
            self.presets.len() - 1
        } else {
            self.index - 1
        };
        self.set_index(next_index)
    }

    /// Writes the live options into the current preset and persists all presets.
    pub fn save(&mut self) {
        self.presets[self.index] = self.options.clone();
        match self.write() {
            Ok(()) => {
                self.dirty = false;
            }
            Err(e) => log::warn!("Error saving presets: {e}"),
        }
    }

    fn set_index(&mut self, index: usize) -> &SnowOptions {
        self.index = index;
        self.options = self.presets[self.index].clone();
        self.dirty = false;
        &self.options
    }
}
